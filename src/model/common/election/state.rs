use serde::{Deserialize, Serialize};

/// States in the Election lifecycle. Transitions are owned by the external
/// election workflow; this backend only reads the state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElectionStatus {
    /// Under construction.
    Draft,
    /// Submitted, awaiting sign-off.
    PendingApproval,
    /// Signed off, waiting for the voting window.
    Approved,
    /// Accepting ballots.
    Live,
    /// Voting finished.
    Closed,
    /// Hidden by default, but retrievable.
    Archived,
}

impl ElectionStatus {
    /// Can ballots be submitted in this state?
    pub fn accepts_ballots(self) -> bool {
        self == Self::Live
    }
}
