mod state;

pub use state::ElectionStatus;

/// Ballot order given to portfolios that have none recorded, unless
/// configured otherwise. Unset portfolios therefore sort before any
/// positively-ordered ones.
pub const DEFAULT_UNSET_BALLOT_ORDER: i32 = 0;
