use std::fmt::{Display, Formatter};

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// The closed set of actions that can appear in the audit log.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    VoteCast,
    VoteUpdated,
    UserLogin,
    UserLogout,
    SystemBackup,
    ElectionCreated,
    ElectionUpdated,
    ElectionApproved,
    ElectionStatusChanged,
    TokenIssued,
}

impl AuditAction {
    /// Actions surfaced by the integrity auditor as security-relevant.
    pub const SECURITY_RELEVANT: [AuditAction; 4] = [
        AuditAction::UserLogin,
        AuditAction::UserLogout,
        AuditAction::VoteCast,
        AuditAction::VoteUpdated,
    ];
}

impl Display for AuditAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // Reuse the serde name so logs match what is stored.
        match to_bson(self) {
            Ok(Bson::String(name)) => write!(f, "{name}"),
            _ => write!(f, "{self:?}"),
        }
    }
}

impl From<AuditAction> for Bson {
    fn from(action: AuditAction) -> Self {
        to_bson(&action).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_use_screaming_snake_case() {
        assert_eq!(Bson::from(AuditAction::VoteCast), Bson::String("VOTE_CAST".into()));
        assert_eq!(AuditAction::SystemBackup.to_string(), "SYSTEM_BACKUP");
    }

    #[test]
    fn security_relevance() {
        assert!(AuditAction::SECURITY_RELEVANT.contains(&AuditAction::UserLogin));
        assert!(AuditAction::SECURITY_RELEVANT.contains(&AuditAction::VoteUpdated));
        assert!(!AuditAction::SECURITY_RELEVANT.contains(&AuditAction::SystemBackup));
        assert!(!AuditAction::SECURITY_RELEVANT.contains(&AuditAction::ElectionCreated));
    }
}
