use chrono::{DateTime, Utc};
use mongodb::bson::Document;
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, common::audit::AuditAction, db::audit_event::AuditEvent};

/// Coarse health signals for an election's ballots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegritySummary {
    pub election_id: ApiId,
    /// Distinct voter fingerprints with votes.
    pub total_ballots: u64,
    /// Vote rows.
    pub valid_votes: u64,
    /// `VOTE_UPDATED` events, i.e. attempts to change a cast ballot.
    pub duplicate_attempts: u64,
    pub suspicious_activity: bool,
    /// The most recent checkpoint, or the time of the summary if there was none.
    pub last_audit_time: DateTime<Utc>,
}

/// An audit event as shown to API clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEventDesc {
    pub id: ApiId,
    pub actor: String,
    pub election_id: Option<ApiId>,
    pub action: AuditAction,
    pub metadata: Document,
    pub timestamp: DateTime<Utc>,
}

impl From<AuditEvent> for AuditEventDesc {
    fn from(event: AuditEvent) -> Self {
        Self {
            id: event.id.into(),
            actor: event.event.actor,
            election_id: event.event.election_id.map(ApiId::from),
            action: event.event.action,
            metadata: event.event.metadata,
            timestamp: event.event.timestamp,
        }
    }
}
