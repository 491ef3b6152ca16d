use std::collections::HashSet;

use crate::clock::SharedClock;
use crate::error::Result;
use crate::model::{
    api::integrity::IntegritySummary,
    common::audit::AuditAction,
    db::audit_event::AuditEvent,
    mongodb::Id,
};
use crate::store::SharedStore;

/// Reads the audit log and ballot rows for anomaly signals. Never writes.
#[derive(Clone)]
pub struct IntegrityAuditor {
    store: SharedStore,
    clock: SharedClock,
    default_limit: usize,
    max_limit: usize,
    checkpoint_action: AuditAction,
}

impl IntegrityAuditor {
    pub fn new(
        store: SharedStore,
        clock: SharedClock,
        default_limit: usize,
        max_limit: usize,
        checkpoint_action: AuditAction,
    ) -> Self {
        Self {
            store,
            clock,
            default_limit,
            max_limit,
            checkpoint_action,
        }
    }

    /// Security-relevant events for the election, most recent first. The
    /// limit falls back to the default and is capped at the maximum.
    pub async fn recent_security_events(
        &self,
        election_id: Id,
        limit: Option<usize>,
    ) -> Result<Vec<AuditEvent>> {
        let limit = limit
            .unwrap_or(self.default_limit)
            .min(self.max_limit);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let events = self
            .store
            .audit_events(election_id, &AuditAction::SECURITY_RELEVANT, limit)
            .await?;
        debug!(
            "Found {} recent security events for election {election_id}",
            events.len()
        );
        Ok(events)
    }

    pub async fn ballot_integrity_summary(&self, election_id: Id) -> Result<IntegritySummary> {
        let votes = self.store.votes(election_id).await?;
        let used_tokens = self
            .store
            .voter_tokens(election_id)
            .await?
            .iter()
            .filter(|t| t.used)
            .count() as u64;
        let duplicate_attempts = self
            .store
            .count_audit_events(election_id, AuditAction::VoteUpdated)
            .await?;
        let last_checkpoint = self
            .store
            .audit_events(election_id, &[self.checkpoint_action], 1)
            .await?
            .into_iter()
            .next();

        let total_ballots = votes
            .iter()
            .map(|v| &v.voter_fingerprint)
            .collect::<HashSet<_>>()
            .len() as u64;
        let suspicious_activity = duplicate_attempts > 0 || total_ballots != used_tokens;
        if suspicious_activity {
            warn!(
                "Election {election_id} flagged: {duplicate_attempts} update attempts, \
                 {total_ballots} ballots against {used_tokens} used tokens"
            );
        }

        Ok(IntegritySummary {
            election_id: election_id.into(),
            total_ballots,
            valid_votes: votes.len() as u64,
            duplicate_attempts,
            suspicious_activity,
            last_audit_time: last_checkpoint
                .map(|e| e.timestamp)
                .unwrap_or_else(|| self.clock.now()),
        })
    }
}
