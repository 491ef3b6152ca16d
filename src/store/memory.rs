use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};
use crate::model::{
    common::audit::AuditAction,
    db::{
        audit_event::{AuditEvent, NewAuditEvent},
        candidate::Candidate,
        election::Election,
        portfolio::Portfolio,
        vote::Vote,
        voter_token::VoterToken,
    },
    mongodb::Id,
};
use crate::voting::Fingerprint;

use super::{BallotSubmission, RecordOutcome, VoteStore};

#[derive(Default)]
struct Tables {
    elections: Vec<Election>,
    portfolios: Vec<Portfolio>,
    candidates: Vec<Candidate>,
    tokens: Vec<VoterToken>,
    votes: Vec<Vote>,
    audit_events: Vec<AuditEvent>,
}

/// An in-process store. Every ballot write happens under a single lock, which
/// gives the same all-or-nothing guarantee as a database transaction.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the store going down (or coming back). While unavailable,
    /// every operation fails with a retryable error.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn add_election(&self, election: Election) {
        if let Ok(mut tables) = self.tables.write() {
            tables.elections.push(election);
        }
    }

    pub fn add_portfolio(&self, portfolio: Portfolio) {
        if let Ok(mut tables) = self.tables.write() {
            tables.portfolios.push(portfolio);
        }
    }

    pub fn add_candidate(&self, candidate: Candidate) {
        if let Ok(mut tables) = self.tables.write() {
            tables.candidates.push(candidate);
        }
    }

    /// Provision a voter token. Returns false (and stores nothing) if the voter
    /// already holds a token for that election.
    pub fn add_voter_token(&self, token: VoterToken) -> bool {
        let Ok(mut tables) = self.tables.write() else {
            return false;
        };
        let exists = tables
            .tokens
            .iter()
            .any(|t| t.election_id == token.election_id && t.voter_id == token.voter_id);
        if !exists {
            tables.tokens.push(token);
        }
        !exists
    }

    /// Insert a raw vote row, bypassing ballot checks. Used to seed tallies.
    pub fn add_vote(&self, vote: Vote) {
        if let Ok(mut tables) = self.tables.write() {
            tables.votes.push(vote);
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.check_available()?;
        self.tables
            .read()
            .map_err(|_| Error::StoreUnavailable("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.check_available()?;
        self.tables
            .write()
            .map_err(|_| Error::StoreUnavailable("store lock poisoned".to_string()))
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::StoreUnavailable("in-memory store offline".to_string()))
        }
    }
}

#[rocket::async_trait]
impl VoteStore for MemoryStore {
    async fn election(&self, election_id: Id) -> Result<Option<Election>> {
        Ok(self
            .read()?
            .elections
            .iter()
            .find(|e| e.id == election_id)
            .cloned())
    }

    async fn portfolios(&self, election_id: Id) -> Result<Vec<Portfolio>> {
        Ok(self
            .read()?
            .portfolios
            .iter()
            .filter(|p| p.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn candidates(&self, portfolio_ids: &[Id]) -> Result<Vec<Candidate>> {
        Ok(self
            .read()?
            .candidates
            .iter()
            .filter(|c| portfolio_ids.contains(&c.portfolio_id))
            .cloned()
            .collect())
    }

    async fn vote_by_fingerprint(
        &self,
        election_id: Id,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Vote>> {
        Ok(self
            .read()?
            .votes
            .iter()
            .find(|v| v.election_id == election_id && &v.voter_fingerprint == fingerprint)
            .cloned())
    }

    async fn votes(&self, election_id: Id) -> Result<Vec<Vote>> {
        Ok(self
            .read()?
            .votes
            .iter()
            .filter(|v| v.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn voter_token(&self, election_id: Id, voter_id: &str) -> Result<Option<VoterToken>> {
        Ok(self
            .read()?
            .tokens
            .iter()
            .find(|t| t.election_id == election_id && t.voter_id == voter_id)
            .cloned())
    }

    async fn voter_tokens(&self, election_id: Id) -> Result<Vec<VoterToken>> {
        Ok(self
            .read()?
            .tokens
            .iter()
            .filter(|t| t.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn record_ballot(&self, submission: BallotSubmission) -> Result<RecordOutcome> {
        let mut tables = self.write()?;

        // Uniqueness over (election, fingerprint) is checked under the same
        // lock as the insert.
        let duplicate = tables.votes.iter().any(|v| {
            v.election_id == submission.election_id
                && v.voter_fingerprint == submission.fingerprint
        });
        if duplicate {
            return Ok(RecordOutcome::AlreadyVoted);
        }

        let token = tables.tokens.iter_mut().find(|t| {
            t.election_id == submission.election_id && t.voter_id == submission.voter_id
        });
        match token {
            None => return Ok(RecordOutcome::NotEligible),
            Some(token) if token.used => return Ok(RecordOutcome::AlreadyVoted),
            Some(token) => token.mark_used(submission.cast_at),
        }

        tables
            .votes
            .extend(submission.votes.into_iter().map(Vote::new));
        tables.audit_events.push(AuditEvent::new(submission.audit));
        Ok(RecordOutcome::Recorded)
    }

    async fn append_audit_event(&self, event: NewAuditEvent) -> Result<()> {
        self.write()?.audit_events.push(AuditEvent::new(event));
        Ok(())
    }

    async fn audit_events(
        &self,
        election_id: Id,
        actions: &[AuditAction],
        limit: usize,
    ) -> Result<Vec<AuditEvent>> {
        // Walk backwards so that equal timestamps keep most-recent-first order
        // through the stable sort.
        let mut events = self
            .read()?
            .audit_events
            .iter()
            .rev()
            .filter(|e| e.election_id == Some(election_id) && actions.contains(&e.action))
            .cloned()
            .collect::<Vec<_>>();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.truncate(limit);
        Ok(events)
    }

    async fn count_audit_events(&self, election_id: Id, action: AuditAction) -> Result<u64> {
        Ok(self
            .read()?
            .audit_events
            .iter()
            .filter(|e| e.election_id == Some(election_id) && e.action == action)
            .count() as u64)
    }
}
