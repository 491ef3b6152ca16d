//! Storage seam for the voting engine.
//!
//! The engine only talks to a [`VoteStore`]; production runs against MongoDB
//! ([`crate::model::mongodb::MongoStore`]) and tests against [`MemoryStore`].

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    common::audit::AuditAction,
    db::{
        audit_event::{AuditEvent, NewAuditEvent},
        candidate::Candidate,
        election::Election,
        portfolio::Portfolio,
        vote::{NewVote, Vote},
        voter_token::VoterToken,
    },
    mongodb::Id,
};
use crate::voting::Fingerprint;

mod memory;

pub use memory::MemoryStore;

/// A store shared between request handlers.
pub type SharedStore = Arc<dyn VoteStore>;

/// Everything written when a ballot is accepted.
#[derive(Debug, Clone)]
pub struct BallotSubmission {
    pub election_id: Id,
    /// Identifies the voter's eligibility token; never written to vote rows.
    pub voter_id: String,
    pub fingerprint: Fingerprint,
    pub cast_at: DateTime<Utc>,
    /// One row per portfolio.
    pub votes: Vec<NewVote>,
    /// The `VoteCast` entry.
    pub audit: NewAuditEvent,
}

/// The result of attempting to write a ballot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// All rows written and the token consumed.
    Recorded,
    /// A ballot for this fingerprint already exists, or the token was already
    /// consumed. Nothing was written.
    AlreadyVoted,
    /// The voter holds no token for this election. Nothing was written.
    NotEligible,
}

#[rocket::async_trait]
pub trait VoteStore: Send + Sync {
    async fn election(&self, election_id: Id) -> Result<Option<Election>>;

    /// Portfolios of an election, in insertion order.
    async fn portfolios(&self, election_id: Id) -> Result<Vec<Portfolio>>;

    /// Candidates standing for any of the given portfolios, in insertion order.
    async fn candidates(&self, portfolio_ids: &[Id]) -> Result<Vec<Candidate>>;

    /// Any vote row cast under this fingerprint in this election.
    async fn vote_by_fingerprint(
        &self,
        election_id: Id,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Vote>>;

    async fn votes(&self, election_id: Id) -> Result<Vec<Vote>>;

    async fn voter_token(&self, election_id: Id, voter_id: &str) -> Result<Option<VoterToken>>;

    async fn voter_tokens(&self, election_id: Id) -> Result<Vec<VoterToken>>;

    /// Atomically insert the ballot's vote rows, consume the voter's token and
    /// append the audit entry. Either everything is written or nothing is.
    async fn record_ballot(&self, submission: BallotSubmission) -> Result<RecordOutcome>;

    async fn append_audit_event(&self, event: NewAuditEvent) -> Result<()>;

    /// Events of the given kinds for an election, most recent first.
    async fn audit_events(
        &self,
        election_id: Id,
        actions: &[AuditAction],
        limit: usize,
    ) -> Result<Vec<AuditEvent>>;

    async fn count_audit_events(&self, election_id: Id, action: AuditAction) -> Result<u64>;
}
