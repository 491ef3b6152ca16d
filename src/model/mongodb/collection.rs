use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{
    audit_event::{AuditEvent, AuditEventCore},
    candidate::{Candidate, CandidateCore},
    election::{Election, ElectionCore},
    portfolio::{Portfolio, PortfolioCore},
    vote::{Vote, VoteCore},
    voter_token::{VoterToken, VoterTokenCore},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Election collections
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}
impl MongoCollection for ElectionCore {
    const NAME: &'static str = ELECTIONS;
}

// Portfolio collections
const PORTFOLIOS: &str = "portfolios";
impl MongoCollection for Portfolio {
    const NAME: &'static str = PORTFOLIOS;
}
impl MongoCollection for PortfolioCore {
    const NAME: &'static str = PORTFOLIOS;
}

// Candidate collections
const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}
impl MongoCollection for CandidateCore {
    const NAME: &'static str = CANDIDATES;
}

// Voter token collections
const VOTER_TOKENS: &str = "voter_tokens";
impl MongoCollection for VoterToken {
    const NAME: &'static str = VOTER_TOKENS;
}
impl MongoCollection for VoterTokenCore {
    const NAME: &'static str = VOTER_TOKENS;
}

// Vote collections
const VOTES: &str = "votes";
impl MongoCollection for Vote {
    const NAME: &'static str = VOTES;
}
impl MongoCollection for VoteCore {
    const NAME: &'static str = VOTES;
}

// Audit log collections
const AUDIT_EVENTS: &str = "audit_events";
impl MongoCollection for AuditEvent {
    const NAME: &'static str = AUDIT_EVENTS;
}
impl MongoCollection for AuditEventCore {
    const NAME: &'static str = AUDIT_EVENTS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Voter token collection: exactly one token per voter per election.
    let token_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "voter_id": 1})
        .options(unique.clone())
        .build();
    Coll::<VoterToken>::from_db(db)
        .create_index(token_index, None)
        .await?;

    // Vote collection. Every accepted ballot covers every portfolio, so a
    // second ballot under the same fingerprint always collides here.
    let ballot_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "voter_fingerprint": 1, "portfolio_id": 1})
        .options(unique.clone())
        .build();
    let timeline_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "cast_at": 1})
        .build();
    Coll::<Vote>::from_db(db)
        .create_indexes([ballot_index, timeline_index], None)
        .await?;

    // Portfolio and candidate lookups.
    let portfolio_index = IndexModel::builder()
        .keys(doc! {"election_id": 1})
        .build();
    Coll::<Portfolio>::from_db(db)
        .create_index(portfolio_index, None)
        .await?;
    let candidate_index = IndexModel::builder()
        .keys(doc! {"portfolio_id": 1})
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidate_index, None)
        .await?;

    // Audit log collection.
    let audit_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "action": 1, "timestamp": -1})
        .build();
    Coll::<AuditEvent>::from_db(db)
        .create_index(audit_index, None)
        .await?;

    Ok(())
}
