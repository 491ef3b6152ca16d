use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;
use crate::voting::Fingerprint;

/// Core vote data, as stored in the database. One row per portfolio per
/// ballot; rows are written once and never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCore {
    /// Foreign Key election ID.
    pub election_id: Id,
    /// Foreign Key portfolio ID.
    pub portfolio_id: Id,
    /// Foreign Key candidate ID. `None` is an explicit "no" on a referendum portfolio.
    pub candidate_id: Option<Id>,
    /// One-way hash of the voter's identifier; the raw identifier is never stored here.
    pub voter_fingerprint: Fingerprint,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

/// A vote without an ID.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Vote {
    pub fn new(vote: VoteCore) -> Self {
        Self { id: Id::new(), vote }
    }
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

impl DerefMut for Vote {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.vote
    }
}
