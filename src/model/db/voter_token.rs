use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{optional_chrono_datetime_as_bson_datetime, Id};

/// Core voter eligibility token data, as stored in the database.
///
/// Tokens are provisioned externally, one per (voter, election), and flip to
/// `used` exactly once: when that voter's ballot is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterTokenCore {
    /// Foreign Key election ID.
    pub election_id: Id,
    /// The voter's stable identifier, as issued by the auth service.
    pub voter_id: String,
    pub used: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub issued_at: DateTime<Utc>,
    #[serde(default, with = "optional_chrono_datetime_as_bson_datetime")]
    pub used_at: Option<DateTime<Utc>>,
}

impl VoterTokenCore {
    /// A fresh, unused token.
    pub fn new(election_id: Id, voter_id: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            election_id,
            voter_id: voter_id.into(),
            used: false,
            issued_at,
            used_at: None,
        }
    }

    /// Mark the token as consumed.
    pub fn mark_used(&mut self, at: DateTime<Utc>) {
        self.used = true;
        self.used_at = Some(at);
    }
}

/// A token from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterToken {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub token: VoterTokenCore,
}

impl VoterToken {
    pub fn new(token: VoterTokenCore) -> Self {
        Self {
            id: Id::new(),
            token,
        }
    }
}

impl Deref for VoterToken {
    type Target = VoterTokenCore;

    fn deref(&self) -> &Self::Target {
        &self.token
    }
}

impl DerefMut for VoterToken {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.token
    }
}
