use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::election::ElectionStatus, mongodb::Id};

/// Core election data, as stored in the database.
/// Owned by the election-management workflow; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Election title.
    pub title: String,
    /// Lifecycle status.
    pub status: ElectionStatus,
    /// Scheduled opening time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    /// Scheduled closing time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    /// Department the election is restricted to; `None` for a general election.
    pub department: Option<String>,
}

impl ElectionCore {
    /// Scheduled length of the voting window in (fractional) hours.
    pub fn scheduled_hours(&self) -> f64 {
        (self.end_time - self.start_time).num_seconds() as f64 / 3600.0
    }
}

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// Example data for tests.
#[cfg(test)]
pub(crate) mod examples {
    use chrono::TimeZone;

    use super::*;

    impl ElectionCore {
        /// A general election running 08:00-20:00 UTC on 2024-03-14.
        pub fn live_example() -> Self {
            Self {
                title: "Student Union General Election".to_string(),
                status: ElectionStatus::Live,
                start_time: Utc.with_ymd_and_hms(2024, 3, 14, 8, 0, 0).unwrap(),
                end_time: Utc.with_ymd_and_hms(2024, 3, 14, 20, 0, 0).unwrap(),
                department: None,
            }
        }

        pub fn with_status(mut self, status: ElectionStatus) -> Self {
            self.status = status;
            self
        }
    }

    impl Election {
        pub fn live_example() -> Self {
            Self {
                id: Id::new(),
                election: ElectionCore::live_example(),
            }
        }
    }
}
