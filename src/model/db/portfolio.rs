use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core portfolio (electable position) data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioCore {
    /// Foreign Key election ID.
    pub election_id: Id,
    /// Position title, e.g. "President".
    pub title: String,
    pub description: String,
    /// Presentation order on the ballot. Ties keep insertion order.
    pub ballot_order: Option<i32>,
}

/// A portfolio from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub portfolio: PortfolioCore,
}

impl Portfolio {
    /// The order this portfolio takes on the ballot, substituting `unset`
    /// when none was recorded.
    pub fn effective_order(&self, unset: i32) -> i32 {
        self.ballot_order.unwrap_or(unset)
    }
}

impl Deref for Portfolio {
    type Target = PortfolioCore;

    fn deref(&self) -> &Self::Target {
        &self.portfolio
    }
}

impl DerefMut for Portfolio {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.portfolio
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Portfolio {
        pub fn example(election_id: Id, title: &str, ballot_order: Option<i32>) -> Self {
            Self {
                id: Id::new(),
                portfolio: PortfolioCore {
                    election_id,
                    title: title.to_string(),
                    description: format!("Elected {title} for the coming year"),
                    ballot_order,
                },
            }
        }
    }
}
