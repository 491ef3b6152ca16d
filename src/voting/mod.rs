//! The vote tallying and ballot-integrity engine.
//!
//! Leaf-first: [`TokenHasher`] fingerprints voters, [`BallotAssembler`] builds
//! a voter's ballot, [`VoteRecorder`] accepts it exactly once, and
//! [`TallyAggregator`] / [`IntegrityAuditor`] report on what was recorded.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::{
    db::{candidate::Candidate, election::Election, portfolio::Portfolio},
    mongodb::Id,
};
use crate::store::VoteStore;

mod assembler;
mod fingerprint;
mod integrity;
mod recorder;
mod tally;

pub use assembler::BallotAssembler;
pub use fingerprint::{Fingerprint, TokenHasher};
pub use integrity::IntegrityAuditor;
pub use recorder::{Recorded, Selection, VoteRecorder};
pub use tally::TallyAggregator;

/// An election together with its portfolios in ballot order, each with its
/// candidates in insertion order.
#[derive(Debug, Clone)]
pub(crate) struct ElectionContents {
    pub election: Election,
    pub portfolios: Vec<PortfolioContents>,
}

#[derive(Debug, Clone)]
pub(crate) struct PortfolioContents {
    pub portfolio: Portfolio,
    pub candidates: Vec<Candidate>,
}

impl PortfolioContents {
    /// A portfolio with a single candidate is a yes/no referendum.
    pub fn is_referendum(&self) -> bool {
        self.candidates.len() == 1
    }

    pub fn candidate(&self, candidate_id: Id) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }
}

impl ElectionContents {
    /// Load an election and everything on its ballot.
    pub async fn load(
        store: &dyn VoteStore,
        election_id: Id,
        unset_ballot_order: i32,
    ) -> Result<Self> {
        let election = store
            .election(election_id)
            .await?
            .ok_or(Error::ElectionNotFound(election_id))?;
        let portfolios = store.portfolios(election_id).await?;
        let portfolio_ids = portfolios.iter().map(|p| p.id).collect::<Vec<_>>();

        let mut candidates_by_portfolio: HashMap<Id, Vec<Candidate>> = HashMap::new();
        for candidate in store.candidates(&portfolio_ids).await? {
            candidates_by_portfolio
                .entry(candidate.portfolio_id)
                .or_default()
                .push(candidate);
        }

        let mut portfolios = portfolios
            .into_iter()
            .map(|portfolio| PortfolioContents {
                candidates: candidates_by_portfolio
                    .remove(&portfolio.id)
                    .unwrap_or_default(),
                portfolio,
            })
            .collect::<Vec<_>>();
        // Stable, so equal orders keep insertion order.
        portfolios.sort_by_key(|p| p.portfolio.effective_order(unset_ballot_order));

        Ok(Self {
            election,
            portfolios,
        })
    }

    pub fn portfolio(&self, portfolio_id: Id) -> Option<&PortfolioContents> {
        self.portfolios
            .iter()
            .find(|p| p.portfolio.id == portfolio_id)
    }
}

/// Shared fixtures for the engine's tests.
#[cfg(test)]
pub(crate) mod examples {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use crate::model::db::{
        candidate::Candidate, election::Election, portfolio::Portfolio,
        voter_token::{VoterToken, VoterTokenCore},
    };
    use crate::model::mongodb::Id;
    use crate::store::MemoryStore;

    /// A live election with a three-way presidential race (ballot order 1)
    /// and a referendum (ballot order 2).
    pub struct ExampleElection {
        pub store: Arc<MemoryStore>,
        pub election: Election,
        pub president: Portfolio,
        pub candidates: Vec<Candidate>,
        pub referendum: Portfolio,
        pub referendum_option: Candidate,
    }

    impl ExampleElection {
        pub fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let election = Election::live_example();
            // Insert the referendum first so ballot order has to reorder.
            let referendum = Portfolio::example(election.id, "Constitution Amendment", Some(2));
            let president = Portfolio::example(election.id, "President", Some(1));
            let candidates = ["Alice Mensah", "Bongani Dlamini", "Chen Wei"]
                .into_iter()
                .map(|name| Candidate::example(president.id, name))
                .collect::<Vec<_>>();
            let referendum_option = Candidate::example(referendum.id, "Adopt the amendment");

            store.add_election(election.clone());
            store.add_portfolio(referendum.clone());
            store.add_portfolio(president.clone());
            for candidate in &candidates {
                store.add_candidate(candidate.clone());
            }
            store.add_candidate(referendum_option.clone());

            Self {
                store,
                election,
                president,
                candidates,
                referendum,
                referendum_option,
            }
        }

        /// Provision tokens for voters `voter0`, `voter1`, ...
        pub fn with_voters(self, count: usize) -> Self {
            let issued_at = Utc.with_ymd_and_hms(2024, 3, 13, 12, 0, 0).unwrap();
            for i in 0..count {
                self.store.add_voter_token(VoterToken::new(VoterTokenCore::new(
                    self.election.id,
                    Self::voter_id(i),
                    issued_at,
                )));
            }
            self
        }

        pub fn voter_id(i: usize) -> String {
            format!("voter{i}")
        }

        pub fn election_id(&self) -> Id {
            self.election.id
        }

        /// Some time during polling.
        pub fn polling_time(hour: u32) -> chrono::DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 3, 14, hour, 0, 0).unwrap() + Duration::minutes(15)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::examples::ExampleElection;
    use super::*;
    use crate::model::db::portfolio::Portfolio;

    #[rocket::async_test]
    async fn orders_portfolios_by_ballot_order() {
        let example = ExampleElection::new();
        let contents = ElectionContents::load(example.store.as_ref(), example.election_id(), 0)
            .await
            .unwrap();
        let titles = contents
            .portfolios
            .iter()
            .map(|p| p.portfolio.title.as_str())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["President", "Constitution Amendment"]);
        assert_eq!(contents.portfolios[0].candidates.len(), 3);
        assert!(contents.portfolios[1].is_referendum());
    }

    #[rocket::async_test]
    async fn unset_order_uses_default_and_ties_keep_insertion_order() {
        let example = ExampleElection::new();
        let treasurer = Portfolio::example(example.election_id(), "Treasurer", None);
        let secretary = Portfolio::example(example.election_id(), "Secretary", None);
        example.store.add_portfolio(treasurer);
        example.store.add_portfolio(secretary);

        let load = |unset| ElectionContents::load(example.store.as_ref(), example.election_id(), unset);

        let titles = |contents: ElectionContents| {
            contents
                .portfolios
                .into_iter()
                .map(|p| p.portfolio.title.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(
            titles(load(0).await.unwrap()),
            vec!["Treasurer", "Secretary", "President", "Constitution Amendment"]
        );
        assert_eq!(
            titles(load(10).await.unwrap()),
            vec!["President", "Constitution Amendment", "Treasurer", "Secretary"]
        );
    }

    #[rocket::async_test]
    async fn missing_election() {
        let example = ExampleElection::new();
        let missing = Id::new();
        let err = ElectionContents::load(example.store.as_ref(), missing, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElectionNotFound(id) if id == missing));
    }
}
