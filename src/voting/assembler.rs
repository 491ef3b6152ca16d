use crate::error::{Error, Result};
use crate::model::api::{
    access::VoterSession,
    ballot::{Ballot, BallotCandidate, BallotPortfolio},
};
use crate::store::SharedStore;

use super::{ElectionContents, TokenHasher};

/// Builds the ballot a verified voter is shown.
#[derive(Clone)]
pub struct BallotAssembler {
    store: SharedStore,
    hasher: TokenHasher,
    unset_ballot_order: i32,
}

impl BallotAssembler {
    pub fn new(store: SharedStore, hasher: TokenHasher, unset_ballot_order: i32) -> Self {
        Self {
            store,
            hasher,
            unset_ballot_order,
        }
    }

    /// Load the ballot for the voter's election, or explain why they can't
    /// have one. Read-only.
    pub async fn load_ballot(&self, voter: &VoterSession) -> Result<Ballot> {
        if voter.voter_id.is_empty() {
            return Err(Error::InvalidToken("empty voter identifier".to_string()));
        }
        let election_id = voter.election_id;
        if self.store.election(election_id).await?.is_none() {
            return Err(Error::ElectionNotFound(election_id));
        }

        let fingerprint = self.hasher.fingerprint(&voter.voter_id);
        if let Some(vote) = self
            .store
            .vote_by_fingerprint(election_id, &fingerprint)
            .await?
        {
            warn!("Refused ballot for election {election_id}: voter has already voted");
            return Err(Error::AlreadyVoted {
                voted_at: vote.cast_at,
            });
        }

        let contents =
            ElectionContents::load(self.store.as_ref(), election_id, self.unset_ballot_order)
                .await?;
        debug!(
            "Assembled ballot for election {election_id} with {} portfolios",
            contents.portfolios.len()
        );

        let portfolios = contents
            .portfolios
            .into_iter()
            .map(|p| BallotPortfolio {
                id: p.portfolio.id.into(),
                referendum: p.is_referendum(),
                title: p.portfolio.portfolio.title,
                description: p.portfolio.portfolio.description,
                ballot_order: p.portfolio.portfolio.ballot_order,
                candidates: p
                    .candidates
                    .into_iter()
                    .map(|c| BallotCandidate {
                        id: c.id.into(),
                        name: c.candidate.name,
                        photo_url: c.candidate.photo_url,
                        manifesto: c.candidate.manifesto,
                    })
                    .collect(),
            })
            .collect();

        Ok(Ballot {
            election_id: election_id.into(),
            title: contents.election.election.title,
            portfolios,
            session_expiry: voter.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::model::{
        db::vote::{Vote, VoteCore},
        mongodb::Id,
    };
    use crate::store::VoteStore;
    use crate::voting::examples::ExampleElection;

    fn session(example: &ExampleElection, voter: usize) -> VoterSession {
        VoterSession {
            voter_id: ExampleElection::voter_id(voter),
            election_id: example.election_id(),
            expires_at: Utc::now() + Duration::minutes(30),
        }
    }

    fn assembler(example: &ExampleElection) -> BallotAssembler {
        BallotAssembler::new(example.store.clone(), TokenHasher::new("secret"), 0)
    }

    #[rocket::async_test]
    async fn assembles_ordered_ballot() {
        let example = ExampleElection::new().with_voters(1);
        let voter = session(&example, 0);
        let ballot = assembler(&example).load_ballot(&voter).await.unwrap();

        assert_eq!(*ballot.election_id, example.election_id());
        assert_eq!(ballot.title, example.election.title);
        assert_eq!(ballot.session_expiry, voter.expires_at);
        assert_eq!(ballot.portfolios.len(), 2);

        let president = &ballot.portfolios[0];
        assert_eq!(*president.id, example.president.id);
        assert!(!president.referendum);
        let names = president
            .candidates
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Alice Mensah", "Bongani Dlamini", "Chen Wei"]);

        let referendum = &ballot.portfolios[1];
        assert_eq!(*referendum.id, example.referendum.id);
        assert!(referendum.referendum);
        assert_eq!(referendum.candidates.len(), 1);
    }

    #[rocket::async_test]
    async fn loading_is_idempotent() {
        let example = ExampleElection::new().with_voters(1);
        let voter = session(&example, 0);
        let assembler = assembler(&example);
        let first = assembler.load_ballot(&voter).await.unwrap();
        let second = assembler.load_ballot(&voter).await.unwrap();
        assert_eq!(first, second);
        assert!(example.store.votes(example.election_id()).await.unwrap().is_empty());
    }

    #[rocket::async_test]
    async fn rejects_voter_who_already_voted() {
        let example = ExampleElection::new().with_voters(1);
        let voter = session(&example, 0);
        let cast_at = ExampleElection::polling_time(9);
        example.store.add_vote(Vote::new(VoteCore {
            election_id: example.election_id(),
            portfolio_id: example.president.id,
            candidate_id: Some(example.candidates[0].id),
            voter_fingerprint: TokenHasher::new("secret").fingerprint(&voter.voter_id),
            cast_at,
        }));

        let err = assembler(&example).load_ballot(&voter).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyVoted { voted_at } if voted_at == cast_at));
    }

    #[rocket::async_test]
    async fn rejects_unknown_election() {
        let example = ExampleElection::new();
        let mut voter = session(&example, 0);
        voter.election_id = Id::new();
        let err = assembler(&example).load_ballot(&voter).await.unwrap_err();
        assert!(matches!(err, Error::ElectionNotFound(_)));
    }

    #[rocket::async_test]
    async fn rejects_empty_voter_id() {
        let example = ExampleElection::new();
        let mut voter = session(&example, 0);
        voter.voter_id.clear();
        let err = assembler(&example).load_ballot(&voter).await.unwrap_err();
        assert!(matches!(err, Error::InvalidToken(_)));
    }

    #[rocket::async_test]
    async fn store_outage_is_an_error() {
        let example = ExampleElection::new();
        example.store.set_available(false);
        let err = assembler(&example)
            .load_ballot(&session(&example, 0))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
