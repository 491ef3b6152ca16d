use std::time::Duration;

use mongodb::{
    bson::{doc, oid::ObjectId, DateTime as BsonDateTime},
    error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR},
    options::{FindOneOptions, FindOptions},
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;
use rocket::tokio::time::sleep;

use crate::error::{Error, Result};
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
};
use crate::store::{BallotSubmission, RecordOutcome, VoteStore};
use crate::voting::Fingerprint;

use super::{is_duplicate_key_error, Coll, Id};

/// How many times a ballot transaction is attempted before a transient
/// (e.g. write-conflict) failure is reported as an outage.
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// Pause before retrying a conflicted ballot transaction, multiplied by the
/// attempt number.
const TRANSACTION_BACKOFF: Duration = Duration::from_millis(20);

/// A [`VoteStore`] backed by MongoDB.
///
/// Ballot writes run in a multi-document transaction, so the deployment must
/// be a replica set (a single-node replica set is fine).
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    elections: Coll<Election>,
    portfolios: Coll<Portfolio>,
    candidates: Coll<Candidate>,
    voter_tokens: Coll<VoterToken>,
    votes: Coll<Vote>,
    new_votes: Coll<NewVote>,
    audit_events: Coll<AuditEvent>,
    new_audit_events: Coll<NewAuditEvent>,
}

impl MongoStore {
    pub fn new(client: Client, db: Database) -> Self {
        Self {
            client,
            elections: Coll::from_db(&db),
            portfolios: Coll::from_db(&db),
            candidates: Coll::from_db(&db),
            voter_tokens: Coll::from_db(&db),
            votes: Coll::from_db(&db),
            new_votes: Coll::from_db(&db),
            audit_events: Coll::from_db(&db),
            new_audit_events: Coll::from_db(&db),
        }
    }

    /// Whether the submitting voter's token has been committed as used.
    async fn token_used(&self, submission: &BallotSubmission) -> Result<bool> {
        let filter = doc! {
            "election_id": *submission.election_id,
            "voter_id": &submission.voter_id,
            "used": true,
        };
        Ok(self.voter_tokens.find_one(filter, None).await?.is_some())
    }

    /// One attempt at the ballot transaction.
    async fn try_record_ballot(
        &self,
        submission: &BallotSubmission,
        session: &mut ClientSession,
    ) -> std::result::Result<RecordOutcome, DbError> {
        session.start_transaction(None).await?;

        // Consume the token. A used or missing token matches nothing.
        let unused_token = doc! {
            "election_id": *submission.election_id,
            "voter_id": &submission.voter_id,
            "used": false,
        };
        let consume = doc! {
            "$set": {
                "used": true,
                "used_at": BsonDateTime::from_chrono(submission.cast_at),
            }
        };
        let result = self
            .voter_tokens
            .update_one_with_session(unused_token, consume, None, session)
            .await?;
        if result.matched_count == 0 {
            session.abort_transaction().await?;
            let any_token = doc! {
                "election_id": *submission.election_id,
                "voter_id": &submission.voter_id,
            };
            let exists = self.voter_tokens.find_one(any_token, None).await?.is_some();
            return Ok(if exists {
                RecordOutcome::AlreadyVoted
            } else {
                RecordOutcome::NotEligible
            });
        }

        // The unique (election, fingerprint, portfolio) index is the ground truth.
        if let Err(e) = self
            .new_votes
            .insert_many_with_session(&submission.votes, None, session)
            .await
        {
            if is_duplicate_key_error(&e) {
                session.abort_transaction().await?;
                return Ok(RecordOutcome::AlreadyVoted);
            }
            return Err(e);
        }

        self.new_audit_events
            .insert_one_with_session(&submission.audit, None, session)
            .await?;

        session.commit_transaction().await?;
        Ok(RecordOutcome::Recorded)
    }
}

#[rocket::async_trait]
impl VoteStore for MongoStore {
    async fn election(&self, election_id: Id) -> Result<Option<Election>> {
        Ok(self.elections.find_one(election_id.as_doc(), None).await?)
    }

    async fn portfolios(&self, election_id: Id) -> Result<Vec<Portfolio>> {
        let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
        let portfolios = self
            .portfolios
            .find(doc! {"election_id": *election_id}, options)
            .await?
            .try_collect()
            .await?;
        Ok(portfolios)
    }

    async fn candidates(&self, portfolio_ids: &[Id]) -> Result<Vec<Candidate>> {
        let ids = portfolio_ids
            .iter()
            .map(|id| ObjectId::from(*id))
            .collect::<Vec<_>>();
        let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
        let candidates = self
            .candidates
            .find(doc! {"portfolio_id": {"$in": ids}}, options)
            .await?
            .try_collect()
            .await?;
        Ok(candidates)
    }

    async fn vote_by_fingerprint(
        &self,
        election_id: Id,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Vote>> {
        let filter = doc! {
            "election_id": *election_id,
            "voter_fingerprint": fingerprint.as_str(),
        };
        let options = FindOneOptions::builder().sort(doc! {"cast_at": 1}).build();
        Ok(self.votes.find_one(filter, options).await?)
    }

    async fn votes(&self, election_id: Id) -> Result<Vec<Vote>> {
        let votes = self
            .votes
            .find(doc! {"election_id": *election_id}, None)
            .await?
            .try_collect()
            .await?;
        Ok(votes)
    }

    async fn voter_token(&self, election_id: Id, voter_id: &str) -> Result<Option<VoterToken>> {
        let filter = doc! {
            "election_id": *election_id,
            "voter_id": voter_id,
        };
        Ok(self.voter_tokens.find_one(filter, None).await?)
    }

    async fn voter_tokens(&self, election_id: Id) -> Result<Vec<VoterToken>> {
        let tokens = self
            .voter_tokens
            .find(doc! {"election_id": *election_id}, None)
            .await?
            .try_collect()
            .await?;
        Ok(tokens)
    }

    async fn record_ballot(&self, submission: BallotSubmission) -> Result<RecordOutcome> {
        let mut session = self.client.start_session(None).await?;
        let mut attempt = 1;
        loop {
            match self.try_record_ballot(&submission, &mut session).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.contains_label(TRANSIENT_TRANSACTION_ERROR) => {
                    // Typically a concurrent submission touching the same token.
                    warn!("Ballot transaction attempt {attempt} hit a transient error: {e}");
                    // Fails harmlessly if the server already aborted it.
                    let _ = session.abort_transaction().await;
                    if self.token_used(&submission).await? {
                        return Ok(RecordOutcome::AlreadyVoted);
                    }
                    if attempt >= MAX_TRANSACTION_ATTEMPTS {
                        error!("Ballot transaction gave up after {attempt} attempts");
                        return Err(Error::StoreUnavailable(e.to_string()));
                    }
                    sleep(TRANSACTION_BACKOFF * attempt).await;
                    attempt += 1;
                }
                // Dropping the session aborts any open transaction.
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn append_audit_event(&self, event: NewAuditEvent) -> Result<()> {
        self.new_audit_events.insert_one(event, None).await?;
        Ok(())
    }

    async fn audit_events(
        &self,
        election_id: Id,
        actions: &[AuditAction],
        limit: usize,
    ) -> Result<Vec<AuditEvent>> {
        // MongoDB reads a zero limit as "no limit".
        if limit == 0 {
            return Ok(Vec::new());
        }
        let filter = doc! {
            "election_id": *election_id,
            "action": {"$in": actions.to_vec()},
        };
        let options = FindOptions::builder()
            .sort(doc! {"timestamp": -1, "_id": -1})
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build();
        let events = self
            .audit_events
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok(events)
    }

    async fn count_audit_events(&self, election_id: Id, action: AuditAction) -> Result<u64> {
        let filter = doc! {
            "election_id": *election_id,
            "action": action,
        };
        Ok(self.audit_events.count_documents(filter, None).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mongodb::bson::doc;
    use rocket::futures::future::join_all;

    use super::*;
    use crate::model::db::{
        audit_event::AuditEventCore, election::ElectionCore, vote::VoteCore,
        voter_token::VoterTokenCore,
    };
    use crate::voting::TokenHasher;

    fn submission_for(election_id: Id, portfolio_id: Id, voter_id: &str) -> BallotSubmission {
        let fingerprint = TokenHasher::new("test secret").fingerprint(voter_id);
        let cast_at = Utc::now();
        BallotSubmission {
            election_id,
            voter_id: voter_id.to_string(),
            fingerprint: fingerprint.clone(),
            cast_at,
            votes: vec![VoteCore {
                election_id,
                portfolio_id,
                candidate_id: None,
                voter_fingerprint: fingerprint.clone(),
                cast_at,
            }],
            audit: AuditEventCore::new(
                fingerprint.as_str(),
                election_id,
                AuditAction::VoteCast,
                doc! {},
                cast_at,
            ),
        }
    }

    #[backend_test]
    #[ignore = "requires a MongoDB replica set at `db_uri`"]
    async fn records_ballot_exactly_once(store: MongoStore, elections: Coll<ElectionCore>) {
        let election_id: Id = elections
            .insert_one(ElectionCore::live_example(), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();
        store
            .voter_tokens
            .insert_one(
                VoterToken::new(VoterTokenCore::new(election_id, "s1234567", Utc::now())),
                None,
            )
            .await
            .unwrap();
        let portfolio_id = Id::new();

        let attempts = (0..4)
            .map(|_| store.record_ballot(submission_for(election_id, portfolio_id, "s1234567")));
        let outcomes = join_all(attempts).await;

        let recorded = outcomes
            .iter()
            .filter(|o| matches!(o, Ok(RecordOutcome::Recorded)))
            .count();
        let already_voted = outcomes
            .iter()
            .filter(|o| matches!(o, Ok(RecordOutcome::AlreadyVoted)))
            .count();
        assert_eq!(recorded, 1);
        assert_eq!(already_voted, 3);
        assert_eq!(store.votes(election_id).await.unwrap().len(), 1);
        assert!(store
            .voter_token(election_id, "s1234567")
            .await
            .unwrap()
            .unwrap()
            .used);
        assert_eq!(
            store
                .count_audit_events(election_id, AuditAction::VoteCast)
                .await
                .unwrap(),
            1
        );
    }

    #[backend_test]
    #[ignore = "requires a MongoDB replica set at `db_uri`"]
    async fn zero_limit_returns_no_audit_events(store: MongoStore) {
        let election_id = Id::new();
        for actor in ["a", "b", "c"] {
            store
                .append_audit_event(AuditEventCore::new(
                    actor,
                    election_id,
                    AuditAction::VoteCast,
                    doc! {},
                    Utc::now(),
                ))
                .await
                .unwrap();
        }
        let actions = [AuditAction::VoteCast];

        let all = store.audit_events(election_id, &actions, 10).await.unwrap();
        assert_eq!(all.len(), 3);
        let none = store.audit_events(election_id, &actions, 0).await.unwrap();
        assert!(none.is_empty());
    }

    #[backend_test]
    #[ignore = "requires a MongoDB replica set at `db_uri`"]
    async fn rejects_voter_without_token(store: MongoStore) {
        let election_id = Id::new();
        let outcome = store
            .record_ballot(submission_for(election_id, Id::new(), "s7654321"))
            .await
            .unwrap();
        assert_eq!(outcome, RecordOutcome::NotEligible);
        assert!(store.votes(election_id).await.unwrap().is_empty());
        assert_eq!(
            store
                .count_audit_events(election_id, AuditAction::VoteCast)
                .await
                .unwrap(),
            0
        );
    }
}
