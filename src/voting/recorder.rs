use std::collections::HashSet;

use chrono::{DateTime, SubsecRound, Utc};
use mongodb::bson::doc;

use crate::clock::SharedClock;
use crate::error::{Error, Result};
use crate::model::{
    api::access::VoterSession,
    common::audit::AuditAction,
    db::{audit_event::AuditEventCore, vote::VoteCore},
    mongodb::Id,
};
use crate::store::{BallotSubmission, RecordOutcome, SharedStore};

use super::{ElectionContents, Fingerprint, TokenHasher};

/// A voter's choice for one portfolio.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Selection {
    pub portfolio_id: Id,
    /// `None` is an explicit "no" on a referendum.
    pub candidate_id: Option<Id>,
}

/// A successfully recorded ballot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub election_id: Id,
    pub cast_at: DateTime<Utc>,
    /// Number of vote rows written, one per portfolio.
    pub votes: usize,
}

/// Accepts each voter's ballot exactly once.
#[derive(Clone)]
pub struct VoteRecorder {
    store: SharedStore,
    hasher: TokenHasher,
    clock: SharedClock,
}

impl VoteRecorder {
    pub fn new(store: SharedStore, hasher: TokenHasher, clock: SharedClock) -> Self {
        Self {
            store,
            hasher,
            clock,
        }
    }

    /// Validate and record a ballot. Nothing is written unless every
    /// selection is valid and the voter has not voted before.
    pub async fn submit_ballot(
        &self,
        voter: &VoterSession,
        selections: &[Selection],
    ) -> Result<Recorded> {
        if voter.voter_id.is_empty() {
            return Err(Error::InvalidToken("empty voter identifier".to_string()));
        }
        let election_id = voter.election_id;
        // Ballot order is irrelevant here.
        let contents = ElectionContents::load(self.store.as_ref(), election_id, 0).await?;
        if !contents.election.status.accepts_ballots() {
            return Err(Error::ElectionNotActive(election_id));
        }
        validate_selections(&contents, selections)?;

        let fingerprint = self.hasher.fingerprint(&voter.voter_id);
        // Fast path; the store has the final say.
        if let Some(vote) = self
            .store
            .vote_by_fingerprint(election_id, &fingerprint)
            .await?
        {
            warn!("Rejected repeat ballot for election {election_id}");
            return Err(Error::AlreadyVoted {
                voted_at: vote.cast_at,
            });
        }

        // Stored timestamps keep milliseconds only.
        let cast_at = self.clock.now().trunc_subsecs(3);
        let votes = selections
            .iter()
            .map(|selection| VoteCore {
                election_id,
                portfolio_id: selection.portfolio_id,
                candidate_id: selection.candidate_id,
                voter_fingerprint: fingerprint.clone(),
                cast_at,
            })
            .collect::<Vec<_>>();
        let vote_count = votes.len();
        let audit = AuditEventCore::new(
            fingerprint.as_str(),
            election_id,
            AuditAction::VoteCast,
            doc! { "portfolios": vote_count as i64 },
            cast_at,
        );
        let submission = BallotSubmission {
            election_id,
            voter_id: voter.voter_id.clone(),
            fingerprint: fingerprint.clone(),
            cast_at,
            votes,
            audit,
        };

        match self.store.record_ballot(submission).await? {
            RecordOutcome::Recorded => {
                info!("Recorded ballot of {vote_count} votes for election {election_id}");
                Ok(Recorded {
                    election_id,
                    cast_at,
                    votes: vote_count,
                })
            }
            RecordOutcome::AlreadyVoted => {
                warn!("Lost ballot race for election {election_id}, voter has already voted");
                let voted_at = self
                    .original_cast_time(election_id, &voter.voter_id, &fingerprint)
                    .await?;
                Err(Error::AlreadyVoted { voted_at })
            }
            RecordOutcome::NotEligible => {
                warn!("Rejected ballot for election {election_id}: voter holds no token");
                Err(Error::NotEligible(election_id))
            }
        }
    }

    /// When the voter's accepted ballot was cast. Falls back to the token's
    /// consumption time, then to now, if the rows aren't visible yet.
    async fn original_cast_time(
        &self,
        election_id: Id,
        voter_id: &str,
        fingerprint: &Fingerprint,
    ) -> Result<DateTime<Utc>> {
        if let Some(vote) = self
            .store
            .vote_by_fingerprint(election_id, fingerprint)
            .await?
        {
            return Ok(vote.cast_at);
        }
        let used_at = self
            .store
            .voter_token(election_id, voter_id)
            .await?
            .and_then(|token| token.used_at);
        Ok(used_at.unwrap_or_else(|| self.clock.now().trunc_subsecs(3)))
    }
}

/// Check a ballot covers every portfolio of the election exactly once with a
/// valid choice.
fn validate_selections(contents: &ElectionContents, selections: &[Selection]) -> Result<()> {
    if contents.portfolios.is_empty() {
        return Err(Error::invalid_selection("election has no portfolios"));
    }

    let mut seen = HashSet::new();
    for selection in selections {
        let portfolio = contents.portfolio(selection.portfolio_id).ok_or_else(|| {
            Error::invalid_selection(format!(
                "portfolio '{}' is not part of this election",
                selection.portfolio_id
            ))
        })?;
        if !seen.insert(selection.portfolio_id) {
            return Err(Error::invalid_selection(format!(
                "portfolio '{}' selected more than once",
                selection.portfolio_id
            )));
        }
        match selection.candidate_id {
            Some(candidate_id) => {
                if portfolio.candidate(candidate_id).is_none() {
                    return Err(Error::invalid_selection(format!(
                        "candidate '{candidate_id}' is not standing for portfolio '{}'",
                        selection.portfolio_id
                    )));
                }
            }
            None if portfolio.is_referendum() => {}
            None => {
                return Err(Error::invalid_selection(format!(
                    "portfolio '{}' requires a candidate",
                    selection.portfolio_id
                )));
            }
        }
    }

    if let Some(missing) = contents
        .portfolios
        .iter()
        .find(|p| !seen.contains(&p.portfolio.id))
    {
        return Err(Error::IncompleteBallot(missing.portfolio.id));
    }
    Ok(())
}
