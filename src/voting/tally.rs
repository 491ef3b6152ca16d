use chrono::{DateTime, Utc};

use crate::clock::{Clock, SharedClock};
use crate::error::Result;
use crate::model::{
    api::tally::{
        CandidateTally, HourlyBucket, Participation, ParticipationRow, PortfolioStanding,
        TallyReport, TurnoutStats, VoterBreakdown, VotingTimeline,
    },
    common::election::ElectionStatus,
    db::{election::ElectionCore, vote::Vote, voter_token::VoterToken},
    mongodb::Id,
};
use crate::store::SharedStore;

use super::{ElectionContents, PortfolioContents};

/// Label of the single participation row when the election is open to all.
const WHOLE_ELECTORATE: &str = "All voters";

/// Turns vote and token rows into report statistics. Never writes.
#[derive(Clone)]
pub struct TallyAggregator {
    store: SharedStore,
    clock: SharedClock,
    unset_ballot_order: i32,
}

/// Everything the statistics are computed from, read once.
struct Snapshot {
    contents: ElectionContents,
    tokens: Vec<VoterToken>,
    votes: Vec<Vote>,
    taken_at: DateTime<Utc>,
}

impl TallyAggregator {
    pub fn new(store: SharedStore, clock: SharedClock, unset_ballot_order: i32) -> Self {
        Self {
            store,
            clock,
            unset_ballot_order,
        }
    }

    async fn snapshot(&self, election_id: Id) -> Result<Snapshot> {
        let contents =
            ElectionContents::load(self.store.as_ref(), election_id, self.unset_ballot_order)
                .await?;
        let tokens = self.store.voter_tokens(election_id).await?;
        let votes = self.store.votes(election_id).await?;
        debug!(
            "Tallying election {election_id}: {} tokens, {} votes",
            tokens.len(),
            votes.len()
        );
        Ok(Snapshot {
            contents,
            tokens,
            votes,
            taken_at: self.clock.now(),
        })
    }

    pub async fn turnout(&self, election_id: Id) -> Result<TurnoutStats> {
        let s = self.snapshot(election_id).await?;
        Ok(turnout(&s.contents.election, &s.tokens, &s.votes, s.taken_at))
    }

    pub async fn standings(&self, election_id: Id) -> Result<Vec<PortfolioStanding>> {
        let s = self.snapshot(election_id).await?;
        Ok(standings(&s.contents, &s.votes))
    }

    pub async fn timeline(&self, election_id: Id) -> Result<VotingTimeline> {
        let s = self.snapshot(election_id).await?;
        Ok(timeline(&s.votes, self.clock.as_ref()))
    }

    pub async fn participation(&self, election_id: Id) -> Result<Participation> {
        let s = self.snapshot(election_id).await?;
        Ok(participation(&s.contents.election, &s.tokens))
    }

    /// All statistics, computed from a single read of the store.
    pub async fn report(&self, election_id: Id) -> Result<TallyReport> {
        let s = self.snapshot(election_id).await?;
        let election = &s.contents.election;
        Ok(TallyReport {
            election_id: election_id.into(),
            title: election.title.clone(),
            status: election.status,
            generated_at: s.taken_at,
            turnout: turnout(election, &s.tokens, &s.votes, s.taken_at),
            standings: standings(&s.contents, &s.votes),
            timeline: timeline(&s.votes, self.clock.as_ref()),
            participation: participation(election, &s.tokens),
        })
    }
}

/// `part / whole` as a percentage to 2 decimal places, halves rounded up;
/// 0 for an empty whole.
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    // Exact in integers: floor(part * 10_000 / whole + 1/2).
    let (part, whole) = (u128::from(part), u128::from(whole));
    let hundredths = (part * 20_000 + whole) / (2 * whole);
    hundredths as f64 / 100.0
}

fn count_used(tokens: &[VoterToken]) -> u64 {
    tokens.iter().filter(|t| t.used).count() as u64
}

fn turnout(
    election: &ElectionCore,
    tokens: &[VoterToken],
    votes: &[Vote],
    now: DateTime<Utc>,
) -> TurnoutStats {
    let total_voters = tokens.len() as u64;
    let voted = count_used(tokens);
    let total_votes = votes.len() as u64;
    TurnoutStats {
        total_voters,
        voted,
        pending: total_voters - voted,
        turnout_percentage: percentage(voted, total_voters),
        total_votes,
        voting_rate: voting_rate(election, total_votes, now),
    }
}

/// Votes per hour over the elapsed (live) or scheduled (closed) window,
/// never dividing by less than one hour.
fn voting_rate(election: &ElectionCore, total_votes: u64, now: DateTime<Utc>) -> u64 {
    let hours = match election.status {
        ElectionStatus::Live => (now - election.start_time).num_seconds() as f64 / 3600.0,
        ElectionStatus::Closed => election.scheduled_hours(),
        _ => return 0,
    };
    (total_votes as f64 / hours.max(1.0)).round() as u64
}

fn standings(contents: &ElectionContents, votes: &[Vote]) -> Vec<PortfolioStanding> {
    let total_votes = votes.len() as u64;
    contents
        .portfolios
        .iter()
        .map(|p| standing(p, votes, total_votes))
        .collect()
}

fn standing(contents: &PortfolioContents, votes: &[Vote], total_votes: u64) -> PortfolioStanding {
    let portfolio_votes = votes
        .iter()
        .filter(|v| v.portfolio_id == contents.portfolio.id)
        .collect::<Vec<_>>();
    let votes_in_portfolio = portfolio_votes.len() as u64;
    let rejections = portfolio_votes
        .iter()
        .filter(|v| v.candidate_id.is_none())
        .count() as u64;

    let candidates = contents
        .candidates
        .iter()
        .map(|candidate| {
            let count = portfolio_votes
                .iter()
                .filter(|v| v.candidate_id == Some(candidate.id))
                .count() as u64;
            CandidateTally {
                candidate_id: candidate.id.into(),
                name: candidate.name.clone(),
                votes: count,
                percentage: percentage(count, votes_in_portfolio),
            }
        })
        .collect::<Vec<_>>();

    // Strictly greater, so the first of several equal counts keeps the lead.
    let mut leading: Option<&CandidateTally> = None;
    for tally in candidates.iter().filter(|t| t.votes > 0) {
        if leading.map_or(true, |lead| tally.votes > lead.votes) {
            leading = Some(tally);
        }
    }
    let leading_candidate = leading.map(|t| t.candidate_id);

    PortfolioStanding {
        portfolio_id: contents.portfolio.id.into(),
        title: contents.portfolio.title.clone(),
        votes: votes_in_portfolio,
        percentage: percentage(votes_in_portfolio, total_votes),
        candidates,
        rejections,
        leading_candidate,
    }
}

fn timeline(votes: &[Vote], clock: &dyn Clock) -> VotingTimeline {
    let mut counts = [0u64; 24];
    for vote in votes {
        let hour = clock.local_hour(vote.cast_at) as usize;
        counts[hour % 24] += 1;
    }

    let mut buckets = Vec::new();
    let mut cumulative = 0;
    for (hour, &count) in counts.iter().enumerate() {
        cumulative += count;
        if cumulative > 0 {
            buckets.push(HourlyBucket {
                hour: hour as u32,
                votes: count,
                cumulative,
            });
        }
    }

    let mut peak: Option<&HourlyBucket> = None;
    for bucket in &buckets {
        if peak.map_or(true, |p| bucket.votes > p.votes) {
            peak = Some(bucket);
        }
    }

    VotingTimeline {
        peak_hour: peak.map(|b| b.hour),
        buckets,
        total_votes: cumulative,
    }
}

fn participation(election: &ElectionCore, tokens: &[VoterToken]) -> Participation {
    let eligible = tokens.len() as u64;
    let voted = count_used(tokens);
    let pending = eligible - voted;
    let label = election
        .department
        .clone()
        .unwrap_or_else(|| WHOLE_ELECTORATE.to_string());
    Participation {
        breakdown: VoterBreakdown {
            voted,
            pending,
            voted_percentage: percentage(voted, eligible),
            pending_percentage: percentage(pending, eligible),
        },
        rows: vec![ParticipationRow {
            label,
            eligible,
            voted,
            percentage: percentage(voted, eligible),
        }],
    }
}
