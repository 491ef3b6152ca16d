use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, common::election::ElectionStatus};

/// Token-based turnout for an election.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnoutStats {
    /// Voters holding a token.
    pub total_voters: u64,
    /// Voters whose token has been used.
    pub voted: u64,
    pub pending: u64,
    pub turnout_percentage: f64,
    /// Vote rows, one per portfolio per ballot.
    pub total_votes: u64,
    /// Votes per hour, rounded.
    pub voting_rate: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateTally {
    pub candidate_id: ApiId,
    pub name: String,
    pub votes: u64,
    /// Share of the portfolio's votes.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStanding {
    pub portfolio_id: ApiId,
    pub title: String,
    pub votes: u64,
    /// Share of all votes in the election.
    pub percentage: f64,
    pub candidates: Vec<CandidateTally>,
    /// Votes cast with no candidate, i.e. "no" on a referendum.
    pub rejections: u64,
    /// Strictly most-voted candidate; the first listed wins a tie. This is
    /// not an authoritative tie resolution.
    pub leading_candidate: Option<ApiId>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyBucket {
    /// Local wall-clock hour, 0-23.
    pub hour: u32,
    pub votes: u64,
    pub cumulative: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingTimeline {
    /// Hours from the first with a vote through 23.
    pub buckets: Vec<HourlyBucket>,
    pub peak_hour: Option<u32>,
    pub total_votes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterBreakdown {
    pub voted: u64,
    pub pending: u64,
    pub voted_percentage: f64,
    pub pending_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipationRow {
    pub label: String,
    pub eligible: u64,
    pub voted: u64,
    pub percentage: f64,
}

/// Tokens carry no department, so there is one row for the whole
/// electorate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participation {
    pub breakdown: VoterBreakdown,
    pub rows: Vec<ParticipationRow>,
}

/// A point-in-time snapshot of an election's results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyReport {
    pub election_id: ApiId,
    pub title: String,
    pub status: ElectionStatus,
    pub generated_at: DateTime<Utc>,
    pub turnout: TurnoutStats,
    pub standings: Vec<PortfolioStanding>,
    pub timeline: VotingTimeline,
    pub participation: Participation,
}
