use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::api::id::ApiId;

/// The ballot presented to a voter: every portfolio of the election in
/// ballot order, each with its candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    pub election_id: ApiId,
    pub title: String,
    pub portfolios: Vec<BallotPortfolio>,
    /// When the voter's access token expires.
    pub session_expiry: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotPortfolio {
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub ballot_order: Option<i32>,
    /// Single-candidate portfolio, voted on yes/no.
    pub referendum: bool,
    pub candidates: Vec<BallotCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotCandidate {
    pub id: ApiId,
    pub name: String,
    pub photo_url: Option<String>,
    pub manifesto: Option<String>,
}

/// Request to load a ballot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBallotRequest {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBallotResponse {
    pub success: bool,
    pub ballot: Ballot,
}

/// Request to cast a completed ballot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBallotRequest {
    pub access_token: String,
    pub selections: Vec<SelectionSpec>,
}

/// The voter's choice for one portfolio. A missing candidate is a "no" on a
/// referendum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionSpec {
    pub portfolio_id: ApiId,
    #[serde(default)]
    pub candidate_id: Option<ApiId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBallotResponse {
    pub success: bool,
    pub cast_at: DateTime<Utc>,
}
