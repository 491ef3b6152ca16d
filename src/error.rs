use chrono::{DateTime, Utc};
use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::mongodb::Id;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The backing store failed; the caller may retry.
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Invalid access token: {0}")]
    InvalidToken(String),
    #[error("Election '{0}' not found")]
    ElectionNotFound(Id),
    #[error("Election '{0}' is not accepting ballots")]
    ElectionNotActive(Id),
    #[error("Voter is not eligible to vote in election '{0}'")]
    NotEligible(Id),
    #[error("Ballot already cast at {voted_at}")]
    AlreadyVoted { voted_at: DateTime<Utc> },
    #[error("Incomplete ballot: no selection for portfolio '{0}'")]
    IncompleteBallot(Id),
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
}

impl Error {
    pub fn invalid_selection(msg: impl Into<String>) -> Self {
        Self::InvalidSelection(msg.into())
    }

    /// The machine-readable code reported to API clients.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Db(_) | Self::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            Self::InvalidToken(_) => ErrorCode::InvalidToken,
            Self::ElectionNotFound(_) => ErrorCode::ElectionNotFound,
            Self::ElectionNotActive(_) => ErrorCode::ElectionNotActive,
            Self::NotEligible(_) => ErrorCode::NotEligible,
            Self::AlreadyVoted { .. } => ErrorCode::AlreadyVoted,
            Self::IncompleteBallot(_) => ErrorCode::IncompleteBallot,
            Self::InvalidSelection(_) => ErrorCode::InvalidSelection,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::StoreUnavailable(_) => Status::ServiceUnavailable,
            Self::InvalidToken(_) => Status::Unauthorized,
            Self::ElectionNotFound(_) => Status::NotFound,
            Self::NotEligible(_) => Status::Forbidden,
            Self::ElectionNotActive(_) | Self::AlreadyVoted { .. } => Status::Conflict,
            Self::IncompleteBallot(_) => Status::BadRequest,
            Self::InvalidSelection(_) => Status::UnprocessableEntity,
        }
    }

    /// Is this a transient failure that the caller may retry?
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Db(_) | Self::StoreUnavailable(_))
    }
}

impl From<JwtError> for Error {
    fn from(err: JwtError) -> Self {
        Self::InvalidToken(err.to_string())
    }
}

/// Error codes exposed in API error bodies.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AlreadyVoted,
    ElectionNotFound,
    ElectionNotActive,
    IncompleteBallot,
    InvalidSelection,
    InvalidToken,
    NotEligible,
    StoreUnavailable,
}

/// The JSON body sent back for any failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub error_code: ErrorCode,
    pub message: String,
    /// When the voter's original ballot was cast, for `ALREADY_VOTED`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voted_at: Option<DateTime<Utc>>,
    pub retryable: bool,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        let message = match err {
            // Don't leak database internals to clients.
            Error::Db(_) => "The ballot store is temporarily unavailable, please retry".to_string(),
            other => other.to_string(),
        };
        let voted_at = match err {
            Error::AlreadyVoted { voted_at } => Some(*voted_at),
            _ => None,
        };
        Self {
            success: false,
            error_code: err.code(),
            message,
            voted_at,
            retryable: err.is_retryable(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        match status.class() {
            StatusClass::ServerError => error!("{self}"),
            _ => debug!("{self}"),
        }
        (status, Json(ErrorBody::from(&self))).respond_to(req)
    }
}
