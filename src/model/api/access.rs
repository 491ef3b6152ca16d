use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{api::id::ApiId, mongodb::Id};

/// A verified voter for one election, as vouched for by the authentication
/// service's access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterSession {
    /// Opaque voter identifier (e.g. a student number). Only ever hashed.
    pub voter_id: String,
    pub election_id: Id,
    /// When the access token stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl VoterSession {
    /// Verify and decode an access token.
    pub fn from_access_token(token: &str, config: &Config) -> Result<Self> {
        let claims = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.access_token_secret()),
            &Validation::default(),
        )
        .map(|data: TokenData<AccessClaims>| data.claims)?;
        if claims.voter_id.is_empty() {
            return Err(Error::InvalidToken("access token has no voter".to_string()));
        }
        Ok(Self {
            voter_id: claims.voter_id,
            election_id: claims.election_id.into(),
            expires_at: claims.expire_at,
        })
    }

    /// Sign this session into an access token, as the authentication service
    /// would.
    #[allow(clippy::missing_panics_doc)]
    pub fn into_access_token(self, config: &Config) -> String {
        let claims = AccessClaims {
            voter_id: self.voter_id,
            election_id: self.election_id.into(),
            expire_at: self.expires_at,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.access_token_secret()),
        )
        .expect("JWT encoding is infallible with default settings")
    }
}

/// Access token claims.
#[derive(Serialize, Deserialize)]
struct AccessClaims {
    #[serde(rename = "sub")]
    voter_id: String,
    #[serde(rename = "eid")]
    election_id: ApiId,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}
