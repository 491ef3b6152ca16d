use std::fmt::{Display, Formatter};

use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Opaque one-way digest of a voter's identifier, stored on vote rows in
/// place of the identifier itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps voter identifiers to fingerprints with a keyed SHA-256 (HMAC), so
/// fingerprints of guessable identifiers can't be recomputed without the
/// server secret.
#[derive(Clone)]
pub struct TokenHasher {
    key: Vec<u8>,
}

impl TokenHasher {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
        }
    }

    /// Deterministically fingerprint the given voter identifier.
    pub fn fingerprint(&self, voter_id: &str) -> Fingerprint {
        let mut hmac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        hmac.update(voter_id.as_bytes());
        Fingerprint(HEXLOWER.encode(&hmac.finalize().into_bytes()))
    }
}
