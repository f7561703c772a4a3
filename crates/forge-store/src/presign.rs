//! # Presigned Download Tokens
//!
//! Time-bounded download grants for the store service. A token is
//! HMAC-SHA256 over `<id>:<expires>` with the service secret; holders of a
//! valid, unexpired token may fetch the object body without further
//! credentials. Verification is constant-time (the MAC's own comparison).

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Default lifetime of a presigned URL.
pub const DEFAULT_EXPIRATION: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

/// Presigned-token failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PresignError {
    /// The token's expiry is in the past.
    #[error("download URL expired at {0}")]
    Expired(i64),

    /// The token does not match the id/expiry pair.
    #[error("invalid download token")]
    InvalidToken,
}

/// Signs and verifies download tokens.
#[derive(Clone)]
pub struct Presigner {
    secret: Vec<u8>,
    expiration: std::time::Duration,
}

impl Presigner {
    pub fn new(secret: impl AsRef<[u8]>, expiration: std::time::Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            expiration,
        }
    }

    /// Issue `(expires, token)` for an object id, valid for the configured
    /// lifetime starting now.
    pub fn sign(&self, id: &str) -> (i64, String) {
        let expires = Utc::now().timestamp() + self.expiration.as_secs() as i64;
        (expires, self.token(id, expires))
    }

    /// Check a presented token against the id and expiry it claims.
    pub fn verify(&self, id: &str, expires: i64, token: &str) -> Result<(), PresignError> {
        if Utc::now().timestamp() > expires {
            return Err(PresignError::Expired(expires));
        }
        let presented = hex::decode(token).map_err(|_| PresignError::InvalidToken)?;
        self.mac(id, expires)
            .verify_slice(&presented)
            .map_err(|_| PresignError::InvalidToken)
    }

    fn token(&self, id: &str, expires: i64) -> String {
        hex::encode(self.mac(id, expires).finalize().into_bytes())
    }

    fn mac(&self, id: &str, expires: i64) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(format!("{id}:{expires}").as_bytes());
        mac
    }
}

impl std::fmt::Debug for Presigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The secret stays out of debug output.
        f.debug_struct("Presigner")
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}
