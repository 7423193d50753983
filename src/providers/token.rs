//! APNs provider authentication tokens.
//!
//! APNs authenticates token-based connections with an ES256 JWT whose header
//! names the signing key and whose claims name the developer team. Apple
//! rejects tokens older than one hour and throttles clients that refresh more
//! often than every twenty minutes, so a signed token is cached and reused
//! until [`TOKEN_REFRESH_SECS`] have elapsed.

use std::fmt;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use super::ApnsClientError;

/// Age after which a cached token is re-signed
pub const TOKEN_REFRESH_SECS: i64 = 3000;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    iat: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    bearer: String,
    issued_at: i64,
}

pub struct ProviderToken {
    key: EncodingKey,
    key_id: String,
    team_id: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ProviderToken {
    /// Load a `.p8` signing key from disk
    pub fn from_file(
        path: impl AsRef<Path>,
        key_id: impl Into<String>,
        team_id: impl Into<String>,
    ) -> Result<Self, ApnsClientError> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|source| ApnsClientError::KeyFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_pem(&pem, key_id, team_id)
    }

    /// Build from PEM-encoded PKCS#8 key material.
    ///
    /// A token is signed immediately so that an unusable key fails here
    /// rather than on the first delivery.
    pub fn from_pem(
        pem: &[u8],
        key_id: impl Into<String>,
        team_id: impl Into<String>,
    ) -> Result<Self, ApnsClientError> {
        let key = EncodingKey::from_ec_pem(pem).map_err(ApnsClientError::InvalidKey)?;
        let token = Self {
            key,
            key_id: key_id.into(),
            team_id: team_id.into(),
            cached: Mutex::new(None),
        };
        token.bearer()?;
        Ok(token)
    }

    /// Current bearer token, re-signed when the cached one is too old
    pub fn bearer(&self) -> Result<String, ApnsClientError> {
        self.bearer_at(Utc::now().timestamp())
    }

    fn bearer_at(&self, now: i64) -> Result<String, ApnsClientError> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(token) = cached.as_ref() {
            if now - token.issued_at < TOKEN_REFRESH_SECS {
                return Ok(token.bearer.clone());
            }
        }

        let bearer = self.sign(now)?;
        *cached = Some(CachedToken {
            bearer: bearer.clone(),
            issued_at: now,
        });
        Ok(bearer)
    }

    /// Drop the cached token, e.g. after APNs answered `ExpiredProviderToken`
    pub fn invalidate(&self) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn sign(&self, issued_at: i64) -> Result<String, ApnsClientError> {
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());

        let claims = Claims {
            iss: self.team_id.clone(),
            iat: issued_at,
        };

        jsonwebtoken::encode(&header, &claims, &self.key).map_err(ApnsClientError::Signing)
    }
}

impl fmt::Debug for ProviderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderToken")
            .field("key_id", &self.key_id)
            .field("team_id", &self.team_id)
            .finish_non_exhaustive()
    }
}
