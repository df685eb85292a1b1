//! Time-limited retrieval URLs for stored objects.
//!
//! A presigned URL has the form
//! `<base>/objects/<key>?expires=<unix seconds>&signature=<hex>`, where the
//! signature is SHA3-256 over `secret|GET|key|expires`.

use std::time::Duration;

use birdtag_core::keys::OBJECTS_PATH;
use birdtag_core::{BirdtagError, UrlResolver};
use chrono::Utc;
use sha3::{Digest, Sha3_256};
use url::Url;

/// Presigning errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PresignError {
    #[error("Invalid public base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Presigned URL expired")]
    Expired,

    #[error("Presigned URL signature mismatch")]
    BadSignature,
}

/// Signs and verifies object retrieval URLs.
pub struct Presigner {
    base: Url,
    secret: Vec<u8>,
    default_expiry: Duration,
}

impl Presigner {
    pub fn new(
        base_url: &str,
        secret: impl Into<Vec<u8>>,
        default_expiry: Duration,
    ) -> Result<Self, PresignError> {
        let base =
            Url::parse(base_url).map_err(|e| PresignError::InvalidBaseUrl(e.to_string()))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(PresignError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self {
            base,
            secret: secret.into(),
            default_expiry,
        })
    }

    pub fn default_expiry(&self) -> Duration {
        self.default_expiry
    }

    /// Unsigned URL of an object. This is what the catalog stores.
    pub fn object_url(&self, key: &str) -> String {
        self.url_for(key).into()
    }

    /// Presigned GET URL valid for `expiry` from now.
    pub fn presign_get(&self, key: &str, expiry: Duration) -> String {
        let expiry = i64::try_from(expiry.as_secs()).unwrap_or(i64::MAX);
        let expires = Utc::now().timestamp().saturating_add(expiry);
        self.presign_get_until(key, expires)
    }

    /// Presigned GET URL valid until the unix timestamp `expires`.
    pub fn presign_get_until(&self, key: &str, expires: i64) -> String {
        let mut url = self.url_for(key);
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &self.signature(key, expires));
        url.into()
    }

    /// Check a presented signature at time `now` (unix seconds).
    pub fn verify(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        now: i64,
    ) -> Result<(), PresignError> {
        if !constant_time_eq(self.signature(key, expires).as_bytes(), signature.as_bytes()) {
            return Err(PresignError::BadSignature);
        }
        if now > expires {
            return Err(PresignError::Expired);
        }
        Ok(())
    }

    fn signature(&self, key: &str, expires: i64) -> String {
        let mut hasher = Sha3_256::new();
        hasher.update(&self.secret);
        hasher.update(b"|GET|");
        hasher.update(key.as_bytes());
        hasher.update(b"|");
        hasher.update(expires.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    fn url_for(&self, key: &str) -> Url {
        let mut url = self.base.clone();
        // Checked in `new`: the base URL can carry a path.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(OBJECTS_PATH)
                .extend(key.split('/'));
        }
        url
    }
}

impl UrlResolver for Presigner {
    fn resolve(&self, key: &str) -> birdtag_core::Result<String> {
        if key.is_empty() {
            return Err(BirdtagError::validation("cannot presign an empty key"));
        }
        Ok(self.presign_get(key, self.default_expiry))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
