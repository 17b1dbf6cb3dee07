//! HMAC request signatures.
//!
//! A signature authorizes one path until an expiry time. Format:
//! `base64url(HMAC-SHA256(secret, "<path>:<expire>")) + ":" + <expire>`,
//! where `<expire>` is a Unix timestamp in seconds and `0` never expires.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use ring::hmac;
use thiserror::Error;

/// Reasons a signature is rejected. The display text is returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// No expiry segment (also covers an absent signature).
    #[error("expire missing")]
    ExpireMissing,

    /// Expiry segment is not an integer.
    #[error("expire invalid")]
    ExpireInvalid,

    /// Expiry time has passed.
    #[error("sign expired")]
    Expired,

    /// MAC does not match the path.
    #[error("sign invalid")]
    Invalid,
}

/// Verifies path signatures against the process-wide secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    key: hmac::Key,
}

impl SignatureVerifier {
    /// Create a verifier keyed by `secret`.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        }
    }

    /// Produce the signature for `path` expiring at `expire` (0 = never).
    pub fn sign(&self, path: &str, expire: i64) -> String {
        let tag = hmac::sign(&self.key, message(path, expire).as_bytes());
        format!("{}:{}", URL_SAFE.encode(tag.as_ref()), expire)
    }

    /// Check `sign` against `path` at the current time.
    pub fn verify(&self, path: &str, sign: &str) -> Result<(), SignatureError> {
        self.verify_at(path, sign, unix_now())
    }

    /// Check `sign` against `path` as of `now` (Unix seconds).
    pub fn verify_at(&self, path: &str, sign: &str, now: i64) -> Result<(), SignatureError> {
        let (mac, expire) = match sign.rsplit_once(':') {
            Some((mac, expire)) => (mac, expire),
            None => ("", sign),
        };
        if expire.is_empty() {
            return Err(SignatureError::ExpireMissing);
        }
        let raw_expire = expire;
        let expire: i64 = expire.parse().map_err(|_| SignatureError::ExpireInvalid)?;
        if expire != 0 && expire < now {
            return Err(SignatureError::Expired);
        }
        // Only the canonical decimal form was ever signed.
        if expire.to_string() != raw_expire {
            return Err(SignatureError::Invalid);
        }

        let tag = URL_SAFE.decode(mac).map_err(|_| SignatureError::Invalid)?;
        hmac::verify(&self.key, message(path, expire).as_bytes(), &tag)
            .map_err(|_| SignatureError::Invalid)
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

fn message(path: &str, expire: i64) -> String {
    format!("{}:{}", path, expire)
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
