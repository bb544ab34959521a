//! Slack request signature verification.
//!
//! Slack signs every request with
//! `v0=hex(HMAC-SHA256(signing_secret, "v0:{timestamp}:{body}"))`, sent in
//! `X-Slack-Signature` next to `X-Slack-Request-Timestamp`. Requests whose
//! timestamp falls outside the allowed window are rejected to limit replay.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the request timestamp.
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

const VERSION: &str = "v0";

/// Reasons a request fails verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// A required header is absent.
    MissingHeader(&'static str),
    /// The timestamp header is not an integer.
    InvalidTimestamp,
    /// The timestamp is outside the accepted window.
    Stale { age_secs: i64 },
    /// The signature header is not `v0=<hex>`.
    Malformed,
    /// The signature does not match the body.
    Mismatch,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHeader(name) => write!(f, "missing header {name}"),
            Self::InvalidTimestamp => write!(f, "request timestamp is not an integer"),
            Self::Stale { age_secs } => write!(f, "request timestamp is {age_secs}s old"),
            Self::Malformed => write!(f, "signature is not in v0=<hex> form"),
            Self::Mismatch => write!(f, "signature does not match"),
        }
    }
}

impl std::error::Error for SignatureError {}

/// Verifies Slack request signatures.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
    max_age_secs: i64,
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"[redacted]")
            .field("max_age_secs", &self.max_age_secs)
            .finish()
    }
}

impl SignatureVerifier {
    /// Creates a verifier for `signing_secret`.
    #[must_use]
    pub fn new(signing_secret: impl AsRef<[u8]>, max_age_secs: u64) -> Self {
        Self {
            secret: signing_secret.as_ref().to_vec(),
            max_age_secs: i64::try_from(max_age_secs).unwrap_or(i64::MAX),
        }
    }

    /// Verifies a request against the current time.
    ///
    /// # Errors
    ///
    /// Returns the first check that fails.
    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<(), SignatureError> {
        self.verify_at(timestamp, signature, body, chrono::Utc::now().timestamp())
    }

    /// Verifies a request as if the current Unix time were `now`.
    ///
    /// # Errors
    ///
    /// Returns the first check that fails.
    pub fn verify_at(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now: i64,
    ) -> Result<(), SignatureError> {
        let timestamp = timestamp.ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?;
        let signature = signature.ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?;

        let issued: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;
        let age_secs = now.saturating_sub(issued);
        if age_secs.abs() > self.max_age_secs {
            return Err(SignatureError::Stale { age_secs });
        }

        let expected = signature
            .strip_prefix("v0=")
            .ok_or(SignatureError::Malformed)
            .and_then(|digest| hex::decode(digest).map_err(|_| SignatureError::Malformed))?;

        self.mac(timestamp.trim(), body)
            .verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }

    /// Computes the `v0=` signature for a request.
    #[must_use]
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> String {
        let digest = self.mac(timestamp, body).finalize().into_bytes();
        format!("{VERSION}={}", hex::encode(digest))
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
        mac.update(VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        mac
    }
}
