//! HMAC-SHA256 webhook signatures.
//!
//! A signature header has the form `t=<unix-seconds>,v1=<hex digest>`, where
//! the digest is HMAC-SHA256 over `<timestamp>.<payload>` keyed by the
//! destination secret.

use std::num::ParseIntError;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::time::{Clock, SystemClock};

type HmacSha256 = Hmac<Sha256>;

/// Default replay window for [`WebhookSigner::verify_signature`].
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

/// Length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Reason a signature was rejected.
///
/// Never surfaced by the public API; verification reports a plain `bool`.
#[derive(Debug, Error)]
enum SignatureError {
    #[error("signature has no timestamp segment")]
    MissingTimestamp,

    #[error("signature has no digest segment")]
    MissingDigest,

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(#[source] ParseIntError),

    #[error("timestamp is {age}s away from now, tolerance is {tolerance}s")]
    OutsideTolerance { age: u64, tolerance: u64 },

    #[error("digest is not 64 lowercase hex characters")]
    MalformedDigest,

    #[error("digest does not match")]
    Mismatch,
}

/// Signs and verifies webhook payloads.
///
/// # Example
///
/// ```
/// use stellartools_core::time::FixedClock;
/// use stellartools_core::webhook::WebhookSigner;
///
/// let signer = WebhookSigner::with_clock(FixedClock::at_unix_seconds(1_700_000_000));
/// let signature = signer.generate_signature(br#"{"id":"evt_1"}"#, "whsec_test");
///
/// assert!(signature.starts_with("t=1700000000,v1="));
/// assert!(signer.verify_signature(br#"{"id":"evt_1"}"#, &signature, "whsec_test"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct WebhookSigner<C = SystemClock> {
    clock: C,
}

impl WebhookSigner {
    /// Creates a signer reading the system clock.
    #[must_use]
    pub const fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl<C: Clock> WebhookSigner<C> {
    /// Creates a signer reading `clock`.
    #[must_use]
    pub const fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// The clock used for timestamps.
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Signs `payload` at the current time.
    ///
    /// Returns `t=<unix-seconds>,v1=<64 lowercase hex>`.
    #[must_use]
    pub fn generate_signature(&self, payload: &[u8], secret: &str) -> String {
        let timestamp = self.clock.unix_seconds();
        let digest = hex::encode(sign(timestamp, payload, secret).finalize().into_bytes());
        format!("t={timestamp},v1={digest}")
    }

    /// Verifies `signature` with the default 300 second tolerance.
    #[must_use]
    pub fn verify_signature(&self, payload: &[u8], signature: &str, secret: &str) -> bool {
        self.verify_signature_with_tolerance(payload, signature, secret, DEFAULT_TOLERANCE_SECS)
    }

    /// Verifies `signature`, accepting timestamps at most `tolerance_secs`
    /// away from now in either direction.
    ///
    /// Malformed input yields `false`.
    #[must_use]
    pub fn verify_signature_with_tolerance(
        &self,
        payload: &[u8],
        signature: &str,
        secret: &str,
        tolerance_secs: u64,
    ) -> bool {
        match self.check(payload, signature, secret, tolerance_secs) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(reason = %e, "Webhook signature rejected");
                false
            }
        }
    }

    fn check(
        &self,
        payload: &[u8],
        signature: &str,
        secret: &str,
        tolerance: u64,
    ) -> Result<(), SignatureError> {
        let mut segments = signature.split(',');
        let timestamp = segments
            .next()
            .and_then(segment_value)
            .ok_or(SignatureError::MissingTimestamp)?;
        let digest = segments
            .next()
            .and_then(segment_value)
            .ok_or(SignatureError::MissingDigest)?;

        let timestamp: i64 = timestamp
            .parse()
            .map_err(SignatureError::InvalidTimestamp)?;

        let age = self.clock.unix_seconds().abs_diff(timestamp);
        if age > tolerance {
            return Err(SignatureError::OutsideTolerance { age, tolerance });
        }

        if !is_lowercase_hex_digest(digest) {
            return Err(SignatureError::MalformedDigest);
        }
        let expected = hex::decode(digest).map_err(|_| SignatureError::MalformedDigest)?;

        sign(timestamp, payload, secret)
            .verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }
}

/// Generated digests are lowercase; any other spelling never matches.
fn is_lowercase_hex_digest(digest: &str) -> bool {
    digest.len() == DIGEST_HEX_LEN
        && digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Value after the first `=` of a `key=value` segment.
fn segment_value(segment: &str) -> Option<&str> {
    segment.split_once('=').map(|(_, value)| value)
}

fn sign(timestamp: i64, payload: &[u8], secret: &str) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// Signs `payload` with the system clock.
#[must_use]
pub fn generate_signature(payload: &[u8], secret: &str) -> String {
    WebhookSigner::new().generate_signature(payload, secret)
}

/// Verifies `signature` against the system clock with the default tolerance.
#[must_use]
pub fn verify_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    WebhookSigner::new().verify_signature(payload, signature, secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_value_takes_text_after_first_equals() {
        assert_eq!(segment_value("t=123"), Some("123"));
        assert_eq!(segment_value("v1=a=b"), Some("a=b"));
        assert_eq!(segment_value("=x"), Some("x"));
        assert_eq!(segment_value("novalue"), None);
    }

    #[test]
    fn errors_describe_the_rejection() {
        let err = SignatureError::OutsideTolerance {
            age: 301,
            tolerance: 300,
        };
        assert_eq!(
            err.to_string(),
            "timestamp is 301s away from now, tolerance is 300s"
        );
        assert_eq!(
            SignatureError::MalformedDigest.to_string(),
            "digest is not 64 hex characters"
        );
    }
}
