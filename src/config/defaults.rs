//! Default values for configuration options.
//!
//! Centralized constants to avoid magic numbers scattered across the codebase.

use std::time::Duration;

/// Default per-attempt request timeout in milliseconds.
pub const TIMEOUT_MS: u64 = 30_000;

/// Default number of retries after the first attempt.
pub const RETRY_MAX: u32 = 3;

/// Default backoff base delay in milliseconds.
pub const RETRY_BASE_DELAY_MS: u64 = 1_000;

/// Default signature tolerance in seconds.
pub const TOLERANCE_SECS: u64 = crate::webhook::DEFAULT_TOLERANCE_SECS;

/// Default `User-Agent` for webhook deliveries.
pub const USER_AGENT: &str = crate::webhook::DEFAULT_USER_AGENT;

/// Default output path for `init`.
pub const CONFIG_FILE: &str = "stellartools.toml";

/// Default request timeout as Duration.
#[must_use]
pub const fn timeout() -> Duration {
    Duration::from_millis(TIMEOUT_MS)
}

/// Default retry base delay as Duration.
#[must_use]
pub const fn retry_base_delay() -> Duration {
    Duration::from_millis(RETRY_BASE_DELAY_MS)
}
