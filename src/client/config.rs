//! Immutable configuration for an API client.

use std::time::Duration;

use http::HeaderMap;

use super::RetryOptions;

/// Configuration shared by every call of one [`ApiClient`](super::ApiClient).
///
/// # Example
///
/// ```
/// use stellartools_core::client::{ApiClientConfig, RetryOptions};
/// use std::time::Duration;
///
/// let config = ApiClientConfig::new("https://api.stellartools.dev/v1")
///     .with_retry(RetryOptions::new().with_max(2))
///     .with_timeout(Duration::from_secs(10));
///
/// assert_eq!(config.timeout, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL; endpoints are appended as `base_url + "/" + endpoint`.
    pub base_url: String,

    /// Headers merged into every request.
    pub headers: HeaderMap,

    /// Retry behaviour.
    pub retry: RetryOptions,

    /// Timeout applied to each attempt.
    pub timeout: Duration,
}

impl ApiClientConfig {
    /// Default per-attempt timeout (30 seconds).
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

    /// Creates a configuration with no extra headers, default retry options,
    /// and the default timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: HeaderMap::new(),
            retry: RetryOptions::default(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the client-level headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the retry options.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolves an endpoint against the base URL.
    ///
    /// A single leading slash on `endpoint` is stripped; nothing else is
    /// normalized.
    #[must_use]
    pub fn resolve(&self, endpoint: &str) -> String {
        let endpoint = endpoint.strip_prefix('/').unwrap_or(endpoint);
        format!("{}/{endpoint}", self.base_url)
    }
}
