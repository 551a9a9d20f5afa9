//! `HttpClient` backed by reqwest.

use std::time::Duration;

use super::{HttpClient, HttpError, HttpRequest, HttpResponse};

/// The transport [`ApiClient`](super::ApiClient) uses outside of tests.
///
/// Clones share one connection pool. Per-attempt deadlines belong to the
/// API client, so the default reqwest client carries no timeout of its own.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use stellartools_core::client::{ApiClient, ApiClientConfig, ReqwestClient};
///
/// # fn example() -> Result<(), stellartools_core::client::HttpError> {
/// let transport = ReqwestClient::with_connect_timeout(Duration::from_secs(5))?;
/// let client = ApiClient::with_transport(
///     ApiClientConfig::new("https://api.stellartools.dev/v1"),
///     transport,
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    /// Pooled client with reqwest defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::new(),
        }
    }

    /// Bounds only connection setup; a slow body is still governed by the
    /// API client's timeout.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Connection`] if the TLS backend cannot be
    /// initialised.
    pub fn with_connect_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let inner = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| HttpError::Connection(Box::new(e)))?;
        Ok(Self { inner })
    }

    /// Wraps a preconfigured client (proxy, custom roots).
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { inner: client }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestClient {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = req;

        let builder = self.inner.request(method, url.as_str()).headers(headers);
        let builder = match body {
            Some(body) => builder.body(body),
            None => builder,
        };

        let response = builder.send().await.map_err(send_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().clone();
        // A body cut off mid-stream is a transport failure, not a short body
        let body = response
            .bytes()
            .await
            .map_err(|e| HttpError::Connection(Box::new(e)))?;

        Ok(HttpResponse::new(status, headers, body.to_vec()).with_url(final_url))
    }
}

/// Request-building failures mean the URL was unusable; everything else
/// happened on the wire.
fn send_error(error: reqwest::Error) -> HttpError {
    if error.is_builder() {
        HttpError::InvalidUrl(error.to_string())
    } else {
        HttpError::Connection(Box::new(error))
    }
}
