//! The exchange types passed across the transport boundary.

use std::sync::Arc;

use super::HttpError;

/// One fully resolved request, ready for an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Verb
    pub method: http::Method,
    /// Fully resolved target URL
    pub url: url::Url,
    /// Merged default, client and per-call headers
    pub headers: http::HeaderMap,
    /// Raw body bytes, sent as-is
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Request with no headers and no body.
    #[must_use]
    pub fn new(method: http::Method, url: url::Url) -> Self {
        Self {
            method,
            url,
            headers: http::HeaderMap::new(),
            body: None,
        }
    }

    /// Shorthand for `GET`.
    #[must_use]
    pub fn get(url: url::Url) -> Self {
        Self::new(http::Method::GET, url)
    }

    /// Shorthand for `POST`.
    #[must_use]
    pub fn post(url: url::Url) -> Self {
        Self::new(http::Method::POST, url)
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets a header, replacing any existing values for the same name.
    #[must_use]
    pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A received response of any status, body buffered.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status line code
    pub status: http::StatusCode,
    /// Response headers
    pub headers: http::HeaderMap,
    /// Whole body
    pub body: Vec<u8>,
    /// Final URL after redirects, when the transport reports one
    pub url: Option<url::Url>,
}

impl HttpResponse {
    /// Response whose final URL is unknown.
    #[must_use]
    pub const fn new(status: http::StatusCode, headers: http::HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
            url: None,
        }
    }

    /// Records the final URL the response was served from.
    #[must_use]
    pub fn with_url(mut self, url: url::Url) -> Self {
        self.url = Some(url);
        self
    }

    /// `true` for 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport used by [`ApiClient`](super::ApiClient) to perform one exchange.
///
/// Implementations perform no retries and no timeout handling; both are
/// layered on top by the API client. Dropping the returned future must
/// cancel the in-flight exchange.
///
/// # Example
///
/// ```ignore
/// use stellartools_core::client::{HttpClient, HttpError, HttpRequest, HttpResponse};
///
/// struct MockClient {
///     response: HttpResponse,
/// }
///
/// impl HttpClient for MockClient {
///     async fn request(&self, _req: HttpRequest) -> Result<HttpResponse, HttpError> {
///         Ok(self.response.clone())
///     }
/// }
/// ```
pub trait HttpClient: Send + Sync {
    /// Sends an HTTP request and returns the response.
    ///
    /// Any received response is returned as `Ok`, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] when:
    /// - Network connection fails ([`HttpError::Connection`])
    /// - URL is rejected by the transport ([`HttpError::InvalidUrl`])
    fn request(
        &self,
        req: HttpRequest,
    ) -> impl std::future::Future<Output = Result<HttpResponse, HttpError>> + Send;
}

impl<T: HttpClient> HttpClient for Arc<T> {
    fn request(
        &self,
        req: HttpRequest,
    ) -> impl std::future::Future<Output = Result<HttpResponse, HttpError>> + Send {
        (**self).request(req)
    }
}
