//! The resilient API client.

use std::time::Duration;

use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::id::random_lowercase_token;
use crate::time::{Clock, Sleeper, SystemClock, TokioSleeper};

use super::abort::{ABORTED_BY_USER, AbortController, AbortRegistry};
use super::retry::{PatternClassifier, RetryClassifier, with_retry};
use super::{
    ApiClientConfig, ApiError, HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestClient,
};

/// Parsed body of an [`ApiResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseData<T> {
    /// The body parsed as JSON into `T`.
    Json(T),
    /// The body was not valid JSON for `T`; holds the raw text.
    Text(String),
    /// The body was empty.
    Empty,
}

impl<T> ResponseData<T> {
    /// Returns the parsed value, if the body was JSON.
    #[must_use]
    pub const fn json(&self) -> Option<&T> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Consumes the data, returning the parsed value if any.
    #[must_use]
    pub fn into_json(self) -> Option<T> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the raw text when parsing fell back to text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns true for an empty body.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl<T: DeserializeOwned> ResponseData<T> {
    /// Parses a response body: JSON first, raw text on failure, `Empty` for
    /// an empty body.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self::Empty;
        }
        serde_json::from_str(text).map_or_else(|_| Self::Text(text.to_string()), Self::Json)
    }
}

impl ResponseData<serde_json::Value> {
    /// Converts to a JSON value; an empty body becomes `{}`.
    #[must_use]
    pub fn into_value(self) -> serde_json::Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) => serde_json::Value::String(text),
            Self::Empty => serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

/// Outcome of one HTTP exchange.
///
/// Every field except `data` is populated regardless of how the body parsed.
#[derive(Debug, Clone)]
pub struct ApiResponse<T = serde_json::Value> {
    /// True iff `status` is in 200-299.
    pub ok: bool,
    /// HTTP status code.
    pub status: StatusCode,
    /// Canonical reason phrase for `status`, or empty if unknown.
    pub status_text: String,
    /// Response headers.
    pub headers: HeaderMap,
    /// Parsed body.
    pub data: ResponseData<T>,
    /// Raw body text.
    pub text: String,
    /// Final URL after redirects.
    pub url: url::Url,
}

impl<T: DeserializeOwned> ApiResponse<T> {
    /// Builds a response from a raw exchange.
    ///
    /// `request_url` is used when the transport does not report a final URL.
    #[must_use]
    pub fn from_http(response: HttpResponse, request_url: &url::Url) -> Self {
        let text = response.body_text();
        Self {
            ok: response.is_success(),
            status: response.status,
            status_text: response
                .status
                .canonical_reason()
                .unwrap_or_default()
                .to_string(),
            data: ResponseData::parse(&text),
            text,
            headers: response.headers,
            url: response.url.unwrap_or_else(|| request_url.clone()),
        }
    }
}

impl<T> ApiResponse<T> {
    /// Returns the parsed JSON value, if any.
    #[must_use]
    pub const fn json(&self) -> Option<&T> {
        self.data.json()
    }
}

/// Per-call options.
///
/// # Example
///
/// ```
/// use stellartools_core::client::RequestOptions;
///
/// # fn main() -> Result<(), stellartools_core::client::ApiError> {
/// let options = RequestOptions::new()
///     .with_query("expand", "customer")
///     .try_header("Idempotency-Key", "checkout-42")?
///     .with_json(&serde_json::json!({ "amount": 100 }))?
///     .with_request_id("create-checkout");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Headers that override client-level headers.
    pub headers: HeaderMap,
    /// Query parameters appended to the URL, in order.
    pub query: Vec<(String, String)>,
    /// Raw request body.
    pub body: Option<Vec<u8>>,
    /// Id used to abort this call; generated when absent.
    pub request_id: Option<String>,
}

impl RequestOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a header from strings.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidHeader`] if the name or value is not valid
    /// HTTP header syntax.
    pub fn try_header(self, name: &str, value: &str) -> Result<Self, ApiError> {
        let invalid = |reason: String| ApiError::InvalidHeader {
            name: name.to_string(),
            reason,
        };
        let header_name = name
            .parse::<HeaderName>()
            .map_err(|e| invalid(e.to_string()))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
        Ok(self.with_header(header_name, header_value))
    }

    /// Appends a query parameter. Repeated names are all sent.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Sets the raw body. The bytes are sent unchanged.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Serialize`] if serialization fails.
    pub fn with_json<B: Serialize + ?Sized>(self, value: &B) -> Result<Self, ApiError> {
        let body = serde_json::to_vec(value)?;
        Ok(self.with_body(body))
    }

    /// Sets the request id used for cancellation.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// HTTP client with retries, timeouts, and per-request cancellation.
///
/// Every call resolves to `Result<ApiResponse<T>, ApiError>`. Transport
/// failures, timeouts, aborts, and non-2xx responses all surface as `Err`.
///
/// # Type Parameters
///
/// - `H`: transport (defaults to [`ReqwestClient`])
/// - `S`: sleeper for backoff delays (defaults to [`TokioSleeper`])
/// - `R`: retry classifier (defaults to [`PatternClassifier`])
///
/// # Example
///
/// ```no_run
/// use stellartools_core::client::{ApiClient, ApiClientConfig, RequestOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ApiClient::new(ApiClientConfig::new("https://api.stellartools.dev/v1"));
/// let response = client
///     .get::<serde_json::Value>("/customers", RequestOptions::new())
///     .await?;
/// println!("{} {}", response.status, response.text);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ApiClient<H = ReqwestClient, S = TokioSleeper, R = PatternClassifier> {
    config: ApiClientConfig,
    transport: H,
    sleeper: S,
    classifier: R,
    registry: AbortRegistry,
}

impl ApiClient<ReqwestClient> {
    /// Creates a client using the reqwest transport.
    #[must_use]
    pub fn new(config: ApiClientConfig) -> Self {
        Self::with_transport(config, ReqwestClient::new())
    }
}

impl<H> ApiClient<H> {
    /// Creates a client using a custom transport.
    #[must_use]
    pub fn with_transport(config: ApiClientConfig, transport: H) -> Self {
        Self {
            config,
            transport,
            sleeper: TokioSleeper,
            classifier: PatternClassifier::default(),
            registry: AbortRegistry::new(),
        }
    }
}

impl<H, S, R> ApiClient<H, S, R> {
    /// Replaces the sleeper used for backoff delays.
    #[must_use]
    pub fn with_sleeper<S2>(self, sleeper: S2) -> ApiClient<H, S2, R> {
        ApiClient {
            config: self.config,
            transport: self.transport,
            sleeper,
            classifier: self.classifier,
            registry: self.registry,
        }
    }

    /// Replaces the retry classifier.
    #[must_use]
    pub fn with_classifier<R2>(self, classifier: R2) -> ApiClient<H, S, R2> {
        ApiClient {
            config: self.config,
            transport: self.transport,
            sleeper: self.sleeper,
            classifier,
            registry: self.registry,
        }
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ApiClientConfig {
        &self.config
    }

    /// Aborts the in-flight request registered under `request_id`.
    ///
    /// Returns false if no such request is in flight.
    pub fn abort(&self, request_id: &str) -> bool {
        let found = self.registry.abort(request_id);
        if found {
            tracing::debug!(request_id, "Request aborted");
        }
        found
    }

    /// Aborts every in-flight request. Returns how many were aborted.
    pub fn abort_all(&self) -> usize {
        let count = self.registry.abort_all();
        tracing::debug!(count, "All requests aborted");
        count
    }

    /// Returns true if a request with this id is in flight.
    #[must_use]
    pub fn is_in_flight(&self, request_id: &str) -> bool {
        self.registry.contains(request_id)
    }

    /// Number of in-flight requests.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.registry.len()
    }
}

impl<H, S, R> ApiClient<H, S, R>
where
    H: HttpClient,
    S: Sleeper,
    R: RetryClassifier<ApiError>,
{
    /// Sends a GET request.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, ApiError> {
        self.request(Method::GET, endpoint, options).await
    }

    /// Sends a POST request.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, ApiError> {
        self.request(Method::POST, endpoint, options).await
    }

    /// Sends a PUT request.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn put<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, ApiError> {
        self.request(Method::PUT, endpoint, options).await
    }

    /// Sends a PATCH request.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn patch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, ApiError> {
        self.request(Method::PATCH, endpoint, options).await
    }

    /// Sends a DELETE request.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, ApiError> {
        self.request(Method::DELETE, endpoint, options).await
    }

    /// Sends a request with retries, timeout, and abort tracking.
    ///
    /// The request is registered under `options.request_id` (or a generated
    /// `<method>_<millis>_<random>` id) until the call returns or its future
    /// is dropped. An abort or a timed-out attempt ends the call at once;
    /// other failures go to the retry classifier.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Http`] for connection failures, timeouts, aborts, and
    ///   unusable URLs
    /// - [`ApiError::Status`] for non-2xx responses
    /// - [`ApiError::InvalidHeader`] is never produced here; it comes from
    ///   building [`RequestOptions`]
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, ApiError> {
        let request_id = options
            .request_id
            .clone()
            .unwrap_or_else(|| generate_request_id(&method));
        let request = self.build_request(method, endpoint, options)?;

        let registration = self.registry.register(request_id);
        let controller = registration.controller();
        let sleeper = AbortableSleeper {
            inner: &self.sleeper,
            controller,
        };

        tracing::debug!(
            request_id = registration.request_id(),
            method = %request.method,
            url = %request.url,
            "Sending request"
        );

        // Cancellation ends the call whatever the classifier says
        let classifier = |error: &ApiError, attempt: u32| {
            !error.is_cancelled() && self.classifier.should_retry(error, attempt)
        };

        let request = &request;
        let result = with_retry(&self.config.retry, &classifier, &sleeper, move |attempt| {
            self.attempt::<T>(request, controller, attempt)
        })
        .await;

        if let Err(e) = &result {
            tracing::debug!(request_id = registration.request_id(), error = %e, "Request failed");
        }
        result
    }

    fn build_request(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<HttpRequest, ApiError> {
        let resolved = self.config.resolve(endpoint);
        let mut url = url::Url::parse(&resolved)
            .map_err(|e| HttpError::InvalidUrl(format!("{resolved}: {e}")))?;
        if !options.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &options.query {
                pairs.append_pair(name, value);
            }
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        merge_headers(&mut headers, &self.config.headers);
        merge_headers(&mut headers, &options.headers);

        Ok(HttpRequest {
            method,
            url,
            headers,
            body: options.body,
        })
    }

    /// One exchange raced against the abort controller and the timeout.
    async fn attempt<T: DeserializeOwned>(
        &self,
        request: &HttpRequest,
        controller: &AbortController,
        attempt: u32,
    ) -> Result<ApiResponse<T>, ApiError> {
        let timeout = self.config.timeout;

        let response = tokio::select! {
            biased;
            () = controller.aborted() => return Err(aborted_error(controller).into()),
            () = tokio::time::sleep(timeout) => {
                let error = HttpError::Timeout { after: timeout };
                controller.abort(error.to_string());
                return Err(error.into());
            }
            result = self.transport.request(request.clone()) => result?,
        };

        tracing::debug!(attempt, status = %response.status, url = %request.url, "Received response");

        if !response.is_success() {
            return Err(ApiError::Status {
                response: Box::new(ApiResponse::from_http(response, &request.url)),
            });
        }

        Ok(ApiResponse::from_http(response, &request.url))
    }
}

/// Sleeper that wakes early when the call is aborted.
struct AbortableSleeper<'a, S> {
    inner: &'a S,
    controller: &'a AbortController,
}

impl<S: Sleeper> Sleeper for AbortableSleeper<'_, S> {
    async fn sleep(&self, duration: Duration) {
        tokio::select! {
            () = self.controller.aborted() => {}
            () = self.inner.sleep(duration) => {}
        }
    }
}

fn aborted_error(controller: &AbortController) -> HttpError {
    HttpError::Aborted {
        reason: controller.reason().unwrap_or(ABORTED_BY_USER).to_string(),
    }
}

/// Generates `<method>_<unix-millis>_<random>`.
fn generate_request_id(method: &Method) -> String {
    format!(
        "{}_{}_{}",
        method.as_str().to_ascii_lowercase(),
        SystemClock.unix_millis(),
        random_lowercase_token(9)
    )
}

/// Replaces every header present in `overrides`, keeping all its values.
fn merge_headers(target: &mut HeaderMap, overrides: &HeaderMap) {
    for name in overrides.keys() {
        target.remove(name);
        for value in overrides.get_all(name) {
            target.append(name.clone(), value.clone());
        }
    }
}
