//! Signed webhook delivery to merchant endpoints.

use std::fmt;
use std::time::{Duration, Instant};

use http::header::{CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize, Serializer};
use url::{Position, Url};

use crate::client::{
    ApiClient, ApiClientConfig, ApiError, ApiResponse, HttpClient, HttpError, RequestOptions,
    ReqwestClient, RetryOptions,
};
use crate::id::random_token;
use crate::time::{Clock, Sleeper, SystemClock, TokioSleeper};

use super::WebhookSigner;

/// Header carrying the `t=<secs>,v1=<hex>` signature.
pub const SIGNATURE_HEADER: &str = "x-stellar-signature";

/// Header carrying the event type.
pub const EVENT_HEADER: &str = "x-stellar-event";

/// Default `User-Agent` for deliveries.
pub const DEFAULT_USER_AGENT: &str = "StellarTools-Webhooks/1.0";

/// Default per-attempt timeout for deliveries.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Length of the random part of event and request ids.
const ID_TOKEN_LEN: usize = 52;

/// Where and how to deliver events.
#[derive(Clone)]
pub struct WebhookDestination {
    /// Absolute endpoint URL; the POST goes to exactly this URL.
    pub url: String,
    /// Signing secret shared with the receiver.
    pub secret: String,
}

impl WebhookDestination {
    /// Creates a destination.
    #[must_use]
    pub fn new(url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for WebhookDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookDestination")
            .field("url", &self.url)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// The envelope POSTed to a destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// `wh+evt_<random>`.
    pub id: String,
    /// Always `"event"`.
    pub object: String,
    /// Event type, e.g. `payment.succeeded`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Creation time in Unix seconds.
    pub created: i64,
    /// Event payload.
    pub data: serde_json::Value,
}

impl WebhookEvent {
    /// Creates an envelope with a fresh id.
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: serde_json::Value, created: i64) -> Self {
        Self {
            id: format!("wh+evt_{}", random_token(ID_TOKEN_LEN)),
            object: "event".to_string(),
            event_type: event_type.into(),
            created,
            data,
        }
    }
}

/// Outcome of one delivery, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    /// Id of the delivered envelope.
    pub event_id: String,
    /// Request id used for the POST.
    pub request_id: String,
    /// The envelope as sent.
    pub event: WebhookEvent,
    /// Status of the last response, if one was received.
    pub status_code: Option<u16>,
    /// True iff the destination answered 2xx.
    pub success: bool,
    /// Failure description when `success` is false.
    pub error_message: Option<String>,
    /// Parsed response body, if a response was received.
    pub response: Option<serde_json::Value>,
    /// Wall time including retries.
    #[serde(rename = "response_time_ms", serialize_with = "serialize_millis")]
    pub response_time: Duration,
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(duration.as_millis())
}

/// Delivers signed events over HTTP.
///
/// Each delivery uses a fresh [`ApiClient`] whose headers carry the
/// signature, so concurrent deliveries never share header state.
///
/// # Defaults
///
/// - retry: 3 retries, 1 second base delay
/// - timeout: 15 seconds per attempt
/// - `User-Agent`: `StellarTools-Webhooks/1.0`
///
/// # Example
///
/// ```no_run
/// use stellartools_core::webhook::{WebhookDelivery, WebhookDestination};
///
/// # async fn example() {
/// let delivery = WebhookDelivery::new();
/// let destination = WebhookDestination::new("https://merchant.example/hooks", "whsec_abc");
/// let report = delivery
///     .deliver(&destination, "payment.succeeded", serde_json::json!({ "amount": 100 }))
///     .await;
/// println!("delivered: {}", report.success);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WebhookDelivery<H = ReqwestClient, S = TokioSleeper, C = SystemClock> {
    transport: H,
    sleeper: S,
    signer: WebhookSigner<C>,
    retry: RetryOptions,
    timeout: Duration,
    user_agent: String,
}

impl WebhookDelivery {
    /// Creates a delivery service using the reqwest transport.
    #[must_use]
    pub fn new() -> Self {
        Self::with_transport(ReqwestClient::new())
    }
}

impl Default for WebhookDelivery {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> WebhookDelivery<H> {
    /// Creates a delivery service using a custom transport.
    #[must_use]
    pub fn with_transport(transport: H) -> Self {
        Self {
            transport,
            sleeper: TokioSleeper,
            signer: WebhookSigner::new(),
            retry: RetryOptions::new(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl<H, S, C> WebhookDelivery<H, S, C> {
    /// Replaces the sleeper used between retries.
    #[must_use]
    pub fn with_sleeper<S2>(self, sleeper: S2) -> WebhookDelivery<H, S2, C> {
        WebhookDelivery {
            transport: self.transport,
            sleeper,
            signer: self.signer,
            retry: self.retry,
            timeout: self.timeout,
            user_agent: self.user_agent,
        }
    }

    /// Replaces the clock used for envelope and signature timestamps.
    #[must_use]
    pub fn with_clock<C2: Clock>(self, clock: C2) -> WebhookDelivery<H, S, C2> {
        WebhookDelivery {
            transport: self.transport,
            sleeper: self.sleeper,
            signer: WebhookSigner::with_clock(clock),
            retry: self.retry,
            timeout: self.timeout,
            user_agent: self.user_agent,
        }
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

    /// Sets the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl<H, S, C> WebhookDelivery<H, S, C>
where
    H: HttpClient + Clone,
    S: Sleeper + Clone,
    C: Clock,
{
    /// Wraps `data` in an event envelope, signs it, and POSTs it.
    ///
    /// Never fails: transport errors, timeouts, and non-2xx answers are
    /// recorded in the returned report.
    pub async fn deliver(
        &self,
        destination: &WebhookDestination,
        event_type: &str,
        data: serde_json::Value,
    ) -> DeliveryReport {
        let started = Instant::now();
        let event = WebhookEvent::new(event_type, data, self.signer.clock().unix_seconds());
        let request_id = format!("wh+req_{}", random_token(ID_TOKEN_LEN));

        let outcome = self.send(destination, &event, &request_id).await;
        let response_time = started.elapsed();

        let mut report = DeliveryReport {
            event_id: event.id.clone(),
            request_id,
            event,
            status_code: None,
            success: false,
            error_message: None,
            response: None,
            response_time,
        };

        match outcome {
            Ok(response) => {
                report.status_code = Some(response.status.as_u16());
                report.success = true;
                report.response = Some(response.data.into_value());
                tracing::info!(
                    url = %destination.url,
                    event = event_type,
                    status = report.status_code,
                    elapsed_ms = response_time.as_millis(),
                    "Webhook delivered"
                );
            }
            Err(e) => {
                // The destination's own words when it answered, else the failure
                report.error_message = match e.response() {
                    Some(response) if !response.text.is_empty() => Some(response.text.clone()),
                    _ => Some(e.to_string()),
                };
                if let Some(response) = e.response() {
                    report.status_code = Some(response.status.as_u16());
                    report.response = Some(response.data.clone().into_value());
                }
                tracing::error!(
                    url = %destination.url,
                    event = event_type,
                    error = %e,
                    elapsed_ms = response_time.as_millis(),
                    "Webhook delivery failed"
                );
            }
        }

        report
    }

    async fn send(
        &self,
        destination: &WebhookDestination,
        event: &WebhookEvent,
        request_id: &str,
    ) -> Result<ApiResponse, ApiError> {
        let (base_url, endpoint) = split_destination(&destination.url)?;
        let body = serde_json::to_vec(event)?;
        let signature = self.signer.generate_signature(&body, &destination.secret);
        let headers = self.headers(&signature, &event.event_type)?;

        let config = ApiClientConfig::new(base_url)
            .with_headers(headers)
            .with_retry(self.retry)
            .with_timeout(self.timeout);
        let client = ApiClient::with_transport(config, self.transport.clone())
            .with_sleeper(self.sleeper.clone());

        client
            .post(
                &endpoint,
                RequestOptions::new()
                    .with_body(body)
                    .with_request_id(request_id),
            )
            .await
    }

    fn headers(&self, signature: &str, event_type: &str) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, header_value(USER_AGENT.as_str(), &self.user_agent)?);
        headers.insert(
            HeaderName::from_static(SIGNATURE_HEADER),
            header_value(SIGNATURE_HEADER, signature)?,
        );
        headers.insert(
            HeaderName::from_static(EVENT_HEADER),
            header_value(EVENT_HEADER, event_type)?,
        );
        Ok(headers)
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value).map_err(|e| ApiError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Splits an absolute URL into origin and `path?query`, so that resolving
/// the second against the first yields the original URL.
fn split_destination(raw: &str) -> Result<(String, String), ApiError> {
    let url = Url::parse(raw).map_err(|e| HttpError::InvalidUrl(format!("{raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(HttpError::InvalidUrl(format!("{raw}: not a hierarchical URL")).into());
    }
    let base = url[..Position::BeforePath].to_string();
    let endpoint = url[Position::BeforePath..Position::AfterQuery].to_string();
    Ok((base, endpoint))
}
