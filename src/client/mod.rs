//! Resilient HTTP API client.
//!
//! This module provides:
//! - Request and response types for one exchange ([`HttpRequest`], [`HttpResponse`])
//! - The transport seam ([`HttpClient`]) and its reqwest implementation ([`ReqwestClient`])
//! - Retry configuration and classification ([`RetryOptions`], [`PatternClassifier`])
//! - Per-request cancellation ([`AbortController`], [`AbortRegistry`])
//! - The client itself ([`ApiClient`]) returning [`ApiResponse`] or [`ApiError`]

mod abort;
mod api;
mod config;
mod error;
mod http;
mod retry;
mod transport;

#[cfg(test)]
mod retry_tests;

pub use abort::{
    ABORTED_BY_USER, ALL_REQUESTS_ABORTED, AbortController, AbortRegistry, Registration,
};
pub use api::{ApiClient, ApiResponse, RequestOptions, ResponseData};
pub use config::ApiClientConfig;
pub use error::{ApiError, HttpError};
pub use http::{HttpClient, HttpRequest, HttpResponse};
pub use retry::{PatternClassifier, RetryClassifier, RetryOptions, backoff_delay, with_retry};
pub use transport::ReqwestClient;
