//! Error types for API client operations.

use std::time::Duration;

use thiserror::Error;

use super::ApiResponse;

/// Transport-level failure.
///
/// Raised when no HTTP response could be obtained: the connection failed,
/// the attempt timed out, or the request was cancelled.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network connection failed.
    ///
    /// This includes DNS resolution failures, connection refused, TLS
    /// failures, and errors while reading the response body.
    #[error("Connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The attempt did not complete within the configured timeout.
    #[error("Request timed out after {}ms", .after.as_millis())]
    Timeout {
        /// The timeout that elapsed.
        after: Duration,
    },

    /// The request was cancelled through its abort controller.
    ///
    /// The reason always contains the word "aborted".
    #[error("{reason}")]
    Aborted {
        /// Reason passed to the abort controller.
        reason: String,
    },

    /// The resolved request URL is invalid.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl HttpError {
    /// Returns true if the request was cancelled rather than failed.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }

    /// Returns true for an abort or a timeout; neither is ever retried.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Aborted { .. } | Self::Timeout { .. })
    }
}

/// Error returned by every [`ApiClient`](super::ApiClient) call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was received.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// A response was received but its status was outside 200-299.
    ///
    /// The message is `"<status>: <body text>"`; the parsed response is kept
    /// for inspection.
    #[error("{}: {}", .response.status.as_u16(), .response.text)]
    Status {
        /// The full parsed response.
        response: Box<ApiResponse<serde_json::Value>>,
    },

    /// A per-call header name or value could not be used.
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader {
        /// The offending header name.
        name: String,
        /// Reason for invalidity.
        reason: String,
    },

    /// The request body could not be serialized to JSON.
    #[error("Failed to serialize request body: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ApiError {
    /// Returns the HTTP status of a non-success response, if any.
    #[must_use]
    pub fn status(&self) -> Option<http::StatusCode> {
        match self {
            Self::Status { response } => Some(response.status),
            _ => None,
        }
    }

    /// Returns the response carried by a non-success status error.
    #[must_use]
    pub fn response(&self) -> Option<&ApiResponse<serde_json::Value>> {
        match self {
            Self::Status { response } => Some(response),
            _ => None,
        }
    }

    /// Returns true if the call was cancelled through `abort` or `abort_all`.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_aborted())
    }

    /// Returns true if the call was aborted or its attempt timed out.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_cancelled())
    }
}
