//! Errors raised while loading, merging and checking settings.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong before a command starts running.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The `--config` file could not be read.
    #[error("Failed to read config file '{}': {source}", path.display())]
    FileRead {
        /// File that was requested
        path: PathBuf,
        /// I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid for [`TomlConfig`](super::TomlConfig).
    #[error("Failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// `stellartools init` could not write the template.
    #[error("Failed to write config file '{}': {source}", path.display())]
    FileWrite {
        /// Destination of the template
        path: PathBuf,
        /// I/O failure
        #[source]
        source: std::io::Error,
    },

    /// A field required by the chosen command is missing.
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired {
        /// One of the [`field`] names
        field: &'static str,
        /// Where the value can come from
        hint: &'static str,
    },

    /// The base URL is relative or cannot carry a path.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// URL as written
        url: String,
        /// Parser message
        reason: String,
    },

    /// A timeout or delay of zero.
    #[error("Invalid duration for {field}: {reason}")]
    InvalidDuration {
        /// Setting name, such as `retry.base_delay`
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// A `--header` argument without a separator.
    #[error("Invalid header format '{value}': expected 'Key=Value' or 'Key: Value'")]
    InvalidHeader {
        /// Argument as given
        value: String,
    },

    /// A header name that is not a valid token.
    #[error("Invalid header name '{name}': {reason}")]
    InvalidHeaderName {
        /// Name as given
        name: String,
        /// Parser message
        reason: String,
    },

    /// A header value with forbidden bytes.
    #[error("Invalid header value for '{name}': {reason}")]
    InvalidHeaderValue {
        /// Header the value belongs to
        name: String,
        /// Parser message
        reason: String,
    },

    /// A `--query` argument without `=`.
    #[error("Invalid query parameter '{value}': expected 'Key=Value'")]
    InvalidQuery {
        /// Argument as given
        value: String,
    },

    /// Invalid HTTP method.
    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),
}

/// Names reported by [`ConfigError::MissingRequired`].
pub mod field {
    /// The API base URL field.
    pub const BASE_URL: &str = "base_url";
    /// The webhook signing secret field.
    pub const SECRET: &str = "secret";
}

impl ConfigError {
    /// Shorthand for [`ConfigError::MissingRequired`].
    #[must_use]
    pub const fn missing(field: &'static str, hint: &'static str) -> Self {
        Self::MissingRequired { field, hint }
    }
}
