//! Validated configuration after merging CLI and TOML sources.
//!
//! This module contains the final, validated configuration that is used
//! by the application. All validation is performed during construction.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use http::HeaderMap;
use http::header::{AUTHORIZATION, HeaderName, HeaderValue};
use url::Url;

use crate::client::{ApiClientConfig, RetryOptions};

use super::cli::Cli;
use super::defaults;
use super::error::{ConfigError, field};
use super::toml::TomlConfig;

/// Fully validated configuration ready for use by the application.
///
/// Fields needed by only some commands (`base_url`, `secret`) stay optional
/// here; [`api_client_config`](Self::api_client_config) and
/// [`secret`](Self::secret) report them as missing on demand.
///
/// # Construction
///
/// Use [`ValidatedConfig::from_raw`] to create from CLI args and optional TOML config.
#[derive(Clone)]
pub struct ValidatedConfig {
    /// API base URL, syntax-checked but otherwise kept as written
    pub base_url: Option<String>,

    /// Headers sent with every API request
    pub headers: HeaderMap,

    /// Per-attempt timeout
    pub timeout: Duration,

    /// Retry behaviour for API calls and deliveries
    pub retry: RetryOptions,

    /// Webhook signing secret
    pub secret: Option<String>,

    /// Signature tolerance in seconds
    pub tolerance_secs: u64,

    /// User-Agent for webhook deliveries
    pub user_agent: String,

    /// Verbose logging enabled
    pub verbose: bool,
}

impl fmt::Debug for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedConfig")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("tolerance_secs", &self.tolerance_secs)
            .field("user_agent", &self.user_agent)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl fmt::Display for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Config {{ base_url: {}, timeout: {}ms, retry: {}x/{}ms, retry_debug: {}, \
             headers: {}, secret: {}, tolerance: {}s, user_agent: {} }}",
            self.base_url.as_deref().unwrap_or("none"),
            self.timeout.as_millis(),
            self.retry.max,
            self.retry.base_delay.as_millis(),
            self.retry.debug,
            self.headers.len(),
            if self.secret.is_some() { "set" } else { "none" },
            self.tolerance_secs,
            self.user_agent,
        )
    }
}

impl ValidatedConfig {
    /// Creates a validated configuration from CLI arguments and optional TOML config.
    ///
    /// CLI arguments take precedence over TOML config values.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The base URL is not an absolute URL
    /// - Timeout or retry base delay is zero
    /// - Header format, name, or value is invalid
    pub fn from_raw(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Self, ConfigError> {
        let base_url = Self::resolve_base_url(cli, toml)?;
        let headers = Self::resolve_headers(cli, toml)?;
        let timeout = Self::resolve_timeout(cli, toml)?;
        let retry = Self::build_retry(cli, toml)?;

        let secret = cli
            .secret
            .clone()
            .or_else(|| toml.and_then(|t| t.webhook.secret.clone()));

        let tolerance_secs = cli
            .tolerance
            .or_else(|| toml.and_then(|t| t.webhook.tolerance))
            .unwrap_or(defaults::TOLERANCE_SECS);

        let user_agent = cli
            .user_agent
            .clone()
            .or_else(|| toml.and_then(|t| t.webhook.user_agent.clone()))
            .unwrap_or_else(|| defaults::USER_AGENT.to_string());
        parse_header_value("User-Agent", &user_agent)?;

        Ok(Self {
            base_url,
            headers,
            timeout,
            retry,
            secret,
            tolerance_secs,
            user_agent,
            verbose: cli.verbose,
        })
    }

    /// Loads and merges configuration from CLI and optional config file.
    ///
    /// If `cli.config` is set, loads the TOML file from that path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file cannot be read or parsed
    /// - The merged configuration is invalid
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let toml = if let Some(ref path) = cli.config {
            Some(TomlConfig::load(path)?)
        } else {
            None
        };

        Self::from_raw(cli, toml.as_ref())
    }

    /// Builds the API client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequired`] if no base URL was configured.
    pub fn api_client_config(&self) -> Result<ApiClientConfig, ConfigError> {
        let base_url = self.base_url.clone().ok_or_else(|| {
            ConfigError::missing(
                field::BASE_URL,
                "Use --base-url or set client.base_url in config file",
            )
        })?;

        Ok(ApiClientConfig::new(base_url)
            .with_headers(self.headers.clone())
            .with_retry(self.retry)
            .with_timeout(self.timeout))
    }

    /// Returns the webhook signing secret.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequired`] if no secret was configured.
    pub fn secret(&self) -> Result<&str, ConfigError> {
        self.secret.as_deref().ok_or_else(|| {
            ConfigError::missing(
                field::SECRET,
                "Use --secret, STELLARTOOLS_WEBHOOK_SECRET, or set webhook.secret in config file",
            )
        })
    }

    fn resolve_base_url(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<Option<String>, ConfigError> {
        // CLI takes precedence
        let Some(url_str) = cli
            .base_url
            .as_deref()
            .or_else(|| toml.and_then(|t| t.client.base_url.as_deref()))
        else {
            return Ok(None);
        };

        let invalid = |reason: String| ConfigError::InvalidUrl {
            url: url_str.to_string(),
            reason,
        };
        let url = Url::parse(url_str).map_err(|e| invalid(e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(invalid("not a hierarchical URL".to_string()));
        }

        Ok(Some(url_str.to_string()))
    }

    fn resolve_headers(cli: &Cli, toml: Option<&TomlConfig>) -> Result<HeaderMap, ConfigError> {
        let mut headers = HeaderMap::new();

        // TOML first so CLI can override
        if let Some(toml) = toml {
            for (name, value) in &toml.client.headers {
                let header_name = parse_header_name(name)?;
                let header_value = parse_header_value(name, value)?;
                headers.insert(header_name, header_value);
            }
        }

        for header_str in &cli.headers {
            let (name, value) = parse_header_string(header_str)?;
            let header_name = parse_header_name(&name)?;
            let header_value = parse_header_value(&name, &value)?;
            headers.insert(header_name, header_value);
        }

        let bearer = cli
            .bearer
            .as_deref()
            .or_else(|| toml.and_then(|t| t.client.bearer.as_deref()));

        if let Some(token) = bearer {
            let mut header_value = parse_header_value("Authorization", &format!("Bearer {token}"))?;
            header_value.set_sensitive(true);
            headers.insert(AUTHORIZATION, header_value);
        }

        Ok(headers)
    }

    fn resolve_timeout(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Duration, ConfigError> {
        // Priority: CLI explicit > TOML > default
        let millis = cli
            .timeout
            .or_else(|| toml.and_then(|t| t.client.timeout))
            .unwrap_or(defaults::TIMEOUT_MS);

        if millis == 0 {
            return Err(ConfigError::InvalidDuration {
                field: "timeout",
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(Duration::from_millis(millis))
    }

    fn build_retry(cli: &Cli, toml: Option<&TomlConfig>) -> Result<RetryOptions, ConfigError> {
        let retry = toml.map(|t| &t.retry);

        let max = cli
            .retry_max
            .or_else(|| retry.and_then(|r| r.max))
            .unwrap_or(defaults::RETRY_MAX);

        let base_delay_ms = cli
            .retry_delay
            .or_else(|| retry.and_then(|r| r.base_delay))
            .unwrap_or(defaults::RETRY_BASE_DELAY_MS);

        // Flags only enable
        let debug = cli.retry_debug || retry.is_some_and(|r| r.debug);

        if base_delay_ms == 0 {
            return Err(ConfigError::InvalidDuration {
                field: "retry.base_delay",
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(RetryOptions::new()
            .with_max(max)
            .with_base_delay(Duration::from_millis(base_delay_ms))
            .with_debug(debug))
    }
}

/// Writes the default configuration template to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let template = super::toml::default_config_template();
    std::fs::write(path, template).map_err(|e| ConfigError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Parses an HTTP method name as given on the command line.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidMethod`] for anything but a valid token.
pub fn parse_method(s: &str) -> Result<http::Method, ConfigError> {
    s.to_ascii_uppercase()
        .parse::<http::Method>()
        .map_err(|_| ConfigError::InvalidMethod(s.to_string()))
}

/// Splits a `Key=Value` query argument. The value may be empty.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidQuery`] when there is no `=` or the key is empty.
pub fn parse_query_pair(s: &str) -> Result<(String, String), ConfigError> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(ConfigError::InvalidQuery {
            value: s.to_string(),
        }),
    }
}

fn parse_header_string(s: &str) -> Result<(String, String), ConfigError> {
    // Try "Key=Value" format first
    if let Some((name, value)) = s.split_once('=') {
        return Ok((name.trim().to_string(), value.trim().to_string()));
    }

    // Try "Key: Value" format
    if let Some((name, value)) = s.split_once(':') {
        return Ok((name.trim().to_string(), value.trim().to_string()));
    }

    Err(ConfigError::InvalidHeader {
        value: s.to_string(),
    })
}

fn parse_header_name(name: &str) -> Result<HeaderName, ConfigError> {
    name.parse::<HeaderName>()
        .map_err(|e| ConfigError::InvalidHeaderName {
            name: name.to_string(),
            reason: e.to_string(),
        })
}

fn parse_header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeaderValue {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
