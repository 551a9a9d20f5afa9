//! TOML configuration file parsing.
//!
//! Defines the structure of the configuration file with serde.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use super::ConfigError;

/// Root configuration structure from TOML file.
///
/// All fields are optional to allow partial configuration
/// that can be merged with CLI arguments.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// API client section
    #[serde(default)]
    pub client: ClientSection,

    /// Retry section
    #[serde(default)]
    pub retry: RetrySection,

    /// Webhook signing and delivery section
    #[serde(default)]
    pub webhook: WebhookSection,
}

/// API client configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSection {
    /// API base URL
    pub base_url: Option<String>,

    /// Per-attempt timeout in milliseconds
    pub timeout: Option<u64>,

    /// Bearer token for Authorization header
    pub bearer: Option<String>,

    /// Headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Retry configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    /// Retries after the first attempt
    pub max: Option<u32>,

    /// Backoff base delay in milliseconds
    pub base_delay: Option<u64>,

    /// Log every failed attempt
    #[serde(default)]
    pub debug: bool,
}

/// Webhook configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookSection {
    /// Signing secret
    pub secret: Option<String>,

    /// Signature tolerance in seconds
    pub tolerance: Option<u64>,

    /// User-Agent for deliveries
    pub user_agent: Option<String>,
}

impl TomlConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }
}

/// Generates a default configuration file with comments.
#[must_use]
pub fn default_config_template() -> String {
    r#"# StellarTools Configuration File

[client]
# API base URL (required for `stellartools request`)
# base_url = "https://api.stellartools.dev/v1"

# Per-attempt timeout in milliseconds (default: 30000)
# timeout = 30000

# Bearer token for Authorization header
# bearer = "sk_test_..."

# Headers sent with every request
# [client.headers]
# X-Custom-Header = "value"

[retry]
# Retries after the first attempt (default: 3)
# max = 3

# Backoff base delay in milliseconds (default: 1000)
# Delay after attempt n is base_delay * 2^(n-1), scaled by a random factor in [0.5, 1)
# base_delay = 1000

# Log every failed attempt and its retry decision
# debug = false

[webhook]
# Signing secret (required for sign, verify, deliver)
# Prefer the STELLARTOOLS_WEBHOOK_SECRET environment variable
# secret = "whsec_..."

# Signature tolerance in seconds (default: 300)
# tolerance = 300

# User-Agent for deliveries (default: StellarTools-Webhooks/1.0)
# user_agent = "StellarTools-Webhooks/1.0"
"#
    .to_string()
}
