//! CLI argument parsing using clap.
//!
//! Defines the command-line interface with all options and subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::defaults;

/// `StellarTools`: API client and webhook signing tools
///
/// Issues resilient API calls, signs and verifies webhook payloads,
/// and delivers signed webhook events.
#[derive(Debug, Parser)]
#[command(name = "stellartools")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,

    /// API base URL (required for `request`)
    #[arg(long = "base-url", global = true)]
    pub base_url: Option<String>,

    /// Per-attempt timeout in milliseconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// HTTP headers in 'Key=Value' or 'Key: Value' format (can be specified multiple times)
    #[arg(long = "header", value_name = "K=V", global = true)]
    pub headers: Vec<String>,

    /// Bearer token for Authorization header
    #[arg(long, global = true)]
    pub bearer: Option<String>,

    /// Number of retries after the first attempt
    #[arg(long = "retry-max", global = true)]
    pub retry_max: Option<u32>,

    /// Backoff base delay in milliseconds
    #[arg(long = "retry-delay", global = true)]
    pub retry_delay: Option<u64>,

    /// Log every failed attempt and its retry decision
    #[arg(long = "retry-debug", global = true)]
    pub retry_debug: bool,

    /// Webhook signing secret (required for `sign`, `verify`, `deliver`)
    #[arg(long, global = true, env = "STELLARTOOLS_WEBHOOK_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Signature tolerance in seconds
    #[arg(long, global = true)]
    pub tolerance: Option<u64>,

    /// User-Agent for webhook deliveries
    #[arg(long = "user-agent", global = true)]
    pub user_agent: Option<String>,

    /// Path to configuration file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

/// Subcommands for stellartools
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Generate a default configuration file
    Init {
        /// Output path for the configuration file
        #[arg(long, short, default_value = defaults::CONFIG_FILE)]
        output: PathBuf,
    },

    /// Print the signature header for a payload
    Sign {
        /// File holding the payload (stdin when omitted)
        #[arg(long = "payload-file")]
        payload_file: Option<PathBuf>,
    },

    /// Verify a signature header against a payload
    Verify {
        /// Signature header value, `t=<secs>,v1=<hex>`
        #[arg(long)]
        signature: String,

        /// File holding the payload (stdin when omitted)
        #[arg(long = "payload-file")]
        payload_file: Option<PathBuf>,
    },

    /// Deliver a signed webhook event
    Deliver {
        /// Destination URL
        #[arg(long)]
        url: String,

        /// Event type, e.g. `payment.succeeded`
        #[arg(long)]
        event: String,

        /// JSON file with the event data (empty object when omitted)
        #[arg(long = "data-file")]
        data_file: Option<PathBuf>,
    },

    /// Send one request to the configured API
    Request {
        /// HTTP method
        method: String,

        /// Endpoint relative to the base URL
        endpoint: String,

        /// File holding the request body
        #[arg(long = "body-file")]
        body_file: Option<PathBuf>,

        /// Request id used for cancellation and logging
        #[arg(long = "request-id")]
        request_id: Option<String>,

        /// Query parameter, repeatable
        #[arg(long = "query", value_name = "KEY=VALUE")]
        query: Vec<String>,
    },
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses CLI arguments from an iterator (useful for testing).
    pub fn parse_from_iter<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(iter)
    }

    /// Returns true if this is the init command.
    #[must_use]
    pub const fn is_init(&self) -> bool {
        matches!(self.command, Command::Init { .. })
    }
}
