//! Configuration layer for the `stellartools` binary.
//!
//! This module provides:
//! - CLI argument parsing ([`Cli`], [`Command`])
//! - TOML configuration file parsing ([`TomlConfig`])
//! - Validated configuration ([`ValidatedConfig`])
//! - Configuration file generation ([`write_default_config`])
//! - Default values ([`defaults`])
//!
//! # Priority
//!
//! Configuration values are resolved with the following priority (highest to lowest):
//!
//! 1. **Explicit CLI arguments** - Values explicitly passed via command line
//! 2. **TOML config file** - Values from the configuration file
//! 3. **Built-in defaults** - Hardcoded default values
//!
//! Headers merge by name: TOML `[client.headers]` first, then `--header`
//! flags, then the bearer token as `Authorization`.
//!
//! # Boolean Flag Semantics
//!
//! `--retry-debug` uses OR semantics: once `retry.debug = true` is set in
//! TOML, the CLI cannot turn it off.
//!
//! # Secrets
//!
//! The webhook secret may also come from `STELLARTOOLS_WEBHOOK_SECRET`.
//! [`ValidatedConfig`]'s `Display` reports only whether a secret is set.

mod cli;
pub mod defaults;
mod error;
mod toml;
mod validated;

#[cfg(test)]
mod validated_tests;

pub use cli::{Cli, Command};
pub use error::{ConfigError, field};
pub use toml::{ClientSection, RetrySection, TomlConfig, WebhookSection, default_config_template};
pub use validated::{ValidatedConfig, parse_method, parse_query_pair, write_default_config};
