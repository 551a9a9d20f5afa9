//! StellarTools core
//!
//! A resilient HTTP API client with retries, per-attempt timeouts and
//! request cancellation, plus HMAC-SHA256 webhook signing, verification
//! and signed delivery.

pub mod client;
pub mod config;
pub mod id;
pub mod time;
pub mod webhook;
