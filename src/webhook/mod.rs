//! Webhook signing and delivery.
//!
//! This module provides:
//! - HMAC-SHA256 signatures with replay tolerance ([`WebhookSigner`])
//! - Signed event delivery with retries ([`WebhookDelivery`], [`DeliveryReport`])

mod delivery;
mod signer;


pub use delivery::{
    DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, DeliveryReport, EVENT_HEADER, SIGNATURE_HEADER,
    WebhookDelivery, WebhookDestination, WebhookEvent,
};
pub use signer::{DEFAULT_TOLERANCE_SECS, WebhookSigner, generate_signature, verify_signature};
