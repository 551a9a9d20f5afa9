//! Random identifiers for requests and webhook events.

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Returns `len` random characters from `[A-Za-z0-9]`.
#[must_use]
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Returns `len` random characters from `[a-z0-9]`.
#[must_use]
pub fn random_lowercase_token(len: usize) -> String {
    random_token(len).to_ascii_lowercase()
}
