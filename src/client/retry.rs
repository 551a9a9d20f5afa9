//! Retry options, error classification, and the backoff executor.

use std::fmt::Display;
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use rand::Rng;
use regex::Regex;

use crate::time::Sleeper;

/// Retry configuration for an API client.
///
/// `max` counts retries after the first attempt, so a call makes at most
/// `max + 1` attempts.
///
/// # Defaults
///
/// - `max`: 3
/// - `base_delay`: 1 second
/// - `debug`: false
///
/// # Example
///
/// ```
/// use stellartools_core::client::RetryOptions;
/// use std::time::Duration;
///
/// let options = RetryOptions::new()
///     .with_max(5)
///     .with_base_delay(Duration::from_millis(250))
///     .with_debug(true);
///
/// assert_eq!(options.total_attempts(), 6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    /// Number of retries after the initial attempt.
    pub max: u32,

    /// Delay unit for exponential backoff.
    pub base_delay: Duration,

    /// Log every failed attempt and its retry decision.
    pub debug: bool,
}

impl RetryOptions {
    /// Default number of retries.
    pub const DEFAULT_MAX: u32 = 3;

    /// Default backoff base delay (1 second).
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

    /// Creates retry options with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max: Self::DEFAULT_MAX,
            base_delay: Self::DEFAULT_BASE_DELAY,
            debug: false,
        }
    }

    /// Creates options that never retry.
    #[must_use]
    pub const fn none() -> Self {
        Self::new().with_max(0)
    }

    /// Sets the number of retries after the first attempt.
    #[must_use]
    pub const fn with_max(mut self, max: u32) -> Self {
        self.max = max;
        self
    }

    /// Sets the backoff base delay.
    ///
    /// # Panics
    ///
    /// Panics if `delay` is zero.
    #[must_use]
    pub const fn with_base_delay(mut self, delay: Duration) -> Self {
        assert!(!delay.is_zero(), "base_delay must be greater than zero");
        self.base_delay = delay;
        self
    }

    /// Enables or disables per-attempt logging.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Upper bound on attempts for one call.
    #[must_use]
    pub const fn total_attempts(&self) -> u32 {
        self.max.saturating_add(1)
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the delay after failed attempt `attempt` (1-based).
///
/// `base_delay * 2^(attempt - 1) * (0.5 + random * 0.5)`, where `random` is a
/// draw from `[0, 1)`. The jitter therefore scales the exponential value by a
/// factor in `[0.5, 1.0)`.
///
/// ```
/// use stellartools_core::client::backoff_delay;
/// use std::time::Duration;
///
/// let base = Duration::from_millis(100);
/// assert_eq!(backoff_delay(1, base, 0.0), Duration::from_millis(50));
/// assert_eq!(backoff_delay(3, base, 0.0), Duration::from_millis(200));
/// ```
#[must_use]
pub fn backoff_delay(attempt: u32, base_delay: Duration, random: f64) -> Duration {
    // Exponent is capped well below i32::MAX
    #[allow(clippy::cast_possible_wrap)]
    let growth = 2_f64.powi(attempt.saturating_sub(1).min(64) as i32);
    let jitter = 0.5 + random.clamp(0.0, 1.0) * 0.5;
    let secs = base_delay.as_secs_f64() * growth * jitter;

    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Decides whether a failed attempt should be retried.
///
/// Implemented for any `Fn(&E, u32) -> bool`, so ad-hoc predicates can be
/// plugged in directly.
pub trait RetryClassifier<E: ?Sized>: Send + Sync {
    /// Returns true if `error`, raised by attempt number `attempt`, is transient.
    fn should_retry(&self, error: &E, attempt: u32) -> bool;
}

impl<E: ?Sized, F> RetryClassifier<E> for F
where
    F: Fn(&E, u32) -> bool + Send + Sync,
{
    fn should_retry(&self, error: &E, attempt: u32) -> bool {
        self(error, attempt)
    }
}

/// Independent patterns; any match marks an error message as transient.
const DEFAULT_RETRY_PATTERNS: &[&str] = &[
    r"(?i)rate[\s_-]?limit",
    r"(?i)too many requests",
    r"(?i)connection",
    r"(?i)time[\s_-]?out",
    r"(?i)internal[\s_-]?server[\s_-]?error",
    r"(?i)bad[\s_-]?gateway",
    r"(?i)service[\s_-]?unavailable",
    r"(?i)gateway[\s_-]?time[\s_-]?out",
    r"\b50[0234]\b",
];

static DEFAULT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DEFAULT_RETRY_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("built-in retry patterns are valid"))
        .collect()
});

static ABORTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)aborted").expect("abort pattern is valid"));

/// Message-based classifier used by the API client.
///
/// The error's `Display` output is matched against a list of regular
/// expressions. Messages containing "aborted" are never retried.
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    patterns: Vec<Regex>,
}

impl PatternClassifier {
    /// Creates a classifier from custom patterns.
    ///
    /// # Errors
    ///
    /// Returns the first pattern that fails to compile.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Classifies a raw error message.
    #[must_use]
    pub fn is_retryable_message(&self, message: &str) -> bool {
        if ABORTED.is_match(message) {
            return false;
        }
        self.patterns.iter().any(|p| p.is_match(message))
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.clone(),
        }
    }
}

impl<E: Display + ?Sized> RetryClassifier<E> for PatternClassifier {
    fn should_retry(&self, error: &E, _attempt: u32) -> bool {
        self.is_retryable_message(&error.to_string())
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// exhausts `options.max` retries.
///
/// The operation receives the 1-based attempt number. The last observed
/// error is returned when the loop gives up.
///
/// # Errors
///
/// Returns the error of the final attempt.
pub async fn with_retry<T, E, F, Fut, R, S>(
    options: &RetryOptions,
    classifier: &R,
    sleeper: &S,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: RetryClassifier<E> + ?Sized,
    S: Sleeper + ?Sized,
    E: Display,
{
    let mut attempt = 1;

    loop {
        let error = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let retryable = classifier.should_retry(&error, attempt);
        let exhausted = attempt > options.max;

        if options.debug {
            tracing::info!(
                attempt,
                error = %error,
                retry = retryable && !exhausted,
                "Request attempt failed"
            );
        }

        if !retryable || exhausted {
            return Err(error);
        }

        let delay = backoff_delay(attempt, options.base_delay, rand::thread_rng().gen_range(0.0..1.0));
        tracing::debug!(attempt, delay_ms = delay.as_millis(), "Backing off before retry");
        sleeper.sleep(delay).await;
        attempt += 1;
    }
}
