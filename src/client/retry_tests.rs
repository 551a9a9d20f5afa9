//! Tests for retry options, backoff, classification, and the retry loop.

use super::{
    PatternClassifier, RetryClassifier, RetryOptions, backoff_delay, with_retry,
};
use crate::time::{InstantSleeper, Sleeper};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

mod retry_options {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let options = RetryOptions::default();

        assert_eq!(options.max, 3);
        assert_eq!(options.base_delay, Duration::from_secs(1));
        assert!(!options.debug);
        assert_eq!(options.total_attempts(), 4);
    }

    #[test]
    fn none_makes_a_single_attempt() {
        assert_eq!(RetryOptions::none().total_attempts(), 1);
    }

    #[test]
    #[should_panic(expected = "base_delay must be greater than zero")]
    fn zero_base_delay_panics() {
        let _ = RetryOptions::new().with_base_delay(Duration::ZERO);
    }

    #[test]
    fn total_attempts_saturates() {
        assert_eq!(RetryOptions::new().with_max(u32::MAX).total_attempts(), u32::MAX);
    }
}

mod backoff {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn doubles_per_attempt() {
        let base = Duration::from_secs(1);

        assert_eq!(backoff_delay(1, base, 0.0), Duration::from_millis(500));
        assert_eq!(backoff_delay(2, base, 0.0), Duration::from_secs(1));
        assert_eq!(backoff_delay(3, base, 0.0), Duration::from_secs(2));
    }

    #[test]
    fn jitter_scales_up_to_full_value() {
        let base = Duration::from_millis(100);

        assert_eq!(backoff_delay(1, base, 0.5), Duration::from_millis(75));
        assert_eq!(backoff_delay(2, base, 1.0), Duration::from_millis(200));
    }

    #[test]
    fn huge_attempt_saturates_instead_of_panicking() {
        let delay = backoff_delay(u32::MAX, Duration::from_secs(1), 0.9);
        assert!(delay > Duration::from_secs(1_000_000));
    }

    proptest! {
        #[test]
        fn delay_stays_within_jitter_window(
            attempt in 1u32..16,
            base_ms in 1u64..5_000,
            random in 0.0f64..1.0,
        ) {
            let base = Duration::from_millis(base_ms);
            let full = base.as_secs_f64() * 2f64.powi(i32::try_from(attempt - 1).unwrap());
            let delay = backoff_delay(attempt, base, random).as_secs_f64();

            prop_assert!(delay >= full * 0.5 - 1e-6);
            prop_assert!(delay <= full + 1e-6);
        }
    }
}

mod classification {
    use super::*;

    fn retryable(message: &str) -> bool {
        PatternClassifier::default().is_retryable_message(message)
    }

    #[test]
    fn transient_messages_are_retried() {
        for message in [
            "Rate limit exceeded",
            "rate_limit",
            "429 Too Many Requests",
            "Connection error: refused",
            "socket timeout",
            "read time-out",
            "500: Internal Server Error",
            "502: bad gateway",
            "503: Service Unavailable",
            "504: upstream",
            "Gateway Timeout",
        ] {
            assert!(retryable(message), "expected retry for {message:?}");
        }
    }

    #[test]
    fn permanent_messages_are_not_retried() {
        for message in [
            "400: invalid amount",
            "401: unauthorized",
            "404: {\"error\":\"not found\"}",
            "422: validation failed",
            "Invalid URL: relative URL without a base",
            "status 5030",
            "Request timed out after 50ms",
        ] {
            assert!(!retryable(message), "expected no retry for {message:?}");
        }
    }

    #[test]
    fn aborted_wins_over_other_patterns() {
        assert!(!retryable("Request aborted by user"));
        assert!(!retryable("connection aborted"));
        assert!(!retryable("ABORTED after timeout"));
    }

    #[test]
    fn custom_patterns_replace_defaults() {
        let classifier = PatternClassifier::from_patterns(["(?i)flaky"]).unwrap();

        assert!(classifier.is_retryable_message("Flaky upstream"));
        assert!(!classifier.is_retryable_message("503: Service Unavailable"));
    }

    #[test]
    fn invalid_custom_pattern_is_rejected() {
        assert!(PatternClassifier::from_patterns(["("]).is_err());
    }

    #[test]
    fn closures_are_classifiers() {
        let only_first = |_: &String, attempt: u32| attempt == 1;

        assert!(only_first.should_retry(&"x".to_string(), 1));
        assert!(!only_first.should_retry(&"x".to_string(), 2));
    }
}

mod retry_loop {
    use super::*;

    /// Records requested delays without waiting.
    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    fn always(_: &String, _: u32) -> bool {
        true
    }

    fn never(_: &String, _: u32) -> bool {
        false
    }

    #[tokio::test]
    async fn success_returns_without_retry() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, String> =
            with_retry(&RetryOptions::new(), &always, &InstantSleeper, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(attempt) }
            })
            .await;

        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retryable_failure_runs_max_plus_one_attempts() {
        let calls = AtomicU32::new(0);
        let options = RetryOptions::new().with_max(2);

        let result: Result<(), String> = with_retry(&options, &always, &InstantSleeper, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("failure {attempt}")) }
        })
        .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_failure_stops_immediately() {
        let calls = AtomicU32::new(0);

        let result: Result<(), String> =
            with_retry(&RetryOptions::new(), &never, &InstantSleeper, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("permanent".to_string()) }
            })
            .await;

        assert_eq!(result, Err("permanent".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let result: Result<&str, String> =
            with_retry(&RetryOptions::new(), &always, &InstantSleeper, |attempt| async move {
                if attempt < 3 {
                    Err("503: Service Unavailable".to_string())
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
    }

    #[tokio::test]
    async fn sleeps_between_attempts_with_growing_delays() {
        let sleeper = RecordingSleeper::default();
        let options = RetryOptions::new()
            .with_max(3)
            .with_base_delay(Duration::from_millis(100));

        let _: Result<(), String> = with_retry(&options, &always, &sleeper, |_| async {
            Err("timeout".to_string())
        })
        .await;

        let delays = sleeper.delays.lock().unwrap().clone();
        assert_eq!(delays.len(), 3);
        assert!(delays[0] >= Duration::from_millis(50) && delays[0] <= Duration::from_millis(100));
        assert!(delays[1] >= Duration::from_millis(100) && delays[1] <= Duration::from_millis(200));
        assert!(delays[2] >= Duration::from_millis(200) && delays[2] <= Duration::from_millis(400));
    }

    #[tokio::test]
    async fn classifier_sees_attempt_numbers() {
        let seen = Mutex::new(Vec::new());
        let classifier = |_: &String, attempt: u32| {
            seen.lock().unwrap().push(attempt);
            true
        };

        let _: Result<(), String> = with_retry(
            &RetryOptions::new().with_max(2),
            &classifier,
            &InstantSleeper,
            |_| async { Err("x".to_string()) },
        )
        .await;

        assert_eq!(*seen.lock().unwrap(), [1, 2, 3]);
    }

    #[tokio::test]
    async fn debug_logging_does_not_change_outcome() {
        let options = RetryOptions::new().with_max(1).with_debug(true);

        let result: Result<(), String> = with_retry(&options, &always, &InstantSleeper, |_| async {
            Err("connection reset".to_string())
        })
        .await;

        assert!(result.is_err());
    }
}
