//! Property tests for retry.
//!
//! Invariants tested:
//! - Never more than max_attempts attempts
//! - A call that eventually succeeds within budget returns its value
//! - Delays never exceed max_delay, with or without jitter

use super::paused_runtime;
use bulwark_retry::{Backoff, Retry, RetryConfig};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn backoff() -> impl Strategy<Value = Backoff> {
    prop_oneof![
        Just(Backoff::Constant),
        Just(Backoff::Linear),
        Just(Backoff::Exponential),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: attempts == min(failures + 1, max_attempts)
    #[test]
    fn attempts_are_bounded(
        max_attempts in 1usize..=8,
        failures in 0usize..=12,
        backoff in backoff(),
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let retry = Retry::<&str>::builder()
                .max_attempts(max_attempts)
                .backoff(backoff)
                .initial_delay(Duration::from_millis(10))
                .build();
            let attempts = AtomicUsize::new(0);

            let result = retry
                .call(|| {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < failures { Err("transient") } else { Ok(n) }
                    }
                })
                .await;

            let made = attempts.load(Ordering::SeqCst);
            prop_assert_eq!(made, (failures + 1).min(max_attempts));
            if failures < max_attempts {
                prop_assert_eq!(result, Ok(failures));
            } else {
                let err = result.unwrap_err();
                prop_assert!(err.is_exhausted());
            }
            Ok(())
        })?;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: every delay is within [0, max_delay]
    #[test]
    fn delays_are_capped(
        backoff in backoff(),
        initial_ms in 1u64..=1_000,
        max_ms in 1u64..=5_000,
        factor in 1.0f64..=4.0,
        jitter in 0.0f64..=1.0,
        retry in 1usize..=64,
    ) {
        let config = RetryConfig::<()>::builder()
            .backoff(backoff)
            .initial_delay(Duration::from_millis(initial_ms))
            .max_delay(Duration::from_millis(max_ms))
            .factor(factor)
            .jitter(jitter)
            .build_config();

        let policy = config.policy();
        let max = Duration::from_millis(max_ms);
        prop_assert!(policy.delay(retry) <= max);
        prop_assert!(policy.next_delay(retry) <= max);
    }

    /// Property: without jitter, delays never shrink from one retry to the
    /// next
    #[test]
    fn delays_are_monotonic(
        backoff in backoff(),
        initial_ms in 1u64..=1_000,
        factor in 1.0f64..=4.0,
        retry in 1usize..=30,
    ) {
        let config = RetryConfig::<()>::builder()
            .backoff(backoff)
            .initial_delay(Duration::from_millis(initial_ms))
            .max_delay(Duration::from_secs(60))
            .factor(factor)
            .build_config();

        let policy = config.policy();
        prop_assert!(policy.delay(retry) <= policy.delay(retry + 1));
    }
}
