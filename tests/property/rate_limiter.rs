//! Property tests for the rate limiter.
//!
//! Invariants tested:
//! - A burst admits exactly max_requests, whatever the strategy
//! - Sliding window: no trailing window ever holds more than max_requests
//! - Token bucket: admissions never outrun capacity plus refill

use super::paused_runtime;
use bulwark_ratelimiter::{RateLimitStrategy, RateLimiter};
use proptest::prelude::*;
use std::time::Duration;
use tokio::time::Instant;

fn strategy() -> impl Strategy<Value = RateLimitStrategy> {
    prop_oneof![
        Just(RateLimitStrategy::FixedWindow),
        Just(RateLimitStrategy::SlidingWindow),
        Just(RateLimitStrategy::TokenBucket),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: a burst at one instant admits min(burst, max_requests)
    #[test]
    fn burst_admits_the_limit(
        strategy in strategy(),
        max_requests in 1usize..=20,
        burst in 1usize..=60,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let limiter = RateLimiter::builder()
                .strategy(strategy)
                .max_requests(max_requests)
                .window(Duration::from_secs(1))
                .build();

            let admitted = (0..burst).filter(|_| limiter.try_acquire()).count();

            prop_assert_eq!(admitted, burst.min(max_requests));
            prop_assert_eq!(limiter.available(), max_requests - admitted);
            Ok(())
        })?;
    }

    /// Property: any one-window span of the sliding window admits at most
    /// max_requests
    #[test]
    fn sliding_window_never_exceeds_the_limit(
        max_requests in 1usize..=10,
        gaps_ms in prop::collection::vec(0u64..400, 1..80),
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let window = Duration::from_secs(1);
            let limiter = RateLimiter::builder()
                .sliding_window()
                .max_requests(max_requests)
                .window(window)
                .build();

            let mut admitted = Vec::new();
            for gap in gaps_ms {
                tokio::time::advance(Duration::from_millis(gap)).await;
                if limiter.try_acquire() {
                    admitted.push(Instant::now());
                }
            }

            for (i, &start) in admitted.iter().enumerate() {
                let within = admitted[i..]
                    .iter()
                    .take_while(|&&t| t.duration_since(start) < window)
                    .count();
                prop_assert!(within <= max_requests, "{} admitted in one window", within);
            }
            Ok(())
        })?;
    }

    /// Property: after `t`, the bucket has admitted at most
    /// `max_requests + t * max_requests / window`
    #[test]
    fn token_bucket_respects_its_refill_rate(
        max_requests in 1usize..=10,
        gaps_ms in prop::collection::vec(0u64..300, 1..80),
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let window = Duration::from_secs(1);
            let limiter = RateLimiter::builder()
                .token_bucket()
                .max_requests(max_requests)
                .window(window)
                .build();
            let start = Instant::now();

            let mut admitted = 0usize;
            for gap in gaps_ms {
                tokio::time::advance(Duration::from_millis(gap)).await;
                if limiter.try_acquire() {
                    admitted += 1;
                }
                let elapsed = start.elapsed().as_nanos();
                let refilled = elapsed * max_requests as u128 / window.as_nanos();
                prop_assert!(admitted as u128 <= max_requests as u128 + refilled);
            }
            Ok(())
        })?;
    }
}
