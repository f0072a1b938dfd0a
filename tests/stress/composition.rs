//! Guard stress tests

use bulwark::guard::ResilienceGuard;
use bulwark_bulkhead::Bulkhead;
use bulwark_circuitbreaker::CircuitBreaker;
use bulwark_retry::Retry;
use std::time::{Duration, Instant};

use super::ConcurrencyTracker;

/// Test: Concurrent callers through every stage keep the bulkhead bound
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_guard_under_load() {
    let tracker = ConcurrencyTracker::new();
    let guard = ResilienceGuard::<u64, &'static str>::builder()
        .name("stress")
        .bulkhead(Bulkhead::builder().max_concurrent(16).max_queue(10_000).build())
        .circuit_breaker(CircuitBreaker::builder().failure_threshold(1_000_000).build())
        .retry(
            Retry::builder()
                .max_attempts(3)
                .constant_backoff(Duration::from_millis(1))
                .build(),
        )
        .attempt_timeout(Duration::from_secs(1))
        .build();

    let start = Instant::now();
    let mut handles = vec![];
    for i in 0..5_000u64 {
        let guard = guard.clone();
        let tracker = std::sync::Arc::clone(&tracker);
        handles.push(tokio::spawn(async move {
            guard
                .call(|| {
                    let tracker = std::sync::Arc::clone(&tracker);
                    async move {
                        tracker.enter();
                        tokio::task::yield_now().await;
                        tracker.exit();
                        if i % 10 == 0 {
                            Err("flaky")
                        } else {
                            Ok(i)
                        }
                    }
                })
                .await
        }));
    }

    let mut failed = 0;
    for handle in handles {
        if handle.await.unwrap().is_err() {
            failed += 1;
        }
    }

    println!("5000 guarded calls in {:?}, {} failed", start.elapsed(), failed);
    assert!(tracker.peak() <= 16);
    assert_eq!(failed, 500);
}
