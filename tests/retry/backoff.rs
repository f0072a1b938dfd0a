use bulwark_retry::{Backoff, BackoffPolicy, Retry, RetryConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Runs an always-failing operation and returns the delays the executor
/// reported, in milliseconds.
async fn observed_delays(builder: bulwark_retry::RetryConfigBuilder<&'static str>) -> Vec<u128> {
    let delays = Arc::new(Mutex::new(Vec::new()));
    let d = Arc::clone(&delays);
    let retry = builder
        .on_retry(move |_, delay| d.lock().unwrap().push(delay.as_millis()))
        .build();

    let _ = retry.call(|| async { Err::<(), _>("unavailable") }).await;
    let observed = delays.lock().unwrap().clone();
    observed
}

#[tokio::test(start_paused = true)]
async fn exponential_delays_double_then_clamp() {
    let delays = observed_delays(
        Retry::builder()
            .max_attempts(8)
            .exponential_backoff(Duration::from_millis(100))
            .factor(2.0)
            .max_delay(Duration::from_millis(1000)),
    )
    .await;

    assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000, 1000]);
}

#[tokio::test(start_paused = true)]
async fn linear_delays_grow_by_the_initial_delay() {
    let delays = observed_delays(
        Retry::builder()
            .max_attempts(5)
            .linear_backoff(Duration::from_millis(50)),
    )
    .await;

    assert_eq!(delays, vec![50, 100, 150, 200]);
}

#[tokio::test(start_paused = true)]
async fn constant_delays_stay_flat() {
    let delays = observed_delays(
        Retry::builder()
            .max_attempts(4)
            .constant_backoff(Duration::from_millis(250)),
    )
    .await;

    assert_eq!(delays, vec![250, 250, 250]);
}

#[tokio::test(start_paused = true)]
async fn total_elapsed_matches_the_schedule() {
    let config = RetryConfig::builder()
        .max_attempts(4)
        .exponential_backoff(Duration::from_millis(100))
        .build_config();

    let start = tokio::time::Instant::now();
    let err = bulwark_retry::retry(|| async { Err::<(), _>("down") }, &config)
        .await
        .unwrap_err();

    assert!(err.is_exhausted());
    // 100 + 200 + 400
    assert!(start.elapsed() >= Duration::from_millis(700));
    assert!(start.elapsed() < Duration::from_millis(710));
}

#[test]
fn jittered_delays_stay_within_bounds() {
    let config = RetryConfig::<()>::builder()
        .backoff(Backoff::Exponential)
        .initial_delay(Duration::from_millis(100))
        .max_delay(Duration::from_secs(10))
        .jitter(0.5)
        .build_config();
    let policy: &BackoffPolicy = config.policy();
    assert_eq!(policy.delay(3), Duration::from_millis(400));

    for _ in 0..200 {
        let delay = policy.next_delay(3);
        assert!(delay >= Duration::from_millis(200), "{delay:?}");
        assert!(delay <= Duration::from_millis(600), "{delay:?}");
    }
}
