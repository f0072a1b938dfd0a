//! Circuit breaker metrics regression tests

use super::helpers::*;
use bulwark_circuitbreaker::CircuitBreaker;
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn circuitbreaker_metrics_exist() {
    init_recorder();

    let breaker = CircuitBreaker::builder()
        .name("test_cb")
        .failure_threshold(2)
        .reset_timeout(Duration::from_secs(60))
        .should_trip(|e: &&str| *e != "ignored")
        .build();

    let _ = breaker.call(|| async { Ok::<_, &str>(()) }).await;
    let _ = breaker.call(|| async { Err::<(), _>("ignored") }).await;
    for _ in 0..2 {
        let _ = breaker.call(|| async { Err::<(), _>("failure") }).await;
    }
    let _ = breaker.call(|| async { Ok::<_, &str>(()) }).await;

    assert_counter_exists("circuitbreaker_calls_total");
    assert_metric_has_label("circuitbreaker_calls_total", "circuitbreaker", "test_cb");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "success");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "failure");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "ignored");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "rejected");

    assert_gauge_exists("circuitbreaker_state");
    assert_metric_has_label("circuitbreaker_state", "circuitbreaker", "test_cb");
}

#[tokio::test]
#[serial]
async fn circuitbreaker_state_transition_labels() {
    init_recorder();

    let breaker = CircuitBreaker::builder()
        .name("transition_cb")
        .failure_threshold(1)
        .reset_timeout(Duration::from_millis(50))
        .build();

    let _ = breaker.call(|| async { Err::<(), _>("failure") }).await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    let _ = breaker.call(|| async { Ok::<_, &str>(()) }).await;

    assert_counter_exists("circuitbreaker_transitions_total");
    assert_metric_has_label("circuitbreaker_transitions_total", "circuitbreaker", "transition_cb");
    assert_metric_has_label("circuitbreaker_transitions_total", "from", "closed");
    assert_metric_has_label("circuitbreaker_transitions_total", "to", "open");
    assert_metric_has_label("circuitbreaker_transitions_total", "from", "half_open");
    assert_metric_has_label("circuitbreaker_transitions_total", "to", "closed");
}
