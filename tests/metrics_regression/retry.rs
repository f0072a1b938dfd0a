//! Retry metrics regression tests

use super::helpers::*;
use bulwark_retry::Retry;
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn retry_metrics_exist() {
    init_recorder();

    let retry = Retry::<&str>::builder()
        .name("test_retry")
        .max_attempts(2)
        .constant_backoff(Duration::from_millis(1))
        .retry_on(|e| *e != "fatal")
        .build();

    let _ = retry.call(|| async { Ok::<_, &str>(()) }).await;
    let _ = retry.call(|| async { Err::<(), _>("transient") }).await;
    let _ = retry.call(|| async { Err::<(), _>("fatal") }).await;

    assert_counter_exists("retry_attempts_total");
    assert_metric_has_label("retry_attempts_total", "retry", "test_retry");

    assert_counter_exists("retry_calls_total");
    assert_metric_has_label("retry_calls_total", "retry", "test_retry");
    assert_metric_has_label("retry_calls_total", "result", "success");
    assert_metric_has_label("retry_calls_total", "result", "exhausted");
    assert_metric_has_label("retry_calls_total", "result", "non_retryable");
}
