//! Bulkhead metrics regression tests

use super::helpers::*;
use bulwark_bulkhead::Bulkhead;
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn bulkhead_metrics_exist() {
    init_recorder();

    let bulkhead = Bulkhead::builder().name("test_bh").max_concurrent(1).build();

    let slow = bulkhead.call(|| async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, &str>(())
    });
    let extra = async {
        tokio::task::yield_now().await;
        bulkhead.call(|| async { Ok::<_, &str>(()) }).await
    };
    let (first, second) = tokio::join!(slow, extra);
    assert!(first.is_ok());
    assert!(second.unwrap_err().is_rejected());

    let _ = bulkhead.call(|| async { Err::<(), _>("failure") }).await;

    assert_counter_exists("bulkhead_calls_total");
    assert_metric_has_label("bulkhead_calls_total", "bulkhead", "test_bh");
    assert_metric_has_label("bulkhead_calls_total", "result", "permitted");
    assert_metric_has_label("bulkhead_calls_total", "result", "rejected");
    assert_metric_has_label("bulkhead_calls_total", "result", "finished");
    assert_metric_has_label("bulkhead_calls_total", "result", "failed");

    assert_gauge_exists("bulkhead_concurrent_calls");
    assert_metric_has_label("bulkhead_concurrent_calls", "bulkhead", "test_bh");
}

#[tokio::test]
#[serial]
async fn bulkhead_queue_gauge_exists() {
    init_recorder();

    let bulkhead = Bulkhead::builder()
        .name("test_bh_queue")
        .max_concurrent(1)
        .max_queue(1)
        .build();

    let slow = bulkhead.call(|| async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, &str>(())
    });
    let queued = async {
        tokio::task::yield_now().await;
        bulkhead.call(|| async { Ok::<_, &str>(()) }).await
    };
    let (first, second) = tokio::join!(slow, queued);
    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(bulkhead.state().queued, 0);

    assert_gauge_exists("bulkhead_queued_calls");
    assert_metric_has_label("bulkhead_queued_calls", "bulkhead", "test_bh_queue");
}
