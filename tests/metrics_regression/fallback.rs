//! Fallback metrics regression tests

use super::helpers::*;
use bulwark_fallback::Fallback;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn fallback_metrics_exist() {
    init_recorder();

    let fallback = Fallback::<&str>::builder()
        .name("test_fb")
        .handle(|e| *e != "skip")
        .build();

    let _ = fallback
        .call(|| async { Ok("primary") }, |_| async { Ok("fallback") })
        .await;
    let _ = fallback
        .call(|| async { Err("down") }, |_| async { Ok("fallback") })
        .await;
    let _ = fallback
        .call(|| async { Err::<&str, _>("down") }, |_| async { Err("also down") })
        .await;
    let _ = fallback
        .call(|| async { Err::<&str, _>("skip") }, |_| async { Ok("fallback") })
        .await;

    assert_counter_exists("fallback_calls_total");
    assert_metric_has_label("fallback_calls_total", "fallback", "test_fb");
    assert_metric_has_label("fallback_calls_total", "result", "success");
    assert_metric_has_label("fallback_calls_total", "result", "applied");
    assert_metric_has_label("fallback_calls_total", "result", "failed");
    assert_metric_has_label("fallback_calls_total", "result", "skipped");
}
