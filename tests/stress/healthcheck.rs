//! Health monitor stress tests

use bulwark_healthcheck::{HealthCheck, HealthMonitor, HealthStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Test: Hundreds of fast checks polled concurrently, then churned
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn stress_many_checks() {
    let runs = Arc::new(AtomicUsize::new(0));
    let monitor = HealthMonitor::builder().name("stress").build();

    for i in 0..200 {
        let runs = Arc::clone(&runs);
        monitor
            .add_check(
                HealthCheck::new(format!("check-{i}"), move || {
                    runs.fetch_add(1, Ordering::Relaxed);
                    async { true }
                })
                .interval(Duration::from_millis(5)),
            )
            .await;
    }

    monitor.start().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    for i in (0..200).step_by(2) {
        assert!(monitor.remove_check(&format!("check-{i}")).await);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let health = monitor.get_health().await;
    monitor.stop().await;

    println!("{} check runs", runs.load(Ordering::Relaxed));
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.checks.len(), 100);
    assert!(runs.load(Ordering::Relaxed) >= 200);
}
