//! Bulkhead stress tests

use bulwark_bulkhead::Bulkhead;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use super::ConcurrencyTracker;

/// Test: Thousands of queued callers
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_large_queue() {
    let tracker = ConcurrencyTracker::new();
    let processed = Arc::new(AtomicUsize::new(0));
    let bulkhead = Bulkhead::builder()
        .name("stress")
        .max_concurrent(10)
        .max_queue(1000)
        .build();

    let start = Instant::now();
    let mut handles = vec![];

    for _ in 0..1000 {
        let bulkhead = bulkhead.clone();
        let tracker = Arc::clone(&tracker);
        let processed = Arc::clone(&processed);
        handles.push(tokio::spawn(async move {
            bulkhead
                .call(|| async {
                    tracker.enter();
                    sleep(Duration::from_millis(10)).await;
                    processed.fetch_add(1, Ordering::Relaxed);
                    tracker.exit();
                    Ok::<_, ()>(())
                })
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    println!("1000 queued calls with max concurrency 10");
    println!("Completed in: {:?}", start.elapsed());
    println!("Peak concurrency: {}", tracker.peak());

    assert!(tracker.peak() <= 10, "Should not exceed max concurrency");
    assert_eq!(processed.load(Ordering::Relaxed), 1000);
    assert_eq!(bulkhead.state().running, 0);
    assert_eq!(bulkhead.state().queued, 0);
}

/// Test: Rapid slot churn with short calls and rejections
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_slot_churn() {
    let tracker = ConcurrencyTracker::new();
    let bulkhead = Bulkhead::builder().max_concurrent(4).max_queue(4).build();

    let mut handles = vec![];
    for _ in 0..64 {
        let bulkhead = bulkhead.clone();
        let tracker = Arc::clone(&tracker);
        handles.push(tokio::spawn(async move {
            let mut rejected = 0u64;
            for _ in 0..1_000 {
                let result = bulkhead
                    .call(|| async {
                        tracker.enter();
                        tokio::task::yield_now().await;
                        tracker.exit();
                        Ok::<_, ()>(())
                    })
                    .await;
                if result.is_err() {
                    rejected += 1;
                }
            }
            rejected
        }));
    }

    let mut rejected = 0;
    for handle in handles {
        rejected += handle.await.unwrap();
    }

    let stats = bulkhead.stats();
    println!("64k calls, {} rejected, peak {}", rejected, tracker.peak());

    assert!(tracker.peak() <= 4);
    assert_eq!(tracker.current(), 0);
    assert_eq!(stats.rejected, rejected);
    assert_eq!(stats.completed + stats.rejected, 64_000);
}
