use bulwark_bulkhead::{Bulkhead, BulkheadLayer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tower::{Layer, ServiceExt};

/// Occupies one slot until `release` is notified.
fn hold(bulkhead: &Bulkhead, release: &Arc<Notify>) -> tokio::task::JoinHandle<Result<(), bulwark_bulkhead::BulkheadError<()>>> {
    let bulkhead = bulkhead.clone();
    let release = Arc::clone(release);
    tokio::spawn(async move {
        bulkhead
            .call(|| async move {
                release.notified().await;
                Ok(())
            })
            .await
    })
}

#[tokio::test]
async fn no_queue_rejects_the_extra_call() {
    let bulkhead = Bulkhead::builder().name("db").max_concurrent(1).build();
    let release = Arc::new(Notify::new());
    let held = hold(&bulkhead, &release);
    tokio::task::yield_now().await;

    let calls = AtomicUsize::new(0);
    let err = bulkhead
        .call(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(())
        })
        .await
        .unwrap_err();

    assert!(err.is_rejected());
    assert!(!err.is_queue_timeout());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(bulkhead.stats().rejected, 1);

    release.notify_one();
    held.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn queue_timeout_gives_up() {
    let bulkhead = Bulkhead::builder()
        .max_concurrent(1)
        .max_queue(5)
        .queue_timeout(Duration::from_millis(100))
        .build();
    let release = Arc::new(Notify::new());
    let held = hold(&bulkhead, &release);
    tokio::task::yield_now().await;

    let start = tokio::time::Instant::now();
    let err = bulkhead
        .call(|| async { Ok::<_, ()>(()) })
        .await
        .unwrap_err();

    assert!(err.is_queue_timeout());
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert_eq!(bulkhead.state().queued, 0);
    assert_eq!(bulkhead.stats().timed_out, 1);

    release.notify_one();
    held.await.unwrap().unwrap();
}

#[tokio::test]
async fn queued_calls_run_in_arrival_order() {
    let bulkhead = Bulkhead::builder().max_concurrent(1).max_queue(3).build();
    let release = Arc::new(Notify::new());
    let held = hold(&bulkhead, &release);
    tokio::task::yield_now().await;

    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    let waiters: Vec<_> = (0..3)
        .map(|i| {
            let bulkhead = bulkhead.clone();
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                bulkhead
                    .call(|| async move {
                        order.lock().unwrap().push(i);
                        Ok::<_, ()>(())
                    })
                    .await
            })
        })
        .collect();
    for _ in 0..3 {
        tokio::task::yield_now().await;
    }
    assert_eq!(bulkhead.state().queued, 3);

    release.notify_one();
    held.await.unwrap().unwrap();
    for waiter in waiters {
        waiter.await.unwrap().unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
}

#[tokio::test]
async fn layer_rejects_when_full() {
    let bulkhead = Bulkhead::builder().max_concurrent(1).build();
    let layer = BulkheadLayer::new(bulkhead.clone());
    let release = Arc::new(Notify::new());
    let held = hold(&bulkhead, &release);
    tokio::task::yield_now().await;

    let svc = layer.layer(tower::service_fn(|_: ()| async { Ok::<_, ()>("served") }));
    let err = svc.oneshot(()).await.unwrap_err();
    assert!(err.is_rejected());

    release.notify_one();
    held.await.unwrap().unwrap();
}
