use bulwark_bulkhead::Bulkhead;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn extra_call_waits_for_a_free_slot() {
    let max = 3;
    let bulkhead = Bulkhead::builder().max_concurrent(max).max_queue(1).build();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(Mutex::new(Vec::new()));

    let tasks: Vec<_> = (0..=max)
        .map(|i| {
            let bulkhead = bulkhead.clone();
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let finished = Arc::clone(&finished);
            tokio::spawn(async move {
                bulkhead
                    .call(|| async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        sleep(Duration::from_millis(100)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        finished.lock().unwrap().push((i, tokio::time::Instant::now()));
                        Ok::<_, ()>(())
                    })
                    .await
            })
        })
        .collect();

    let start = tokio::time::Instant::now();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), max);

    let finished = finished.lock().unwrap();
    let (last, at) = finished[max];
    assert_eq!(last, max);
    assert!(at.duration_since(start) >= Duration::from_millis(200));
}

#[tokio::test]
async fn state_tracks_running_calls() {
    let bulkhead = Bulkhead::builder().max_concurrent(2).build();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let held = {
        let bulkhead = bulkhead.clone();
        tokio::spawn(async move { bulkhead.call(|| async { rx.await.map_err(|_| ()) }).await })
    };
    tokio::task::yield_now().await;

    assert_eq!(bulkhead.state().running, 1);
    tx.send(()).unwrap();
    held.await.unwrap().unwrap();

    assert_eq!(bulkhead.state().running, 0);
    assert_eq!(bulkhead.stats().completed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bound_holds_across_threads() {
    let bulkhead = Bulkhead::builder().max_concurrent(5).max_queue(1000).build();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..200)
        .map(|_| {
            let bulkhead = bulkhead.clone();
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                bulkhead
                    .call(|| async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, ()>(())
                    })
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 5);
    assert_eq!(bulkhead.stats().completed, 200);
}
