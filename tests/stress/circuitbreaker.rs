//! Circuit breaker stress tests

use bulwark_circuitbreaker::{CircuitBreaker, CircuitState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Test: High volume of successful calls through a closed breaker
#[tokio::test]
#[ignore]
async fn stress_high_volume_closed() {
    let breaker = CircuitBreaker::builder().name("volume").build();

    let start = Instant::now();
    for i in 0..500_000u64 {
        breaker.call(|| async move { Ok::<_, ()>(i) }).await.unwrap();
    }
    let elapsed = start.elapsed();

    println!("500k calls in {:?} ({:.0} calls/s)", elapsed, 500_000.0 / elapsed.as_secs_f64());

    let stats = breaker.stats();
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(stats.successful_calls, 500_000);
}

/// Test: Concurrent failures open the breaker once and every later call is
/// rejected without running
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_concurrent_failures() {
    let transitions = Arc::new(AtomicUsize::new(0));
    let t = Arc::clone(&transitions);
    let breaker = CircuitBreaker::builder()
        .failure_threshold(50)
        .reset_timeout(Duration::from_secs(600))
        .on_state_change(move |_, to| {
            if to == CircuitState::Open {
                t.fetch_add(1, Ordering::SeqCst);
            }
        })
        .build();
    let invoked = Arc::new(AtomicUsize::new(0));

    let mut handles = vec![];
    for _ in 0..100 {
        let breaker = breaker.clone();
        let invoked = Arc::clone(&invoked);
        handles.push(tokio::spawn(async move {
            for _ in 0..100 {
                let _ = breaker
                    .call(|| async {
                        invoked.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>("down")
                    })
                    .await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = breaker.stats();
    println!("{} calls ran before the breaker opened", invoked.load(Ordering::SeqCst));

    assert_eq!(stats.state, CircuitState::Open);
    assert_eq!(transitions.load(Ordering::SeqCst), 1);
    assert_eq!(stats.rejected_calls + invoked.load(Ordering::SeqCst) as u64, 10_000);
}
