use bulwark_circuitbreaker::{CircuitBreaker, CircuitState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn tripped(reset: Duration) -> CircuitBreaker {
    CircuitBreaker::builder()
        .failure_threshold(1)
        .reset_timeout(reset)
        .build()
}

async fn trip(breaker: &CircuitBreaker) {
    let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn stays_open_until_the_reset_timeout() {
    let breaker = tripped(Duration::from_secs(5));
    trip(&breaker).await;

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}

#[tokio::test(start_paused = true)]
async fn admits_a_single_probe() {
    let breaker = tripped(Duration::from_secs(1));
    trip(&breaker).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let release = Arc::new(Notify::new());
    let probes = Arc::new(AtomicUsize::new(0));

    let probe = {
        let breaker = breaker.clone();
        let release = Arc::clone(&release);
        let probes = Arc::clone(&probes);
        tokio::spawn(async move {
            breaker
                .call(|| async move {
                    probes.fetch_add(1, Ordering::SeqCst);
                    release.notified().await;
                    Ok::<_, &str>(())
                })
                .await
        })
    };
    tokio::task::yield_now().await;
    assert_eq!(probes.load(Ordering::SeqCst), 1);

    let second = breaker.call(|| async { Ok::<_, &str>(()) }).await;
    assert!(second.unwrap_err().is_circuit_open());

    release.notify_one();
    probe.await.unwrap().unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn probe_failure_reopens() {
    let breaker = tripped(Duration::from_secs(1));
    trip(&breaker).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    let _ = breaker.call(|| async { Err::<(), _>("still down") }).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    // The open period restarts from the probe failure.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn success_threshold_needs_consecutive_probes() {
    let breaker = CircuitBreaker::builder()
        .failure_threshold(1)
        .success_threshold(2)
        .timeout(Duration::from_secs(1))
        .build();
    trip(&breaker).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    breaker.call(|| async { Ok::<_, &str>(()) }).await.unwrap();
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    breaker.call(|| async { Ok::<_, &str>(()) }).await.unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn dropped_probe_frees_its_slot() {
    let breaker = tripped(Duration::from_secs(1));
    trip(&breaker).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let abandoned = tokio::time::timeout(
        Duration::from_millis(10),
        breaker.call(|| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, &str>(())
        }),
    )
    .await;
    assert!(abandoned.is_err());

    breaker.call(|| async { Ok::<_, &str>(()) }).await.unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
}
