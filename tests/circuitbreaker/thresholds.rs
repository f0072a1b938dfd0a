use bulwark_circuitbreaker::{CircuitBreaker, CircuitState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

async fn fail(breaker: &CircuitBreaker) -> bool {
    breaker
        .call(|| async { Err::<(), _>("boom") })
        .await
        .unwrap_err()
        .is_circuit_open()
}

#[tokio::test]
async fn opens_exactly_at_the_threshold() {
    for threshold in 1..=6 {
        let breaker = CircuitBreaker::builder().failure_threshold(threshold).build();

        for _ in 0..threshold - 1 {
            assert!(!fail(&breaker).await);
            assert_eq!(breaker.state(), CircuitState::Closed);
        }

        assert!(!fail(&breaker).await);
        assert_eq!(breaker.state(), CircuitState::Open, "threshold {threshold}");
    }
}

#[tokio::test]
async fn fourth_call_is_rejected_without_invoking_the_function() {
    let breaker = CircuitBreaker::builder()
        .name("payments")
        .failure_threshold(3)
        .build();
    let calls = AtomicUsize::new(0);

    let mut errors = Vec::new();
    for _ in 0..4 {
        let err = breaker
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("always throws")
            })
            .await
            .unwrap_err();
        errors.push(err.is_circuit_open());
    }

    assert_eq!(errors, vec![false, false, false, true]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn success_resets_the_consecutive_count() {
    let breaker = CircuitBreaker::builder().failure_threshold(3).build();

    fail(&breaker).await;
    fail(&breaker).await;
    breaker.call(|| async { Ok::<_, &str>(()) }).await.unwrap();
    fail(&breaker).await;
    fail(&breaker).await;

    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.stats().failure_count, 2);
}

#[tokio::test]
async fn ignored_errors_do_not_count() {
    let breaker = CircuitBreaker::builder()
        .failure_threshold(2)
        .should_trip(|e: &u16| *e >= 500)
        .build();

    for _ in 0..5 {
        let _ = breaker.call(|| async { Err::<(), u16>(404) }).await;
    }
    assert_eq!(breaker.state(), CircuitState::Closed);

    let _ = breaker.call(|| async { Err::<(), u16>(503) }).await;
    let _ = breaker.call(|| async { Err::<(), u16>(502) }).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    let stats = breaker.stats();
    assert_eq!(stats.ignored_errors, 5);
    assert_eq!(stats.failed_calls, 2);
}

#[tokio::test(start_paused = true)]
async fn tracking_window_forgets_old_failures() {
    let breaker = CircuitBreaker::builder()
        .failure_threshold(3)
        .tracking_window(Duration::from_secs(10))
        .build();

    fail(&breaker).await;
    fail(&breaker).await;
    tokio::time::sleep(Duration::from_secs(11)).await;
    fail(&breaker).await;

    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test]
async fn state_change_hook_sees_the_transition_once() {
    let transitions = Arc::new(Mutex::new(Vec::new()));
    let t = Arc::clone(&transitions);
    let breaker = CircuitBreaker::builder()
        .failure_threshold(2)
        .on_state_change(move |from, to| t.lock().unwrap().push((from, to)))
        .build();

    for _ in 0..5 {
        fail(&breaker).await;
    }

    assert_eq!(
        *transitions.lock().unwrap(),
        vec![(CircuitState::Closed, CircuitState::Open)]
    );
    assert_eq!(breaker.stats().rejected_calls, 3);
}

#[tokio::test]
async fn force_and_reset() {
    let breaker = CircuitBreaker::builder().build();

    breaker.force_open();
    assert!(fail(&breaker).await);

    breaker.force_closed();
    assert_eq!(breaker.state(), CircuitState::Closed);

    breaker.force_open();
    breaker.reset();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.stats().total_calls, 0);
}
