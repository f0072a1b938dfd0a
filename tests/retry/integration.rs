use bulwark_retry::{Retry, RetryError, RetryLayer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::{Layer, ServiceExt};

#[derive(Debug, Clone, PartialEq)]
enum ApiError {
    Unavailable,
    BadRequest,
}

#[tokio::test(start_paused = true)]
async fn recovers_on_the_third_attempt() {
    let calls = Arc::new(AtomicUsize::new(0));
    let retry = Retry::<ApiError>::builder()
        .max_attempts(3)
        .constant_backoff(Duration::from_millis(10))
        .build();

    let c = Arc::clone(&calls);
    let result = retry
        .call(|| {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ApiError::Unavailable)
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

    assert_eq!(result, Ok("ok"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn rejected_errors_are_returned_after_one_attempt() {
    let calls = Arc::new(AtomicUsize::new(0));
    let ignored = Arc::new(AtomicUsize::new(0));
    let i = Arc::clone(&ignored);
    let retry = Retry::<ApiError>::builder()
        .max_attempts(5)
        .retry_on(|e| *e == ApiError::Unavailable)
        .on_ignored_error(move || {
            i.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    let c = Arc::clone(&calls);
    let err = retry
        .call(|| {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(ApiError::BadRequest) }
        })
        .await
        .unwrap_err();

    assert_eq!(err, RetryError::NonRetryable(ApiError::BadRequest));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(ignored.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn hooks_follow_the_attempts() {
    let retries = Arc::new(Mutex::new(Vec::new()));
    let exhausted = Arc::new(AtomicUsize::new(0));
    let succeeded = Arc::new(AtomicUsize::new(0));

    let r = Arc::clone(&retries);
    let e = Arc::clone(&exhausted);
    let s = Arc::clone(&succeeded);
    let retry = Retry::<ApiError>::builder()
        .max_attempts(3)
        .linear_backoff(Duration::from_millis(20))
        .on_retry(move |attempt, delay| r.lock().unwrap().push((attempt, delay)))
        .on_exhausted(move |attempts| {
            e.store(attempts, Ordering::SeqCst);
        })
        .on_success(move |attempts| {
            s.store(attempts, Ordering::SeqCst);
        })
        .build();

    let err = retry
        .call(|| async { Err::<(), _>(ApiError::Unavailable) })
        .await
        .unwrap_err();

    assert!(err.is_exhausted());
    assert_eq!(err.last_error(), &ApiError::Unavailable);
    assert_eq!(exhausted.load(Ordering::SeqCst), 3);
    assert_eq!(succeeded.load(Ordering::SeqCst), 0);
    assert_eq!(
        *retries.lock().unwrap(),
        vec![
            (1, Duration::from_millis(20)),
            (2, Duration::from_millis(40)),
        ]
    );

    retry.call(|| async { Ok::<_, ApiError>(()) }).await.unwrap();
    assert_eq!(succeeded.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn call_with_stops_on_errors_the_caller_rejects() {
    let calls = Arc::new(AtomicUsize::new(0));
    let retry = Retry::<ApiError>::builder().max_attempts(4).build();

    let c = Arc::clone(&calls);
    let err = retry
        .call_with(
            || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ApiError::Unavailable) }
            },
            |_| false,
        )
        .await
        .unwrap_err();

    assert!(!err.is_exhausted());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn execute_times_every_attempt() {
    let retry = Retry::<ApiError>::builder()
        .max_attempts(3)
        .constant_backoff(Duration::from_millis(50))
        .build();

    let outcome = retry
        .execute(|| async { Err::<(), _>(ApiError::Unavailable) })
        .await;

    assert!(outcome.is_failure());
    assert!(outcome.duration() >= Duration::from_millis(100));
    assert!(outcome.duration() < Duration::from_millis(110));
}

#[tokio::test(start_paused = true)]
async fn layer_resends_the_request() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let service = tower::service_fn(move |req: u32| {
        let mut seen = s.lock().unwrap();
        seen.push(req);
        let n = seen.len();
        async move {
            if n < 3 {
                Err(ApiError::Unavailable)
            } else {
                Ok(req * 10)
            }
        }
    });

    let retry = Retry::builder()
        .max_attempts(4)
        .constant_backoff(Duration::from_millis(1))
        .build();
    let response = RetryLayer::new(retry)
        .layer(service)
        .oneshot(7)
        .await
        .unwrap();

    assert_eq!(response, 70);
    assert_eq!(*seen.lock().unwrap(), vec![7, 7, 7]);
}
