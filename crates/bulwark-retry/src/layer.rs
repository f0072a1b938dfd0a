use crate::{Retry, RetryError};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};

/// A Tower layer that retries failed requests.
///
/// ```
/// use bulwark_retry::{Retry, RetryLayer};
/// use std::time::Duration;
/// use tower::ServiceBuilder;
///
/// let retry = Retry::<std::io::Error>::builder()
///     .max_attempts(4)
///     .exponential_backoff(Duration::from_millis(50))
///     .max_delay(Duration::from_secs(2))
///     .build();
///
/// let service = ServiceBuilder::new()
///     .layer(RetryLayer::new(retry))
///     .service_fn(|req: u64| async move { Ok::<_, std::io::Error>(req * 2) });
/// # let _ = service;
/// ```
pub struct RetryLayer<E> {
    retry: Retry<E>,
}

impl<E> RetryLayer<E> {
    /// Creates a layer backed by `retry`.
    pub fn new(retry: Retry<E>) -> Self {
        Self { retry }
    }

    /// The shared executor.
    pub fn retry(&self) -> &Retry<E> {
        &self.retry
    }
}

impl<E> Clone for RetryLayer<E> {
    fn clone(&self) -> Self {
        Self {
            retry: self.retry.clone(),
        }
    }
}

impl<E> From<Retry<E>> for RetryLayer<E> {
    fn from(retry: Retry<E>) -> Self {
        Self::new(retry)
    }
}

impl<S, E> Layer<S> for RetryLayer<E> {
    type Service = RetryService<S, E>;

    fn layer(&self, service: S) -> Self::Service {
        RetryService {
            inner: service,
            retry: self.retry.clone(),
        }
    }
}

/// A Tower service that retries failed requests against the inner service.
pub struct RetryService<S, E> {
    inner: S,
    retry: Retry<E>,
}

impl<S: Clone, E> Clone for RetryService<S, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<S, Req, E> Service<Req> for RetryService<S, E>
where
    S: Service<Req, Error = E> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    Req: Clone + Send + 'static,
    E: Send + 'static,
{
    type Response = S::Response;
    type Error = RetryError<E>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(RetryError::NonRetryable)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let retry = self.retry.clone();
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            retry
                .call(move || inner.clone().oneshot(req.clone()))
                .await
        })
    }
}
