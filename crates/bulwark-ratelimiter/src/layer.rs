use crate::{RateLimiter, RateLimiterError};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A Tower layer that applies a shared [`RateLimiter`] to services.
///
/// ```
/// use bulwark_ratelimiter::{RateLimiter, RateLimiterLayer};
/// use std::time::Duration;
/// use tower::ServiceBuilder;
///
/// let limiter = RateLimiter::builder()
///     .max_requests(100)
///     .window(Duration::from_secs(1))
///     .timeout_duration(Duration::from_millis(50))
///     .build();
///
/// let service = ServiceBuilder::new()
///     .layer(RateLimiterLayer::new(limiter))
///     .service(tower::service_fn(|req: String| async move {
///         Ok::<_, std::io::Error>(req)
///     }));
/// # let _ = service;
/// ```
#[derive(Clone, Debug)]
pub struct RateLimiterLayer {
    limiter: RateLimiter,
}

impl RateLimiterLayer {
    /// Creates a layer backed by `limiter`.
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }

    /// The shared limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

impl<S> Layer<S> for RateLimiterLayer {
    type Service = RateLimiterService<S>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimiterService {
            inner: service,
            limiter: self.limiter.clone(),
        }
    }
}

/// A Tower service that admits requests through a [`RateLimiter`].
#[derive(Clone, Debug)]
pub struct RateLimiterService<S> {
    inner: S,
    limiter: RateLimiter,
}

impl<S, Req> Service<Req> for RateLimiterService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = RateLimiterError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(RateLimiterError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let limiter = self.limiter.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move { limiter.call(|| inner.call(req)).await })
    }
}
