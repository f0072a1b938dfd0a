use crate::classifier::{DefaultClassifier, TripClassifier};
use crate::{CircuitBreaker, CircuitBreakerError};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A Tower layer that guards services with a circuit breaker.
///
/// Every service produced by one layer shares the layer's breaker, so state
/// is tracked per dependency rather than per service clone.
///
/// ```rust
/// use bulwark_circuitbreaker::{CircuitBreaker, CircuitBreakerLayer};
/// use tower::{service_fn, ServiceBuilder};
///
/// let breaker = CircuitBreaker::builder().name("search").build();
///
/// let service = ServiceBuilder::new()
///     .layer(CircuitBreakerLayer::new(breaker.clone()))
///     .service(service_fn(|q: String| async move { Ok::<_, std::io::Error>(q) }));
/// # let _ = service;
/// ```
pub struct CircuitBreakerLayer<C = DefaultClassifier> {
    breaker: CircuitBreaker<C>,
}

impl<C> Clone for CircuitBreakerLayer<C> {
    fn clone(&self) -> Self {
        Self {
            breaker: self.breaker.clone(),
        }
    }
}

impl<C> CircuitBreakerLayer<C> {
    /// Creates a layer backed by `breaker`.
    pub fn new(breaker: CircuitBreaker<C>) -> Self {
        Self { breaker }
    }

    /// The shared breaker, for state inspection.
    pub fn breaker(&self) -> &CircuitBreaker<C> {
        &self.breaker
    }
}

impl<C> From<CircuitBreaker<C>> for CircuitBreakerLayer<C> {
    fn from(breaker: CircuitBreaker<C>) -> Self {
        Self::new(breaker)
    }
}

impl<S, C> Layer<S> for CircuitBreakerLayer<C> {
    type Service = CircuitBreakerService<S, C>;

    fn layer(&self, service: S) -> Self::Service {
        CircuitBreakerService {
            inner: service,
            breaker: self.breaker.clone(),
        }
    }
}

/// A Tower service guarded by a circuit breaker.
pub struct CircuitBreakerService<S, C = DefaultClassifier> {
    inner: S,
    breaker: CircuitBreaker<C>,
}

impl<S, C> CircuitBreakerService<S, C> {
    /// The shared breaker, for state inspection.
    pub fn breaker(&self) -> &CircuitBreaker<C> {
        &self.breaker
    }
}

impl<S: Clone, C> Clone for CircuitBreakerService<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            breaker: self.breaker.clone(),
        }
    }
}

impl<S, C, Req> Service<Req> for CircuitBreakerService<S, C>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
    C: TripClassifier<S::Error> + 'static,
{
    type Response = S::Response;
    type Error = CircuitBreakerError<S::Error>;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(CircuitBreakerError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let breaker = self.breaker.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move { breaker.call(|| inner.call(req)).await })
    }
}
