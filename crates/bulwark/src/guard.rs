//! Every pattern composed around one call.

use bulwark_bulkhead::Bulkhead;
use bulwark_circuitbreaker::{CircuitBreaker, DefaultClassifier, TripClassifier};
use bulwark_core::{HealthReporter, HealthStatus, Outcome, ResilienceError};
use bulwark_fallback::{Fallback, FallbackError};
use bulwark_ratelimiter::RateLimiter;
use bulwark_retry::Retry;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

type FallbackFn<T, E> = Arc<
    dyn Fn(ResilienceError<E>) -> BoxFuture<'static, Result<T, ResilienceError<E>>> + Send + Sync,
>;

/// Runs an operation through a bulkhead, a rate limiter, a circuit breaker,
/// retries with a per-attempt timeout, and a fallback. Each stage is
/// optional.
///
/// Per call:
///
/// 1. A bulkhead slot is taken and held until the call returns.
/// 2. The rate limiter admits the call once, however many attempts follow.
/// 3. Each attempt passes the breaker gate, then races the attempt timeout.
///    Once the breaker opens, no further attempts are made.
/// 4. If the call still fails, the fallback receives the final error and its
///    success becomes the call's success.
///
/// ```rust
/// use bulwark::guard::ResilienceGuard;
/// use bulwark::{circuitbreaker::CircuitBreaker, retry::Retry};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let guard = ResilienceGuard::<String, std::io::Error>::builder()
///     .circuit_breaker(CircuitBreaker::builder().name("profile").failure_threshold(5).build())
///     .retry(Retry::builder().max_attempts(3).constant_backoff(Duration::from_millis(10)).build())
///     .attempt_timeout(Duration::from_secs(2))
///     .fallback(|_err| async { Ok("anonymous".to_string()) })
///     .build();
///
/// let name = guard
///     .call(|| async { Err(std::io::Error::other("profile service down")) })
///     .await
///     .unwrap();
/// assert_eq!(name, "anonymous");
/// # }
/// ```
pub struct ResilienceGuard<T, E, C = DefaultClassifier> {
    inner: Arc<Stages<T, E, C>>,
}

struct Stages<T, E, C> {
    name: String,
    bulkhead: Option<Bulkhead>,
    rate_limiter: Option<RateLimiter>,
    circuit_breaker: Option<CircuitBreaker<C>>,
    retry: Option<Retry<ResilienceError<E>>>,
    attempt_timeout: Option<Duration>,
    fallback: Option<(Fallback<ResilienceError<E>>, FallbackFn<T, E>)>,
}

impl<T, E> ResilienceGuard<T, E> {
    pub fn builder() -> ResilienceGuardBuilder<T, E> {
        ResilienceGuardBuilder::new()
    }
}

impl<T, E, C> ResilienceGuard<T, E, C>
where
    C: TripClassifier<ResilienceError<E>>,
{
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn bulkhead(&self) -> Option<&Bulkhead> {
        self.inner.bulkhead.as_ref()
    }

    pub fn rate_limiter(&self) -> Option<&RateLimiter> {
        self.inner.rate_limiter.as_ref()
    }

    pub fn circuit_breaker(&self) -> Option<&CircuitBreaker<C>> {
        self.inner.circuit_breaker.as_ref()
    }

    /// Runs `op` through every configured stage.
    ///
    /// `op` is called once per attempt.
    pub async fn call<F, Fut>(&self, op: F) -> Result<T, ResilienceError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let stages = &*self.inner;
        match &stages.fallback {
            Some((fallback, f)) => fallback
                .call(|| stages.admit(&op), |error| f(error))
                .await
                .map_err(FallbackError::into_inner),
            None => stages.admit(&op).await,
        }
    }

    /// Like [`call`](Self::call), returning an [`Outcome`] timed across the
    /// whole pipeline.
    pub async fn execute<F, Fut>(&self, op: F) -> Outcome<T, ResilienceError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        Outcome::timed(self.call(op)).await
    }
}

impl<T, E, C> Stages<T, E, C>
where
    C: TripClassifier<ResilienceError<E>>,
{
    async fn admit<F, Fut>(&self, op: &F) -> Result<T, ResilienceError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match &self.bulkhead {
            Some(bulkhead) => bulkhead
                .call(|| self.limit(op))
                .await
                .map_err(unify),
            None => self.limit(op).await,
        }
    }

    async fn limit<F, Fut>(&self, op: &F) -> Result<T, ResilienceError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match &self.rate_limiter {
            Some(limiter) => limiter
                .call(|| self.retry(op))
                .await
                .map_err(unify),
            None => self.retry(op).await,
        }
    }

    async fn retry<F, Fut>(&self, op: &F) -> Result<T, ResilienceError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match &self.retry {
            Some(retry) => retry
                .call_with(|| self.attempt(op), |error| !error.is_circuit_open())
                .await
                .map_err(unify),
            None => self.attempt(op).await,
        }
    }

    async fn attempt<F, Fut>(&self, op: &F) -> Result<T, ResilienceError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match &self.circuit_breaker {
            Some(breaker) => breaker
                .call(|| self.timed(op))
                .await
                .map_err(unify),
            None => self.timed(op).await,
        }
    }

    async fn timed<F, Fut>(&self, op: &F) -> Result<T, ResilienceError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.attempt_timeout {
            Some(after) => match bulwark_core::timeout("attempt", after, op()).await {
                Ok(result) => result.map_err(ResilienceError::Application),
                Err(elapsed) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(guard = %self.name, ?after, "attempt timed out");
                    Err(elapsed.into())
                }
            },
            None => op().await.map_err(ResilienceError::Application),
        }
    }
}

/// Converts a pattern error around a unified attempt error into the unified
/// error.
fn unify<E, X>(error: X) -> ResilienceError<E>
where
    ResilienceError<ResilienceError<E>>: From<X>,
{
    ResilienceError::<ResilienceError<E>>::from(error).flatten()
}

impl<T, E, C> Clone for ResilienceGuard<T, E, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E, C> std::fmt::Debug for ResilienceGuard<T, E, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stages = &*self.inner;
        f.debug_struct("ResilienceGuard")
            .field("name", &stages.name)
            .field("bulkhead", &stages.bulkhead.is_some())
            .field("rate_limiter", &stages.rate_limiter.is_some())
            .field("circuit_breaker", &stages.circuit_breaker.is_some())
            .field("retry", &stages.retry.is_some())
            .field("attempt_timeout", &stages.attempt_timeout)
            .field("fallback", &stages.fallback.is_some())
            .finish()
    }
}

/// Worst health among the guard's bulkhead, rate limiter and breaker.
impl<T, E, C> HealthReporter for ResilienceGuard<T, E, C>
where
    C: Send + Sync,
{
    fn health_status(&self) -> HealthStatus {
        let stages = &*self.inner;
        [
            stages.bulkhead.as_ref().map(HealthReporter::health_status),
            stages.rate_limiter.as_ref().map(HealthReporter::health_status),
            stages
                .circuit_breaker
                .as_ref()
                .map(HealthReporter::health_status),
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(HealthStatus::Healthy)
    }
}

/// Builder for [`ResilienceGuard`].
pub struct ResilienceGuardBuilder<T, E, C = DefaultClassifier> {
    name: String,
    bulkhead: Option<Bulkhead>,
    rate_limiter: Option<RateLimiter>,
    circuit_breaker: Option<CircuitBreaker<C>>,
    retry: Option<Retry<ResilienceError<E>>>,
    attempt_timeout: Option<Duration>,
    fallback: Option<(Fallback<ResilienceError<E>>, FallbackFn<T, E>)>,
}

impl<T, E> Default for ResilienceGuardBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> ResilienceGuardBuilder<T, E> {
    /// A builder with no stages; the operation runs as-is.
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            bulkhead: None,
            rate_limiter: None,
            circuit_breaker: None,
            retry: None,
            attempt_timeout: None,
            fallback: None,
        }
    }
}

impl<T, E, C> ResilienceGuardBuilder<T, E, C> {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn bulkhead(mut self, bulkhead: Bulkhead) -> Self {
        self.bulkhead = Some(bulkhead);
        self
    }

    pub fn rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Each attempt passes through `breaker`. Its classifier sees the
    /// attempt's error, which is either the operation's error or a timeout.
    pub fn circuit_breaker<C2>(self, breaker: CircuitBreaker<C2>) -> ResilienceGuardBuilder<T, E, C2> {
        ResilienceGuardBuilder {
            name: self.name,
            bulkhead: self.bulkhead,
            rate_limiter: self.rate_limiter,
            circuit_breaker: Some(breaker),
            retry: self.retry,
            attempt_timeout: self.attempt_timeout,
            fallback: self.fallback,
        }
    }

    /// Failed attempts are retried by `retry`. An open circuit is never
    /// retried.
    pub fn retry(mut self, retry: Retry<ResilienceError<E>>) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Every attempt is raced against `after`.
    pub fn attempt_timeout(mut self, after: Duration) -> Self {
        self.attempt_timeout = Some(after);
        self
    }

    /// Answers failed calls with `f`, which receives the final error.
    pub fn fallback<F, Fut>(self, f: F) -> Self
    where
        F: Fn(ResilienceError<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ResilienceError<E>>> + Send + 'static,
    {
        let executor = Fallback::builder().name(self.name.clone()).build();
        self.fallback_with(executor, f)
    }

    /// Like [`fallback`](Self::fallback), through a configured executor whose
    /// `handle` predicate and hooks apply.
    pub fn fallback_with<F, Fut>(mut self, executor: Fallback<ResilienceError<E>>, f: F) -> Self
    where
        F: Fn(ResilienceError<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ResilienceError<E>>> + Send + 'static,
    {
        let f: FallbackFn<T, E> = Arc::new(move |error| f(error).boxed());
        self.fallback = Some((executor, f));
        self
    }

    pub fn build(self) -> ResilienceGuard<T, E, C> {
        ResilienceGuard {
            inner: Arc::new(Stages {
                name: self.name,
                bulkhead: self.bulkhead,
                rate_limiter: self.rate_limiter,
                circuit_breaker: self.circuit_breaker,
                retry: self.retry,
                attempt_timeout: self.attempt_timeout,
                fallback: self.fallback,
            }),
        }
    }
}
