//! Rate limiting for async calls.
//!
//! A [`RateLimiter`] admits or rejects calls using one of three counting
//! strategies, chosen once at construction:
//!
//! - **Fixed window**: a counter reset every window. Cheap, but a burst
//!   straddling a window boundary can admit up to twice the limit.
//! - **Sliding window**: admits while fewer than the limit were admitted in
//!   the trailing window.
//! - **Token bucket**: a bucket of `max_requests` tokens refilled
//!   continuously at `max_requests / window`.
//!
//! Admission is decided synchronously and never awaits. Rejections report a
//! `retry_after` hint. [`RateLimiter::acquire`] may wait for admission up to
//! the configured `timeout_duration` (zero by default, i.e. fail fast).
//!
//! # Examples
//!
//! ```
//! use bulwark_ratelimiter::{RateLimiter, RateLimitStrategy};
//! use std::time::Duration;
//!
//! let limiter = RateLimiter::builder()
//!     .strategy(RateLimitStrategy::TokenBucket)
//!     .max_requests(2)
//!     .window(Duration::from_secs(1))
//!     .build();
//!
//! assert!(limiter.try_acquire());
//! assert!(limiter.try_acquire());
//! assert!(!limiter.try_acquire());
//! ```
//!
//! Guarding an operation:
//!
//! ```
//! use bulwark_ratelimiter::RateLimiter;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let limiter = RateLimiter::builder().max_requests(1).build();
//!
//! let first = limiter.call(|| async { Ok::<_, std::io::Error>("fetched") }).await;
//! assert!(first.is_ok());
//!
//! let second = limiter.call(|| async { Ok::<_, std::io::Error>("fetched") }).await;
//! assert!(second.unwrap_err().is_rate_limited());
//! # }
//! ```

mod config;
mod error;
mod events;
mod layer;
mod strategy;

pub use config::{RateLimiterConfig, RateLimiterConfigBuilder};
pub use error::RateLimiterError;
pub use events::RateLimiterEvent;
pub use layer::{RateLimiterLayer, RateLimiterService};
pub use strategy::RateLimitStrategy;

use crate::strategy::Window;
use bulwark_core::{HealthReporter, HealthStatus, Outcome};
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Duration;
use tokio::time::Instant;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Point-in-time view of a limiter's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RateLimiterStats {
    /// Calls admitted since creation or the last reset.
    pub admitted: u64,
    /// Calls rejected since creation or the last reset.
    pub rejected: u64,
    /// Admissions that would succeed right now.
    pub available: usize,
    /// Configured admissions per window.
    pub max_requests: usize,
    /// The counting strategy.
    pub strategy: RateLimitStrategy,
}

#[derive(Debug)]
struct State {
    window: Window,
    admitted: u64,
    rejected: u64,
}

/// A rate limiter.
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct RateLimiter {
    config: Arc<RateLimiterConfig>,
    state: Arc<Mutex<State>>,
}

impl RateLimiter {
    /// Returns a builder with default settings.
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }

    /// Creates a limiter from `config`.
    pub fn new(config: RateLimiterConfig) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "ratelimiter_calls_total",
                    "Total number of rate limiter admission decisions"
                );
            });
        }

        let window = Window::new(config.strategy, config.max_requests, config.window, Instant::now());
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(State {
                window,
                admitted: 0,
                rejected: 0,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The limiter's name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The counting strategy.
    pub fn strategy(&self) -> RateLimitStrategy {
        self.config.strategy
    }

    /// The configuration the limiter was built with.
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Attempts one admission without counting it.
    fn admit(&self) -> Result<(), Duration> {
        self.lock().window.try_acquire(Instant::now())
    }

    /// Counts a final decision and reports it.
    fn record(&self, decision: Result<Duration, Duration>) {
        {
            let mut state = self.lock();
            match decision {
                Ok(_) => state.admitted += 1,
                Err(_) => state.rejected += 1,
            }
        }

        match decision {
            Ok(wait_duration) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(ratelimiter = %self.config.name, ?wait_duration, "permit acquired");

                #[cfg(feature = "metrics")]
                counter!("ratelimiter_calls_total", "ratelimiter" => self.config.name.clone(), "result" => "permitted").increment(1);

                self.config.event_listeners.emit(&RateLimiterEvent::PermitAcquired {
                    pattern_name: self.config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    wait_duration,
                });
            }
            Err(retry_after) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(ratelimiter = %self.config.name, ?retry_after, "rate limit exceeded");

                #[cfg(feature = "metrics")]
                counter!("ratelimiter_calls_total", "ratelimiter" => self.config.name.clone(), "result" => "rejected").increment(1);

                self.config.event_listeners.emit(&RateLimiterEvent::PermitRejected {
                    pattern_name: self.config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    retry_after,
                });
            }
        }
    }

    /// Admits one call if the strategy allows it right now.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_with_retry_after().is_ok()
    }

    /// Like [`try_acquire`](Self::try_acquire), returning the time until the
    /// next admission could succeed on rejection.
    pub fn try_acquire_with_retry_after(&self) -> Result<(), Duration> {
        let decision = self.admit();
        self.record(decision.map(|()| Duration::ZERO));
        decision
    }

    /// Admits one call, waiting up to `timeout_duration` for room.
    ///
    /// Returns how long the caller waited. If the reported `retry_after`
    /// would overrun the wait budget, rejects at once without sleeping.
    pub async fn acquire(&self) -> Result<Duration, RateLimiterError> {
        let start = Instant::now();
        let deadline = start + self.config.timeout_duration;

        loop {
            match self.admit() {
                Ok(()) => {
                    let waited = start.elapsed();
                    self.record(Ok(waited));
                    return Ok(waited);
                }
                Err(retry_after) => {
                    if Instant::now() + retry_after > deadline {
                        self.record(Err(retry_after));
                        return Err(RateLimiterError::RateLimitExceeded { retry_after });
                    }
                    tokio::time::sleep(retry_after).await;
                }
            }
        }
    }

    /// Calls `f` once admitted.
    ///
    /// A rejected call returns [`RateLimiterError::RateLimitExceeded`] and
    /// `f` is never called.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, RateLimiterError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.acquire().await.map_err(RateLimiterError::widen)?;
        f().await.map_err(RateLimiterError::Inner)
    }

    /// Like [`call`](Self::call), returning an [`Outcome`] with timing.
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Outcome<T, RateLimiterError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        Outcome::timed(self.call(f)).await
    }

    /// Snapshot of the limiter's counters.
    pub fn stats(&self) -> RateLimiterStats {
        let mut state = self.lock();
        RateLimiterStats {
            admitted: state.admitted,
            rejected: state.rejected,
            available: state.window.available(Instant::now()),
            max_requests: self.config.max_requests,
            strategy: self.config.strategy,
        }
    }

    /// Admissions that would succeed right now.
    pub fn available(&self) -> usize {
        self.lock().window.available(Instant::now())
    }

    /// Restores full capacity and clears the counters.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.window = Window::new(
            self.config.strategy,
            self.config.max_requests,
            self.config.window,
            Instant::now(),
        );
        state.admitted = 0;
        state.rejected = 0;
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HealthReporter for RateLimiter {
    fn health_status(&self) -> HealthStatus {
        if self.available() > 0 {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        }
    }
}
