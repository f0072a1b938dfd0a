//! Retry with backoff for async calls and Tower services.
//!
//! The first attempt always runs immediately. After a retryable failure the
//! executor waits for the next backoff delay and tries again, up to
//! `max_attempts` attempts in total:
//!
//! - **Constant**: every retry waits `initial_delay`
//! - **Linear**: the n-th retry waits `initial_delay * n`
//! - **Exponential**: the n-th retry waits `initial_delay * factor^(n-1)`
//!
//! Every delay is clamped to `max_delay`, then optionally spread by `jitter`.
//! Errors the `retry_on` predicate rejects are returned at once.
//!
//! # Example
//!
//! ```rust
//! use bulwark_retry::{retry, RetryConfig, RetryError};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = RetryConfig::builder()
//!     .max_attempts(3)
//!     .constant_backoff(Duration::from_millis(1))
//!     .build_config();
//!
//! let calls = AtomicUsize::new(0);
//! let result: Result<(), RetryError<&str>> = retry(
//!     || async {
//!         calls.fetch_add(1, Ordering::SeqCst);
//!         Err("unavailable")
//!     },
//!     &config,
//! )
//! .await;
//!
//! assert!(result.unwrap_err().is_exhausted());
//! assert_eq!(calls.load(Ordering::SeqCst), 3);
//! # }
//! ```
//!
//! # Tower
//!
//! [`RetryLayer`] retries requests against the inner service. Requests must
//! be `Clone`, since each attempt sends a fresh copy.

mod backoff;
mod config;
mod error;
mod events;
mod layer;

pub use backoff::{Backoff, BackoffPolicy};
pub use config::{RetryConfig, RetryConfigBuilder};
pub use error::RetryError;
pub use events::RetryEvent;
pub use layer::{RetryLayer, RetryService};

use bulwark_core::Outcome;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
use std::future::Future;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Instant;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Runs `f` until it succeeds, fails with a non-retryable error, or
/// `config.max_attempts()` attempts have failed.
pub async fn retry<F, Fut, T, E>(f: F, config: &RetryConfig<E>) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    run(config, f, |_| true).await
}

async fn run<F, Fut, T, E, P>(
    config: &RetryConfig<E>,
    mut f: F,
    retry_if: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 1;

    loop {
        let error = match f().await {
            Ok(value) => {
                #[cfg(feature = "metrics")]
                counter!("retry_calls_total", "retry" => config.name.clone(), "result" => "success")
                    .increment(1);

                config.event_listeners.emit(&RetryEvent::Success {
                    pattern_name: config.name.clone(),
                    timestamp: Instant::now(),
                    attempts: attempt,
                });
                return Ok(value);
            }
            Err(error) => error,
        };

        if !(config.should_retry(&error) && retry_if(&error)) {
            #[cfg(feature = "tracing")]
            tracing::debug!(retry = %config.name, attempt, "error not retryable");

            #[cfg(feature = "metrics")]
            counter!("retry_calls_total", "retry" => config.name.clone(), "result" => "non_retryable")
                .increment(1);

            config.event_listeners.emit(&RetryEvent::IgnoredError {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                attempts: attempt,
            });
            return Err(RetryError::NonRetryable(error));
        }

        if attempt >= config.max_attempts {
            #[cfg(feature = "tracing")]
            tracing::debug!(retry = %config.name, attempts = attempt, "retries exhausted");

            #[cfg(feature = "metrics")]
            counter!("retry_calls_total", "retry" => config.name.clone(), "result" => "exhausted")
                .increment(1);

            config.event_listeners.emit(&RetryEvent::Exhausted {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                attempts: attempt,
            });
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last_error: error,
            });
        }
        drop(error);

        let delay = config.policy.next_delay(attempt);

        #[cfg(feature = "tracing")]
        tracing::trace!(retry = %config.name, attempt, ?delay, "retrying");

        #[cfg(feature = "metrics")]
        counter!("retry_attempts_total", "retry" => config.name.clone()).increment(1);

        config.event_listeners.emit(&RetryEvent::Retry {
            pattern_name: config.name.clone(),
            timestamp: Instant::now(),
            attempt,
            delay,
        });

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// A reusable retry executor.
///
/// Cloning is cheap; clones share configuration.
pub struct Retry<E> {
    config: Arc<RetryConfig<E>>,
}

impl<E> Clone for Retry<E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl<E> std::fmt::Debug for Retry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retry").field("config", &self.config).finish()
    }
}

impl<E> Retry<E> {
    /// Returns a builder with default settings.
    pub fn builder() -> RetryConfigBuilder<E> {
        RetryConfigBuilder::new()
    }

    /// Creates an executor from `config`.
    pub fn new(config: RetryConfig<E>) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!("retry_attempts_total", "Total number of retries performed");
                describe_counter!(
                    "retry_calls_total",
                    "Total number of retried calls by final result"
                );
            });
        }

        Self {
            config: Arc::new(config),
        }
    }

    /// The executor's name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The configuration the executor was built with.
    pub fn config(&self) -> &RetryConfig<E> {
        &self.config
    }

    /// Runs `f` with this executor's retry policy.
    pub async fn call<F, Fut, T>(&self, f: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        run(&self.config, f, |_| true).await
    }

    /// Like [`call`](Self::call), but an error is only retried when both the
    /// configured predicate and `retry_if` accept it.
    pub async fn call_with<F, Fut, T, P>(&self, f: F, retry_if: P) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        run(&self.config, f, retry_if).await
    }

    /// Like [`call`](Self::call), returning an [`Outcome`] timed across every
    /// attempt and delay.
    pub async fn execute<F, Fut, T>(&self, f: F) -> Outcome<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        Outcome::timed(self.call(f)).await
    }
}
