//! Fallback composition for async calls and Tower services.
//!
//! When the primary operation fails, a fallback operation runs with the
//! primary's error and its result stands in for the primary's. The fallback
//! runs at most once and is never retried; if it fails too, the caller gets
//! [`FallbackError::FallbackFailed`].
//!
//! # One-off
//!
//! ```rust
//! use bulwark_fallback::with_fallback;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let outcome = with_fallback(
//!     || async { Err::<&str, _>("primary down") },
//!     |_err| async { Ok("ok") },
//! )
//! .await;
//!
//! assert_eq!(outcome.value(), Some(&"ok"));
//! # }
//! ```
//!
//! # Reusable executor
//!
//! A [`Fallback`] carries a name, a `handle` predicate choosing which errors
//! the fallback covers, and event hooks:
//!
//! ```rust
//! use bulwark_fallback::Fallback;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let fallback = Fallback::<std::io::Error>::builder()
//!     .name("profile-cache")
//!     .handle(|e| e.kind() == std::io::ErrorKind::TimedOut)
//!     .build();
//!
//! let name = fallback
//!     .call(
//!         || async { Err(std::io::Error::from(std::io::ErrorKind::TimedOut)) },
//!         |_| async { Ok("guest".to_string()) },
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(name, "guest");
//! # }
//! ```

mod config;
mod error;
mod events;
mod layer;

pub use config::{FallbackConfig, FallbackConfigBuilder, HandlePredicate};
pub use error::FallbackError;
pub use events::FallbackEvent;
pub use layer::{FallbackLayer, FallbackService};

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

/// Runs `primary`; if it fails, runs `fallback` with the error.
///
/// Returns a success if either succeeded, otherwise
/// [`FallbackError::FallbackFailed`] with the fallback's error. The outcome's
/// duration covers both operations.
pub async fn with_fallback<P, PFut, F, FFut, T, E>(
    primary: P,
    fallback: F,
) -> Outcome<T, FallbackError<E>>
where
    P: FnOnce() -> PFut,
    PFut: Future<Output = Result<T, E>>,
    F: FnOnce(E) -> FFut,
    FFut: Future<Output = Result<T, E>>,
{
    Outcome::timed(async move {
        match primary().await {
            Ok(value) => Ok(value),
            Err(error) => fallback(error).await.map_err(FallbackError::FallbackFailed),
        }
    })
    .await
}

/// A reusable fallback executor.
///
/// Cloning is cheap; clones share configuration.
pub struct Fallback<E> {
    config: Arc<FallbackConfig<E>>,
}

impl<E> Clone for Fallback<E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl<E> std::fmt::Debug for Fallback<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fallback")
            .field("name", &self.config.name)
            .finish_non_exhaustive()
    }
}

impl<E> Fallback<E> {
    /// Returns a builder with default settings.
    pub fn builder() -> FallbackConfigBuilder<E> {
        FallbackConfigBuilder::new()
    }

    /// Creates an executor from `config`.
    pub fn new(config: FallbackConfig<E>) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "fallback_calls_total",
                "Total number of fallback operations"
            );
        });

        Self {
            config: Arc::new(config),
        }
    }

    /// The executor's name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    fn emit(&self, event: FallbackEvent) {
        #[cfg(feature = "metrics")]
        counter!(
            "fallback_calls_total",
            "fallback" => self.config.name.clone(),
            "result" => bulwark_core::ResilienceEvent::event_type(&event)
        )
        .increment(1);

        self.config.event_listeners.emit(&event);
    }

    /// Runs `primary`; if it fails with an error the `handle` predicate
    /// accepts, runs `fallback` with that error.
    pub async fn call<P, PFut, F, FFut, T>(
        &self,
        primary: P,
        fallback: F,
    ) -> Result<T, FallbackError<E>>
    where
        P: FnOnce() -> PFut,
        PFut: Future<Output = Result<T, E>>,
        F: FnOnce(E) -> FFut,
        FFut: Future<Output = Result<T, E>>,
    {
        let config = &self.config;
        let pattern_name = config.name.clone();

        let error = match primary().await {
            Ok(value) => {
                self.emit(FallbackEvent::Success {
                    pattern_name,
                    timestamp: Instant::now(),
                });
                return Ok(value);
            }
            Err(error) => error,
        };

        if !config.handles(&error) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                fallback = %config.name,
                "error does not match predicate, skipping fallback"
            );

            self.emit(FallbackEvent::Skipped {
                pattern_name,
                timestamp: Instant::now(),
            });
            return Err(FallbackError::Inner(error));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(fallback = %config.name, "primary failed, applying fallback");

        let started = Instant::now();
        match fallback(error).await {
            Ok(value) => {
                self.emit(FallbackEvent::Applied {
                    pattern_name,
                    timestamp: Instant::now(),
                    fallback_duration: started.elapsed(),
                });
                Ok(value)
            }
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(fallback = %config.name, "fallback failed");

                self.emit(FallbackEvent::Failed {
                    pattern_name,
                    timestamp: Instant::now(),
                    fallback_duration: started.elapsed(),
                });
                Err(FallbackError::FallbackFailed(error))
            }
        }
    }

    /// Like [`call`](Self::call), returning an [`Outcome`] with timing.
    pub async fn execute<P, PFut, F, FFut, T>(
        &self,
        primary: P,
        fallback: F,
    ) -> Outcome<T, FallbackError<E>>
    where
        P: FnOnce() -> PFut,
        PFut: Future<Output = Result<T, E>>,
        F: FnOnce(E) -> FFut,
        FFut: Future<Output = Result<T, E>>,
    {
        Outcome::timed(self.call(primary, fallback)).await
    }
}
