//! Circuit breaker for async calls.
//!
//! A circuit breaker stops calling a persistently failing dependency for a
//! cooldown period, so that failures do not cascade into the caller.
//!
//! ## States
//! - **Closed**: calls pass through; consecutive tripping failures are counted
//! - **Open**: calls are rejected immediately without being invoked
//! - **Half-Open**: a limited number of probe calls test whether the
//!   dependency recovered
//!
//! ## Transitions
//! - Closed → Open when `failure_threshold` consecutive failures occur
//!   (optionally within a `tracking_window`)
//! - Open → Half-Open once the open period (`reset_timeout`, falling back to
//!   `timeout`) has elapsed, checked lazily on the next call or state query
//! - Half-Open → Closed after `success_threshold` consecutive probe successes
//! - Half-Open → Open on any probe failure
//!
//! ## Usage
//!
//! ```rust
//! use bulwark_circuitbreaker::{CircuitBreaker, CircuitState};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let breaker = CircuitBreaker::builder()
//!     .name("inventory")
//!     .failure_threshold(3)
//!     .timeout(Duration::from_secs(30))
//!     .build();
//!
//! for _ in 0..3 {
//!     let _ = breaker.call(|| async { Err::<(), _>("connection refused") }).await;
//! }
//! assert_eq!(breaker.state(), CircuitState::Open);
//!
//! let rejected = breaker.call(|| async { Ok::<_, &str>("never runs") }).await;
//! assert!(rejected.unwrap_err().is_circuit_open());
//! # }
//! ```
//!
//! ## Selective tripping
//!
//! ```rust
//! use bulwark_circuitbreaker::CircuitBreaker;
//! use std::io::{Error, ErrorKind};
//!
//! let breaker = CircuitBreaker::builder()
//!     .should_trip(|e: &Error| e.kind() != ErrorKind::NotFound)
//!     .build();
//! # let _ = breaker;
//! ```
//!
//! ## Tower
//!
//! [`CircuitBreakerLayer`] wraps any `tower::Service`; every service built from
//! one layer shares the same breaker.

use crate::circuit::{Admission, Circuit};
use bulwark_core::{HealthReporter, HealthStatus, Outcome};
#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
#[cfg(feature = "metrics")]
use std::sync::Once;
use tokio::time::Instant;

pub use circuit::{CircuitState, CircuitStats};
pub use classifier::{DefaultClassifier, FnClassifier, TripClassifier};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use layer::{CircuitBreakerLayer, CircuitBreakerService};

mod circuit;
pub mod classifier;
mod config;
mod error;
mod events;
mod layer;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// A circuit breaker.
///
/// Cloning is cheap; clones share state. `C` decides which errors trip the
/// breaker (see [`classifier`]).
pub struct CircuitBreaker<C = DefaultClassifier> {
    shared: Arc<Shared<C>>,
}

struct Shared<C> {
    circuit: Mutex<Circuit>,
    config: CircuitBreakerConfig<C>,
}

impl CircuitBreaker<DefaultClassifier> {
    /// Returns a builder with default settings.
    pub fn builder() -> CircuitBreakerConfigBuilder<DefaultClassifier> {
        CircuitBreakerConfigBuilder::new()
    }
}

impl<C> CircuitBreaker<C> {
    /// Creates a closed breaker from `config`.
    pub fn new(config: CircuitBreakerConfig<C>) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "circuitbreaker_calls_total",
                    "Total number of calls through the circuit breaker"
                );
                describe_counter!(
                    "circuitbreaker_transitions_total",
                    "Total number of circuit breaker state transitions"
                );
                describe_gauge!(
                    "circuitbreaker_state",
                    "Current state of the circuit breaker (0 closed, 1 open, 2 half-open)"
                );
            });
        }

        Self {
            shared: Arc::new(Shared {
                circuit: Mutex::new(Circuit::new()),
                config,
            }),
        }
    }

    /// Runs `f` against the locked circuit, then delivers the events it
    /// produced once the lock is released.
    fn with_circuit<R>(
        &self,
        f: impl FnOnce(&mut Circuit, &CircuitBreakerConfig<C>, Instant, &mut Vec<CircuitBreakerEvent>) -> R,
    ) -> R {
        let config = &self.shared.config;
        let mut events = Vec::new();
        let out = {
            let mut circuit = self
                .shared
                .circuit
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            f(&mut circuit, config, Instant::now(), &mut events)
        };
        for event in &events {
            config.event_listeners.emit(event);
        }
        out
    }

    /// The breaker's name.
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// The configuration the breaker was built with.
    pub fn config(&self) -> &CircuitBreakerConfig<C> {
        &self.shared.config
    }

    /// Current state, applying a due Open → Half-Open transition.
    pub fn state(&self) -> CircuitState {
        self.with_circuit(|circuit, config, now, events| circuit.refresh(config, now, events))
    }

    /// Returns whether the circuit is currently open.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Snapshot of the breaker's counters.
    pub fn stats(&self) -> CircuitStats {
        self.with_circuit(|circuit, config, now, events| {
            circuit.refresh(config, now, events);
            circuit.stats(config, now)
        })
    }

    /// A score in `[0, 1]`: 0 when open, `success_rate * 0.7` when
    /// half-open, `success_rate` when closed.
    pub fn health_score(&self) -> f64 {
        let stats = self.stats();
        match stats.state {
            CircuitState::Open => 0.0,
            CircuitState::HalfOpen => stats.success_rate * 0.7,
            CircuitState::Closed => stats.success_rate,
        }
    }

    /// Closes the circuit and clears every counter.
    pub fn reset(&self) {
        self.with_circuit(|circuit, config, now, events| circuit.reset(config, now, events));
    }

    /// Opens the circuit. It will move to half-open after the open period.
    pub fn force_open(&self) {
        self.with_circuit(|circuit, config, now, events| {
            circuit.force_state(CircuitState::Open, config, now, events)
        });
    }

    /// Closes the circuit, keeping the call counters.
    pub fn force_closed(&self) {
        self.with_circuit(|circuit, config, now, events| {
            circuit.force_state(CircuitState::Closed, config, now, events)
        });
    }

    fn try_acquire(&self) -> Option<Permit<'_, C>> {
        let admission = self.with_circuit(|circuit, config, now, events| {
            circuit.try_acquire(config, now, events)
        })?;
        Some(Permit {
            breaker: self,
            admission,
            settled: false,
        })
    }

    /// Calls `f` if the circuit admits it.
    ///
    /// The admission decision is made synchronously before `f` is invoked.
    /// A rejected call returns [`CircuitBreakerError::OpenCircuit`] and `f`
    /// is never called. If the returned future is dropped mid-call, a
    /// half-open probe slot is given back.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: TripClassifier<E>,
    {
        let Some(permit) = self.try_acquire() else {
            #[cfg(feature = "tracing")]
            tracing::debug!(breaker = %self.name(), "circuit breaker rejected call");

            return Err(CircuitBreakerError::OpenCircuit {
                name: self.name().to_string(),
            });
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(breaker = %self.name(), "circuit breaker permitted call");

        match f().await {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(error) => {
                if self.shared.config.classifier.should_trip(&error) {
                    permit.failure();
                } else {
                    permit.ignored();
                }
                Err(CircuitBreakerError::Inner(error))
            }
        }
    }

    /// Like [`call`](Self::call), returning an [`Outcome`] with timing.
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Outcome<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: TripClassifier<E>,
    {
        Outcome::timed(self.call(f)).await
    }
}

/// An admitted call that has not reported its outcome yet.
struct Permit<'a, C> {
    breaker: &'a CircuitBreaker<C>,
    admission: Admission,
    settled: bool,
}

impl<C> Permit<'_, C> {
    fn success(mut self) {
        self.settled = true;
        let admission = self.admission;
        self.breaker.with_circuit(|circuit, config, now, events| {
            circuit.on_success(config, admission, now, events)
        });
    }

    fn failure(mut self) {
        self.settled = true;
        let admission = self.admission;
        self.breaker.with_circuit(|circuit, config, now, events| {
            circuit.on_failure(config, admission, now, events)
        });
    }

    fn ignored(mut self) {
        self.settled = true;
        let admission = self.admission;
        self.breaker.with_circuit(|circuit, config, _now, events| {
            circuit.on_ignored(config, admission, events)
        });
    }
}

impl<C> Drop for Permit<'_, C> {
    fn drop(&mut self) {
        if !self.settled {
            let admission = self.admission;
            self.breaker
                .with_circuit(|circuit, _config, _now, _events| circuit.release_probe(admission));
        }
    }
}

impl<C> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C> std::fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl<C: Send + Sync> HealthReporter for CircuitBreaker<C> {
    fn health_status(&self) -> HealthStatus {
        match self.state() {
            CircuitState::Closed => HealthStatus::Healthy,
            CircuitState::HalfOpen => HealthStatus::Degraded,
            CircuitState::Open => HealthStatus::Unhealthy,
        }
    }
}
