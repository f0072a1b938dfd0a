//! Bulkhead pattern for async calls and Tower services.
//!
//! A bulkhead bounds how many calls to one resource run at once, so that a
//! slow dependency cannot absorb every task in the process. Calls beyond
//! `max_concurrent` wait in a FIFO queue of at most `max_queue` callers, each
//! for at most `queue_timeout`; once the queue is full, further calls are
//! rejected immediately.
//!
//! Slots are `tokio::sync::Semaphore` permits. A permit is released when the
//! call finishes, including when the caller's future is dropped, and is handed
//! straight to the oldest queued caller.
//!
//! # Basic Example
//!
//! ```rust
//! use bulwark_bulkhead::Bulkhead;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bulkhead = Bulkhead::builder()
//!     .name("inventory-db")
//!     .max_concurrent(10)
//!     .max_queue(50)
//!     .queue_timeout(Duration::from_millis(250))
//!     .build();
//!
//! let rows = bulkhead
//!     .call(|| async { Ok::<_, std::io::Error>(vec![1, 2, 3]) })
//!     .await
//!     .unwrap();
//! assert_eq!(rows.len(), 3);
//! assert_eq!(bulkhead.stats().completed, 1);
//! # }
//! ```
//!
//! # Tower
//!
//! ```rust
//! use bulwark_bulkhead::{Bulkhead, BulkheadLayer};
//! use tower::ServiceBuilder;
//!
//! let bulkhead = Bulkhead::builder().max_concurrent(5).build();
//! let service = ServiceBuilder::new()
//!     .layer(BulkheadLayer::new(bulkhead))
//!     .service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) });
//! # let _ = service;
//! ```

mod config;
mod error;
mod events;
mod layer;

pub use config::{BulkheadConfig, BulkheadConfigBuilder};
pub use error::BulkheadError;
pub use events::BulkheadEvent;
pub use layer::{BulkheadLayer, BulkheadService};

use bulwark_core::{HealthReporter, HealthStatus, Outcome};
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Current occupancy of a bulkhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BulkheadState {
    /// Calls holding a slot.
    pub running: usize,
    /// Callers waiting for a slot.
    pub queued: usize,
}

/// Point-in-time view of a bulkhead's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BulkheadStats {
    pub running: usize,
    pub queued: usize,
    /// Calls that finished successfully.
    pub completed: u64,
    /// Calls that finished with an error.
    pub failed: u64,
    /// Calls rejected without running, including queue timeouts.
    pub rejected: u64,
    /// Rejections caused by the queue timeout.
    pub timed_out: u64,
    pub max_concurrent: usize,
    pub max_queue: usize,
}

struct Shared {
    config: BulkheadConfig,
    semaphore: Arc<Semaphore>,
    queued: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    timed_out: AtomicU64,
}

/// Holds a reserved queue position; gives it back when dropped.
struct QueuePosition<'a>(&'a Shared);

impl Drop for QueuePosition<'_> {
    fn drop(&mut self) {
        let _queued_calls = self.0.queued.fetch_sub(1, Ordering::SeqCst) - 1;

        #[cfg(feature = "metrics")]
        gauge!("bulkhead_queued_calls", "bulkhead" => self.0.config.name.clone())
            .set(_queued_calls as f64);
    }
}

/// A bulkhead.
///
/// Cloning is cheap; clones share slots, queue and counters.
#[derive(Clone)]
pub struct Bulkhead {
    shared: Arc<Shared>,
}

impl Bulkhead {
    /// Returns a builder with default settings.
    pub fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder::new()
    }

    /// Creates a bulkhead from `config`.
    pub fn new(config: BulkheadConfig) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_gauge!(
                    "bulkhead_concurrent_calls",
                    "Number of calls currently holding a bulkhead slot"
                );
                describe_gauge!(
                    "bulkhead_queued_calls",
                    "Number of callers waiting in the bulkhead queue"
                );
                describe_counter!(
                    "bulkhead_calls_total",
                    "Total number of bulkhead decisions and completions"
                );
            });
        }

        Self {
            shared: Arc::new(Shared {
                semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
                config,
                queued: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                timed_out: AtomicU64::new(0),
            }),
        }
    }

    /// The bulkhead's name.
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// The configuration the bulkhead was built with.
    pub fn config(&self) -> &BulkheadConfig {
        &self.shared.config
    }

    fn running(&self) -> usize {
        self.shared.config.max_concurrent - self.shared.semaphore.available_permits()
    }

    /// Current occupancy.
    pub fn state(&self) -> BulkheadState {
        BulkheadState {
            running: self.running(),
            queued: self.shared.queued.load(Ordering::SeqCst),
        }
    }

    /// Snapshot of occupancy and counters.
    pub fn stats(&self) -> BulkheadStats {
        let shared = &self.shared;
        let state = self.state();
        BulkheadStats {
            running: state.running,
            queued: state.queued,
            completed: shared.completed.load(Ordering::Relaxed),
            failed: shared.failed.load(Ordering::Relaxed),
            rejected: shared.rejected.load(Ordering::Relaxed),
            timed_out: shared.timed_out.load(Ordering::Relaxed),
            max_concurrent: shared.config.max_concurrent,
            max_queue: shared.config.max_queue,
        }
    }

    /// Clears the counters. Running and queued calls are not affected.
    pub fn reset(&self) {
        let shared = &self.shared;
        shared.completed.store(0, Ordering::Relaxed);
        shared.failed.store(0, Ordering::Relaxed);
        shared.rejected.store(0, Ordering::Relaxed);
        shared.timed_out.store(0, Ordering::Relaxed);
    }

    /// Obtains a slot, queueing if allowed.
    async fn acquire(&self) -> Result<OwnedSemaphorePermit, BulkheadError> {
        let shared = &self.shared;
        let config = &shared.config;

        let permit = match Arc::clone(&shared.semaphore).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let reserved = shared
                    .queued
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |queued| {
                        (queued < config.max_queue).then_some(queued + 1)
                    });
                let queued_calls = match reserved {
                    Ok(previous) => previous + 1,
                    Err(_) => return Err(self.reject(false)),
                };
                let _position = QueuePosition(shared);

                #[cfg(feature = "tracing")]
                tracing::trace!(bulkhead = %config.name, queued_calls, "call queued");

                #[cfg(feature = "metrics")]
                gauge!("bulkhead_queued_calls", "bulkhead" => config.name.clone())
                    .set(queued_calls as f64);

                config.event_listeners.emit(&BulkheadEvent::CallQueued {
                    pattern_name: config.name.clone(),
                    timestamp: Instant::now(),
                    queued_calls,
                });

                let waiting = Arc::clone(&shared.semaphore).acquire_owned();
                let acquired = match config.queue_timeout {
                    Some(after) => match tokio::time::timeout(after, waiting).await {
                        Ok(acquired) => acquired,
                        Err(_) => return Err(self.reject(true)),
                    },
                    None => waiting.await,
                };
                // The semaphore is never closed.
                acquired.map_err(|_| self.reject(false))?
            }
        };

        let concurrent_calls = self.running();

        #[cfg(feature = "tracing")]
        tracing::trace!(bulkhead = %config.name, concurrent_calls, "call permitted");

        #[cfg(feature = "metrics")]
        {
            counter!("bulkhead_calls_total", "bulkhead" => config.name.clone(), "result" => "permitted")
                .increment(1);
            gauge!("bulkhead_concurrent_calls", "bulkhead" => config.name.clone())
                .set(concurrent_calls as f64);
        }

        config.event_listeners.emit(&BulkheadEvent::CallPermitted {
            pattern_name: config.name.clone(),
            timestamp: Instant::now(),
            concurrent_calls,
        });

        Ok(permit)
    }

    fn reject(&self, queue_timed_out: bool) -> BulkheadError {
        let shared = &self.shared;
        let config = &shared.config;

        shared.rejected.fetch_add(1, Ordering::Relaxed);
        if queue_timed_out {
            shared.timed_out.fetch_add(1, Ordering::Relaxed);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            bulkhead = %config.name,
            max_concurrent = config.max_concurrent,
            queue_timed_out,
            "call rejected"
        );

        #[cfg(feature = "metrics")]
        counter!("bulkhead_calls_total", "bulkhead" => config.name.clone(), "result" => "rejected")
            .increment(1);

        config.event_listeners.emit(&BulkheadEvent::CallRejected {
            pattern_name: config.name.clone(),
            timestamp: Instant::now(),
            max_concurrent_calls: config.max_concurrent,
            queue_timed_out,
        });

        match config.queue_timeout {
            Some(after) if queue_timed_out => BulkheadError::QueueTimeout {
                name: config.name.clone(),
                max_concurrent: config.max_concurrent,
                after,
            },
            _ => BulkheadError::Full {
                name: config.name.clone(),
                max_concurrent: config.max_concurrent,
                max_queue: config.max_queue,
            },
        }
    }

    fn record(&self, succeeded: bool, duration: std::time::Duration) {
        let shared = &self.shared;
        let config = &shared.config;

        let event = if succeeded {
            shared.completed.fetch_add(1, Ordering::Relaxed);
            BulkheadEvent::CallFinished {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                duration,
            }
        } else {
            shared.failed.fetch_add(1, Ordering::Relaxed);
            BulkheadEvent::CallFailed {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                duration,
            }
        };

        #[cfg(feature = "metrics")]
        {
            let result = if succeeded { "finished" } else { "failed" };
            counter!("bulkhead_calls_total", "bulkhead" => config.name.clone(), "result" => result)
                .increment(1);
            gauge!("bulkhead_concurrent_calls", "bulkhead" => config.name.clone())
                .set(self.running() as f64);
        }

        config.event_listeners.emit(&event);
    }

    /// Runs `f` once a slot is available.
    ///
    /// Rejections return [`BulkheadError::Full`] or
    /// [`BulkheadError::QueueTimeout`] and `f` is never called.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, BulkheadError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.acquire().await.map_err(BulkheadError::widen)?;
        let start = Instant::now();
        let result = f().await;
        drop(permit);

        self.record(result.is_ok(), start.elapsed());
        result.map_err(BulkheadError::Inner)
    }

    /// Like [`call`](Self::call), returning an [`Outcome`] with timing.
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Outcome<T, BulkheadError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        Outcome::timed(self.call(f)).await
    }
}

impl std::fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bulkhead")
            .field("config", &self.shared.config)
            .field("state", &self.state())
            .finish()
    }
}

impl HealthReporter for Bulkhead {
    fn health_status(&self) -> HealthStatus {
        let state = self.state();
        let config = &self.shared.config;
        if state.running < config.max_concurrent {
            HealthStatus::Healthy
        } else if state.queued < config.max_queue {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        }
    }
}
