//! Unified error type for composed call pipelines.
//!
//! Every pattern crate has its own precise error enum. When several patterns
//! are stacked around one operation, [`ResilienceError<E>`] gives the caller a
//! single type to match on: each pattern crate provides a `From` conversion
//! from its error into the matching variant, and the operation's own error
//! travels in [`ResilienceError::Application`].
//!
//! ```rust
//! use bulwark_core::ResilienceError;
//!
//! #[derive(Debug)]
//! struct DbError;
//!
//! impl std::fmt::Display for DbError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "db down")
//!     }
//! }
//!
//! impl std::error::Error for DbError {}
//!
//! fn describe(err: &ResilienceError<DbError>) -> &'static str {
//!     match err {
//!         ResilienceError::CircuitOpen { .. } => "shed by breaker",
//!         ResilienceError::RateLimited { .. } => "over rate",
//!         ResilienceError::BulkheadRejected { .. } => "over capacity",
//!         ResilienceError::Timeout { .. } => "too slow",
//!         ResilienceError::RetryExhausted { .. } => "gave up",
//!         ResilienceError::Application(_) => "db error",
//!     }
//! }
//!
//! assert_eq!(describe(&ResilienceError::Application(DbError)), "db error");
//! ```

use std::fmt;
use std::time::Duration;

/// An error from any layer of a guarded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResilienceError<E> {
    /// A timer won the race against the operation.
    Timeout {
        /// Component that imposed the deadline.
        layer: &'static str,
        /// The deadline that elapsed.
        after: Duration,
    },

    /// The circuit breaker rejected the call without invoking it.
    CircuitOpen {
        /// Breaker name.
        name: String,
    },

    /// The bulkhead rejected the call: its queue was full, or the queue
    /// wait timed out.
    BulkheadRejected {
        /// Bulkhead name.
        name: String,
        /// Configured concurrency bound.
        max_concurrent: usize,
        /// `true` when the call waited in the queue and timed out.
        queue_timed_out: bool,
    },

    /// The rate limiter rejected the call.
    RateLimited {
        /// Earliest time after which an admission could succeed, if known.
        retry_after: Option<Duration>,
    },

    /// Every retry attempt failed; carries the last failure.
    RetryExhausted {
        /// Number of attempts made.
        attempts: usize,
        /// The error from the final attempt.
        last_error: Box<ResilienceError<E>>,
    },

    /// The operation itself failed.
    Application(E),
}

impl<E> fmt::Display for ResilienceError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResilienceError::Timeout { layer, after } => {
                write!(f, "{} timed out after {:?}", layer, after)
            }
            ResilienceError::CircuitOpen { name } => {
                write!(f, "circuit breaker '{}' is open", name)
            }
            ResilienceError::BulkheadRejected {
                name,
                max_concurrent,
                queue_timed_out,
            } => {
                if *queue_timed_out {
                    write!(f, "bulkhead '{}' queue wait timed out", name)
                } else {
                    write!(f, "bulkhead '{}' is full ({} concurrent)", name, max_concurrent)
                }
            }
            ResilienceError::RateLimited { retry_after } => match retry_after {
                Some(d) => write!(f, "rate limit exceeded, retry after {:?}", d),
                None => write!(f, "rate limit exceeded"),
            },
            ResilienceError::RetryExhausted {
                attempts,
                last_error,
            } => write!(f, "retries exhausted after {} attempts: {}", attempts, last_error),
            ResilienceError::Application(e) => write!(f, "{}", e),
        }
    }
}

impl<E> std::error::Error for ResilienceError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResilienceError::RetryExhausted { last_error, .. } => Some(last_error.as_ref()),
            ResilienceError::Application(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> ResilienceError<ResilienceError<E>> {
    /// Collapses a pattern error wrapped around an already unified error.
    ///
    /// Stacking one pattern around a call that returns `ResilienceError<E>`
    /// yields `ResilienceError<ResilienceError<E>>`; the inner error replaces
    /// `Application`, and `RetryExhausted` is flattened recursively.
    ///
    /// ```
    /// use bulwark_core::ResilienceError;
    ///
    /// let nested: ResilienceError<ResilienceError<&str>> =
    ///     ResilienceError::Application(ResilienceError::CircuitOpen { name: "db".into() });
    /// assert!(nested.flatten().is_circuit_open());
    /// ```
    pub fn flatten(self) -> ResilienceError<E> {
        match self {
            ResilienceError::Timeout { layer, after } => ResilienceError::Timeout { layer, after },
            ResilienceError::CircuitOpen { name } => ResilienceError::CircuitOpen { name },
            ResilienceError::BulkheadRejected {
                name,
                max_concurrent,
                queue_timed_out,
            } => ResilienceError::BulkheadRejected {
                name,
                max_concurrent,
                queue_timed_out,
            },
            ResilienceError::RateLimited { retry_after } => {
                ResilienceError::RateLimited { retry_after }
            }
            ResilienceError::RetryExhausted {
                attempts,
                last_error,
            } => ResilienceError::RetryExhausted {
                attempts,
                last_error: Box::new(last_error.flatten()),
            },
            ResilienceError::Application(inner) => inner,
        }
    }
}

impl<E> From<crate::TimeoutError> for ResilienceError<E> {
    fn from(err: crate::TimeoutError) -> Self {
        ResilienceError::Timeout {
            layer: err.layer,
            after: err.after,
        }
    }
}

impl<E> ResilienceError<E> {
    /// A timer won the race.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ResilienceError::Timeout { .. })
    }

    /// The breaker rejected the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    /// The bulkhead rejected the call.
    pub fn is_bulkhead_rejected(&self) -> bool {
        matches!(self, ResilienceError::BulkheadRejected { .. })
    }

    /// The rate limiter rejected the call.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ResilienceError::RateLimited { .. })
    }

    /// Retries ran out.
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, ResilienceError::RetryExhausted { .. })
    }

    /// The operation's own error.
    pub fn is_application(&self) -> bool {
        matches!(self, ResilienceError::Application(_))
    }

    /// True for rejections decided without running the operation.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ResilienceError::CircuitOpen { .. }
                | ResilienceError::BulkheadRejected { .. }
                | ResilienceError::RateLimited { .. }
        )
    }

    /// Takes the application error, if this is `Application`.
    pub fn application_error(self) -> Option<E> {
        match self {
            ResilienceError::Application(e) => Some(e),
            _ => None,
        }
    }

    /// The innermost error, looking through `RetryExhausted`.
    pub fn root(&self) -> &ResilienceError<E> {
        match self {
            ResilienceError::RetryExhausted { last_error, .. } => last_error.root(),
            other => other,
        }
    }

    /// Maps the application error, preserving every other variant.
    ///
    /// ```
    /// use bulwark_core::ResilienceError;
    ///
    /// let err: ResilienceError<String> = ResilienceError::Application("nope".into());
    /// let mapped = err.map_application(|s| s.len());
    /// assert_eq!(mapped.application_error(), Some(4));
    /// ```
    pub fn map_application<F, T>(self, f: F) -> ResilienceError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            ResilienceError::Timeout { layer, after } => ResilienceError::Timeout { layer, after },
            ResilienceError::CircuitOpen { name } => ResilienceError::CircuitOpen { name },
            ResilienceError::BulkheadRejected {
                name,
                max_concurrent,
                queue_timed_out,
            } => ResilienceError::BulkheadRejected {
                name,
                max_concurrent,
                queue_timed_out,
            },
            ResilienceError::RateLimited { retry_after } => {
                ResilienceError::RateLimited { retry_after }
            }
            ResilienceError::RetryExhausted {
                attempts,
                last_error,
            } => ResilienceError::RetryExhausted {
                attempts,
                last_error: Box::new(last_error.map_application(f)),
            },
            ResilienceError::Application(e) => ResilienceError::Application(f(e)),
        }
    }
}
