//! Error types for the bulkhead.

use bulwark_core::ResilienceError;
use std::convert::Infallible;
use std::time::Duration;

/// Errors that can occur when calling through a bulkhead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BulkheadError<E = Infallible> {
    /// Every slot was busy and the wait queue was full.
    #[error("bulkhead '{name}' is full: {max_concurrent} running, {max_queue} queued")]
    Full {
        /// Bulkhead name.
        name: String,
        /// Maximum concurrent calls allowed.
        max_concurrent: usize,
        /// Maximum queued callers allowed.
        max_queue: usize,
    },

    /// The call waited in the queue longer than `queue_timeout`.
    #[error("bulkhead '{name}' queue wait timed out after {after:?}")]
    QueueTimeout {
        /// Bulkhead name.
        name: String,
        /// Maximum concurrent calls allowed.
        max_concurrent: usize,
        /// The queue timeout that elapsed.
        after: Duration,
    },

    /// The operation ran and failed.
    #[error("inner error: {0}")]
    Inner(E),
}

impl<E> BulkheadError<E> {
    /// Returns true if the bulkhead rejected the call, by either path.
    pub fn is_rejected(&self) -> bool {
        !matches!(self, BulkheadError::Inner(_))
    }

    /// Returns true if the call timed out while queued.
    pub fn is_queue_timeout(&self) -> bool {
        matches!(self, BulkheadError::QueueTimeout { .. })
    }

    /// Returns the operation's error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BulkheadError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl BulkheadError<Infallible> {
    /// Re-types a rejection for use with any operation error.
    pub fn widen<E>(self) -> BulkheadError<E> {
        match self {
            BulkheadError::Full {
                name,
                max_concurrent,
                max_queue,
            } => BulkheadError::Full {
                name,
                max_concurrent,
                max_queue,
            },
            BulkheadError::QueueTimeout {
                name,
                max_concurrent,
                after,
            } => BulkheadError::QueueTimeout {
                name,
                max_concurrent,
                after,
            },
            BulkheadError::Inner(never) => match never {},
        }
    }
}

impl<E> From<BulkheadError<E>> for ResilienceError<E> {
    fn from(err: BulkheadError<E>) -> Self {
        match err {
            BulkheadError::Full {
                name,
                max_concurrent,
                ..
            } => ResilienceError::BulkheadRejected {
                name,
                max_concurrent,
                queue_timed_out: false,
            },
            BulkheadError::QueueTimeout {
                name,
                max_concurrent,
                ..
            } => ResilienceError::BulkheadRejected {
                name,
                max_concurrent,
                queue_timed_out: true,
            },
            BulkheadError::Inner(e) => ResilienceError::Application(e),
        }
    }
}
