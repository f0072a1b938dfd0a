use bulwark_core::events::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by a retry executor.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// A retry is about to wait `delay` and run again.
    Retry {
        pattern_name: String,
        timestamp: Instant,
        /// Retry number, starting at 1 for the first retry.
        attempt: usize,
        delay: Duration,
    },
    /// The operation succeeded, on the first attempt or after retries.
    Success {
        pattern_name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// Every attempt failed.
    Exhausted {
        pattern_name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// An error was returned without retrying because the predicate
    /// rejected it.
    IgnoredError {
        pattern_name: String,
        timestamp: Instant,
        attempts: usize,
    },
}

impl ResilienceEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "retry",
            RetryEvent::Success { .. } => "success",
            RetryEvent::Exhausted { .. } => "exhausted",
            RetryEvent::IgnoredError { .. } => "ignored_error",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. }
            | RetryEvent::IgnoredError { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            RetryEvent::Retry { pattern_name, .. }
            | RetryEvent::Success { pattern_name, .. }
            | RetryEvent::Exhausted { pattern_name, .. }
            | RetryEvent::IgnoredError { pattern_name, .. } => pattern_name,
        }
    }
}
