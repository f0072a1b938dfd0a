//! Events emitted by the bulkhead.

use bulwark_core::events::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by a bulkhead.
#[derive(Debug, Clone)]
pub enum BulkheadEvent {
    /// A call obtained a slot.
    CallPermitted {
        pattern_name: String,
        timestamp: Instant,
        /// Running calls including this one.
        concurrent_calls: usize,
    },
    /// A call found every slot busy and joined the queue.
    CallQueued {
        pattern_name: String,
        timestamp: Instant,
        /// Queued calls including this one.
        queued_calls: usize,
    },
    /// A call was rejected without running.
    CallRejected {
        pattern_name: String,
        timestamp: Instant,
        max_concurrent_calls: usize,
        /// `true` if the call gave up after waiting in the queue.
        queue_timed_out: bool,
    },
    /// A call completed successfully.
    CallFinished {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
    /// A call completed with an error.
    CallFailed {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
}

impl ResilienceEvent for BulkheadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BulkheadEvent::CallPermitted { .. } => "call_permitted",
            BulkheadEvent::CallQueued { .. } => "call_queued",
            BulkheadEvent::CallRejected { .. } => "call_rejected",
            BulkheadEvent::CallFinished { .. } => "call_finished",
            BulkheadEvent::CallFailed { .. } => "call_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BulkheadEvent::CallPermitted { timestamp, .. }
            | BulkheadEvent::CallQueued { timestamp, .. }
            | BulkheadEvent::CallRejected { timestamp, .. }
            | BulkheadEvent::CallFinished { timestamp, .. }
            | BulkheadEvent::CallFailed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            BulkheadEvent::CallPermitted { pattern_name, .. }
            | BulkheadEvent::CallQueued { pattern_name, .. }
            | BulkheadEvent::CallRejected { pattern_name, .. }
            | BulkheadEvent::CallFinished { pattern_name, .. }
            | BulkheadEvent::CallFailed { pattern_name, .. } => pattern_name,
        }
    }
}
