use bulwark_core::events::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by a rate limiter.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A call was admitted.
    PermitAcquired {
        pattern_name: String,
        timestamp: Instant,
        /// How long the caller waited for admission.
        wait_duration: Duration,
    },
    /// A call was rejected.
    PermitRejected {
        pattern_name: String,
        timestamp: Instant,
        /// Time until the next admission could succeed.
        retry_after: Duration,
    },
}

impl ResilienceEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::PermitAcquired { .. } => "permit_acquired",
            RateLimiterEvent::PermitRejected { .. } => "permit_rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::PermitAcquired { timestamp, .. }
            | RateLimiterEvent::PermitRejected { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            RateLimiterEvent::PermitAcquired { pattern_name, .. }
            | RateLimiterEvent::PermitRejected { pattern_name, .. } => pattern_name,
        }
    }
}
