//! Events emitted by the health monitor.

use crate::HealthCheckResult;
use bulwark_core::{HealthStatus, ResilienceEvent};
use std::time::Instant;

#[derive(Debug, Clone)]
pub enum HealthEvent {
    /// The aggregate status moved.
    StatusChanged {
        pattern_name: String,
        timestamp: Instant,
        from: HealthStatus,
        to: HealthStatus,
    },

    /// A check run reported unhealthy, timed out or panicked.
    CheckFailed {
        pattern_name: String,
        timestamp: Instant,
        result: HealthCheckResult,
    },
}

impl ResilienceEvent for HealthEvent {
    fn event_type(&self) -> &'static str {
        match self {
            HealthEvent::StatusChanged { .. } => "status_changed",
            HealthEvent::CheckFailed { .. } => "check_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            HealthEvent::StatusChanged { timestamp, .. }
            | HealthEvent::CheckFailed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            HealthEvent::StatusChanged { pattern_name, .. }
            | HealthEvent::CheckFailed { pattern_name, .. } => pattern_name,
        }
    }
}
