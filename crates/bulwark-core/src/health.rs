//! Health signals that pattern instances expose to the health monitor.

use std::sync::Arc;

/// Coarse health of a monitored component.
///
/// Ordered by severity, so `max()` over a set of statuses yields the worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Working, but with reduced capacity or recovering.
    Degraded,
    /// Not usable.
    Unhealthy,
}

impl HealthStatus {
    /// Healthy or degraded.
    pub fn is_usable(&self) -> bool {
        !matches!(self, HealthStatus::Unhealthy)
    }

    /// Strictly healthy.
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Lowercase label, as used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl From<bool> for HealthStatus {
    fn from(healthy: bool) -> Self {
        if healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A component that can report its own health synchronously.
///
/// Implemented by the circuit breaker, bulkhead and rate limiter so that a
/// health monitor can sample them without knowing their internals.
/// Implementations read in-memory state only and must not block.
pub trait HealthReporter: Send + Sync {
    /// Current health derived from internal state.
    fn health_status(&self) -> HealthStatus;
}

impl<T: HealthReporter + ?Sized> HealthReporter for Arc<T> {
    fn health_status(&self) -> HealthStatus {
        (**self).health_status()
    }
}

impl<T: HealthReporter + ?Sized> HealthReporter for &T {
    fn health_status(&self) -> HealthStatus {
        (**self).health_status()
    }
}
