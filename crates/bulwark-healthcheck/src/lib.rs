//! Background health monitoring.
//!
//! A [`HealthMonitor`] holds named [`HealthCheck`]s and polls each one on its
//! own interval. Each run races the check against a timeout; a timeout or a
//! panic counts as unhealthy. The latest results are combined into one
//! status:
//!
//! - **Unhealthy** if any critical check is unhealthy
//! - **Degraded** if any non-critical check is unhealthy, or any check is
//!   degraded
//! - **Healthy** otherwise, including when no check has reported yet
//!
//! Checks can be async functions returning `bool` or [`HealthStatus`], or any
//! [`HealthReporter`](bulwark_core::HealthReporter) such as a circuit breaker
//! or bulkhead.
//!
//! ```rust,no_run
//! use bulwark_healthcheck::{HealthCheck, HealthMonitor};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let monitor = HealthMonitor::builder()
//!     .name("api")
//!     .check(
//!         HealthCheck::new("database", || async { true })
//!             .critical(true)
//!             .interval(Duration::from_secs(5)),
//!     )
//!     .on_status_change(|from, to| eprintln!("health {from} -> {to}"))
//!     .build();
//!
//! monitor.start().await;
//! let health = monitor.get_health().await;
//! println!("{} ({} checks)", health.status, health.checks.len());
//! monitor.stop().await;
//! # }
//! ```

mod check;
mod events;
mod monitor;

pub use bulwark_core::HealthStatus;
pub use check::{aggregate, AggregatedHealth, HealthCheck, HealthCheckResult};
pub use events::HealthEvent;
pub use monitor::{HealthMonitor, HealthMonitorBuilder};
