//! Named health checks and their results.

use bulwark_core::{HealthReporter, HealthStatus};
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

type CheckFn = Arc<dyn Fn() -> BoxFuture<'static, HealthStatus> + Send + Sync>;

/// A named check registered with a [`HealthMonitor`](crate::HealthMonitor).
///
/// Each run is raced against `timeout`; a timeout or a panic counts as
/// unhealthy.
///
/// # Examples
///
/// ```rust
/// use bulwark_healthcheck::HealthCheck;
/// use std::time::Duration;
///
/// let check = HealthCheck::new("database", || async {
///     // ping the database
///     true
/// })
/// .critical(true)
/// .timeout(Duration::from_secs(1))
/// .interval(Duration::from_secs(10));
///
/// assert!(check.is_critical());
/// ```
#[derive(Clone)]
pub struct HealthCheck {
    pub(crate) name: String,
    check: CheckFn,
    pub(crate) timeout: Duration,
    pub(crate) critical: bool,
    pub(crate) interval: Duration,
}

impl HealthCheck {
    /// A check whose function reports healthy (`true`) or unhealthy.
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self::from_fn(
            name.into(),
            Arc::new(move || f().map(HealthStatus::from).boxed()),
        )
    }

    /// A check whose function reports a full [`HealthStatus`].
    pub fn with_status<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HealthStatus> + Send + 'static,
    {
        Self::from_fn(name.into(), Arc::new(move || f().boxed()))
    }

    /// A check that samples a component's own health, such as a circuit
    /// breaker, bulkhead or rate limiter.
    ///
    /// ```rust
    /// use bulwark_core::{HealthReporter, HealthStatus};
    /// use bulwark_healthcheck::HealthCheck;
    ///
    /// struct Pool;
    ///
    /// impl HealthReporter for Pool {
    ///     fn health_status(&self) -> HealthStatus {
    ///         HealthStatus::Degraded
    ///     }
    /// }
    ///
    /// let check = HealthCheck::reporter("pool", Pool);
    /// # let _ = check;
    /// ```
    pub fn reporter<R>(name: impl Into<String>, reporter: R) -> Self
    where
        R: HealthReporter + 'static,
    {
        Self::from_fn(
            name.into(),
            Arc::new(move || futures::future::ready(reporter.health_status()).boxed()),
        )
    }

    fn from_fn(name: String, check: CheckFn) -> Self {
        Self {
            name,
            check,
            timeout: Duration::from_secs(5),
            critical: false,
            interval: Duration::from_secs(10),
        }
    }

    /// How long one run may take before it counts as unhealthy.
    ///
    /// Default: 5 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether an unhealthy result makes the whole monitor unhealthy.
    ///
    /// Default: false (an unhealthy non-critical check only degrades)
    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    /// Time between runs while the monitor is started. Zero is raised to one
    /// millisecond.
    ///
    /// Default: 10 seconds
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    /// Runs the check once.
    pub async fn run(&self) -> HealthCheckResult {
        let start = Instant::now();
        let check = Arc::clone(&self.check);
        let probe = AssertUnwindSafe(async move { check().await }).catch_unwind();

        let (status, message) = match bulwark_core::timeout("health_check", self.timeout, probe).await
        {
            Ok(Ok(status)) => (status, None),
            Ok(Err(_)) => (HealthStatus::Unhealthy, Some("check panicked".to_string())),
            Err(timed_out) => (HealthStatus::Unhealthy, Some(timed_out.to_string())),
        };

        HealthCheckResult {
            name: self.name.clone(),
            status,
            timestamp: SystemTime::now(),
            duration: start.elapsed(),
            critical: self.critical,
            message,
        }
    }
}

impl fmt::Debug for HealthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthCheck")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("critical", &self.critical)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// Outcome of one run of a [`HealthCheck`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HealthCheckResult {
    pub name: String,
    pub status: HealthStatus,
    /// When the run finished.
    pub timestamp: SystemTime,
    /// How long the run took.
    pub duration: Duration,
    pub critical: bool,
    /// Why the run failed, for timeouts and panics.
    pub message: Option<String>,
}

impl HealthCheckResult {
    /// Duration in whole milliseconds.
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }
}

/// The combined health of every check that has produced a result.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AggregatedHealth {
    pub status: HealthStatus,
    /// Latest result of each check, ordered by name.
    pub checks: Vec<HealthCheckResult>,
    pub timestamp: SystemTime,
    /// Time since the monitor was created.
    pub uptime: Duration,
}

/// Combines check results into one status.
///
/// Unhealthy if any critical check is unhealthy; degraded if any non-critical
/// check is unhealthy or any check is degraded; otherwise healthy. No results
/// is healthy.
pub fn aggregate<'a, I>(results: I) -> HealthStatus
where
    I: IntoIterator<Item = &'a HealthCheckResult>,
{
    results
        .into_iter()
        .map(|result| match result.status {
            HealthStatus::Unhealthy if !result.critical => HealthStatus::Degraded,
            status => status,
        })
        .max()
        .unwrap_or(HealthStatus::Healthy)
}
