//! Background polling and aggregation of health checks.

use crate::check::{aggregate, AggregatedHealth, HealthCheck, HealthCheckResult};
use crate::events::HealthEvent;
use bulwark_core::{EventListeners, FnListener, HealthStatus};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::SystemTime;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[cfg(feature = "metrics")]
use metrics::{describe_gauge, gauge};
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Polls a set of named checks and aggregates their latest results.
///
/// Cloning is cheap; clones share checks, results and polling tasks. Polling
/// stops on [`stop`](Self::stop) or when the last clone is dropped.
///
/// ```rust
/// use bulwark_core::HealthStatus;
/// use bulwark_healthcheck::{HealthCheck, HealthMonitor};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let monitor = HealthMonitor::builder()
///     .name("api")
///     .check(HealthCheck::new("database", || async { true }).critical(true))
///     .check(HealthCheck::new("cache", || async { false }))
///     .build();
///
/// let health = monitor.check_now().await;
/// assert_eq!(health.status, HealthStatus::Degraded);
/// # }
/// ```
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    checks: RwLock<BTreeMap<String, Arc<HealthCheck>>>,
    state: RwLock<State>,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    running: AtomicBool,
    created_at: Instant,
    event_listeners: EventListeners<HealthEvent>,
}

struct State {
    results: BTreeMap<String, HealthCheckResult>,
    status: HealthStatus,
}

impl HealthMonitor {
    pub fn builder() -> HealthMonitorBuilder {
        HealthMonitorBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Spawns one polling task per registered check. Calling it again while
    /// running does nothing.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let checks = self.inner.checks.read().await;
        let mut tasks = self.inner.tasks.lock().await;
        for (name, check) in checks.iter() {
            // A concurrent add_check may already be polling this one.
            tasks
                .entry(name.clone())
                .or_insert_with(|| spawn_poller(&self.inner, Arc::clone(check)));
        }

        #[cfg(feature = "tracing")]
        tracing::info!(monitor = %self.inner.name, checks = checks.len(), "health monitor started");
    }

    /// Aborts every polling task. Latest results are kept.
    pub async fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        for (_, task) in self.inner.tasks.lock().await.drain() {
            task.abort();
        }

        #[cfg(feature = "tracing")]
        tracing::info!(monitor = %self.inner.name, "health monitor stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Registers `check`, replacing any check with the same name. Starts
    /// polling it right away when the monitor is running.
    pub async fn add_check(&self, check: HealthCheck) {
        let name = check.name.clone();
        let check = Arc::new(check);

        let mut checks = self.inner.checks.write().await;
        let replaced = checks.insert(name.clone(), Arc::clone(&check)).is_some();

        let change = if replaced {
            let mut state = self.inner.state.write().await;
            state.results.remove(&name);
            self.inner.refresh(&mut state)
        } else {
            None
        };

        let mut tasks = self.inner.tasks.lock().await;
        if let Some(old) = tasks.remove(&name) {
            old.abort();
        }
        if self.is_running() {
            tasks.insert(name, spawn_poller(&self.inner, check));
        }
        drop(tasks);
        drop(checks);

        if let Some(event) = change {
            self.inner.event_listeners.emit(&event);
        }
    }

    /// Unregisters the named check and forgets its latest result. Returns
    /// false when no such check exists.
    pub async fn remove_check(&self, name: &str) -> bool {
        let mut checks = self.inner.checks.write().await;
        if checks.remove(name).is_none() {
            return false;
        }

        let change = {
            let mut state = self.inner.state.write().await;
            state.results.remove(name);
            self.inner.refresh(&mut state)
        };

        if let Some(task) = self.inner.tasks.lock().await.remove(name) {
            task.abort();
        }
        drop(checks);

        #[cfg(feature = "metrics")]
        gauge!(
            "healthcheck_status",
            "monitor" => self.inner.name.clone(),
            "check" => name.to_string()
        )
        .set(0.0);

        if let Some(event) = change {
            self.inner.event_listeners.emit(&event);
        }
        true
    }

    /// Names of the registered checks, in order.
    pub async fn check_names(&self) -> Vec<String> {
        self.inner.checks.read().await.keys().cloned().collect()
    }

    /// Aggregated health from the latest result of each check. Checks that
    /// have not run yet are left out.
    pub async fn get_health(&self) -> AggregatedHealth {
        let state = self.inner.state.read().await;
        AggregatedHealth {
            status: aggregate(state.results.values()),
            checks: state.results.values().cloned().collect(),
            timestamp: SystemTime::now(),
            uptime: self.uptime(),
        }
    }

    /// The aggregate status alone.
    pub async fn status(&self) -> HealthStatus {
        self.inner.state.read().await.status
    }

    /// Latest result of the named check, if it has run.
    pub async fn result(&self, name: &str) -> Option<HealthCheckResult> {
        self.inner.state.read().await.results.get(name).cloned()
    }

    /// Runs every check once, concurrently, records the results and returns
    /// the new aggregate. Works whether or not the monitor is started.
    pub async fn check_now(&self) -> AggregatedHealth {
        let checks: Vec<Arc<HealthCheck>> =
            self.inner.checks.read().await.values().cloned().collect();

        let results = futures::future::join_all(checks.iter().map(|check| check.run())).await;
        for (check, result) in checks.iter().zip(results) {
            self.inner.record(check, result).await;
        }

        self.get_health().await
    }

    /// Time since the monitor was built.
    pub fn uptime(&self) -> std::time::Duration {
        self.inner.created_at.elapsed()
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("name", &self.inner.name)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn spawn_poller(inner: &Arc<Inner>, check: Arc<HealthCheck>) -> JoinHandle<()> {
    let inner = Arc::downgrade(inner);
    tokio::spawn(poll(inner, check))
}

async fn poll(inner: Weak<Inner>, check: Arc<HealthCheck>) {
    let mut ticker = tokio::time::interval(check.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let result = check.run().await;

        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner.record(&check, result).await;
    }
}

impl Inner {
    /// Stores a result if its check is still the registered one, and reports
    /// any change of the aggregate.
    async fn record(&self, check: &Arc<HealthCheck>, result: HealthCheckResult) {
        let checks = self.checks.read().await;
        let current = checks
            .get(&check.name)
            .is_some_and(|registered| Arc::ptr_eq(registered, check));
        if !current {
            return;
        }

        let failed = (result.status == HealthStatus::Unhealthy).then(|| result.clone());

        #[cfg(feature = "metrics")]
        gauge!(
            "healthcheck_status",
            "monitor" => self.name.clone(),
            "check" => result.name.clone()
        )
        .set(status_value(result.status));

        let change = {
            let mut state = self.state.write().await;
            state.results.insert(check.name.clone(), result);
            self.refresh(&mut state)
        };
        drop(checks);

        if let Some(result) = failed {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                monitor = %self.name,
                check = %result.name,
                critical = result.critical,
                message = result.message.as_deref().unwrap_or(""),
                "health check failed"
            );

            self.event_listeners.emit(&HealthEvent::CheckFailed {
                pattern_name: self.name.clone(),
                timestamp: std::time::Instant::now(),
                result,
            });
        }

        if let Some(event) = change {
            self.event_listeners.emit(&event);
        }
    }

    fn refresh(&self, state: &mut State) -> Option<HealthEvent> {
        let to = aggregate(state.results.values());
        let from = std::mem::replace(&mut state.status, to);
        if from == to {
            return None;
        }

        #[cfg(feature = "tracing")]
        tracing::info!(monitor = %self.name, %from, %to, "health status changed");

        Some(HealthEvent::StatusChanged {
            pattern_name: self.name.clone(),
            timestamp: std::time::Instant::now(),
            from,
            to,
        })
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for (_, task) in self.tasks.get_mut().drain() {
            task.abort();
        }
    }
}

#[cfg(feature = "metrics")]
fn status_value(status: HealthStatus) -> f64 {
    match status {
        HealthStatus::Healthy => 0.0,
        HealthStatus::Degraded => 1.0,
        HealthStatus::Unhealthy => 2.0,
    }
}

/// Builder for [`HealthMonitor`].
pub struct HealthMonitorBuilder {
    name: String,
    checks: Vec<HealthCheck>,
    event_listeners: EventListeners<HealthEvent>,
}

impl Default for HealthMonitorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthMonitorBuilder {
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            checks: Vec::new(),
            event_listeners: EventListeners::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a check. A later check with the same name replaces an
    /// earlier one.
    pub fn check(mut self, check: HealthCheck) -> Self {
        self.checks.push(check);
        self
    }

    /// Called with `(from, to)` whenever the aggregate status changes.
    pub fn on_status_change<F>(mut self, f: F) -> Self
    where
        F: Fn(HealthStatus, HealthStatus) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let HealthEvent::StatusChanged { from, to, .. } = event {
                f(*from, *to);
            }
        }));
        self
    }

    /// Called with every unhealthy check result.
    pub fn on_check_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&HealthCheckResult) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let HealthEvent::CheckFailed { result, .. } = event {
                f(result);
            }
        }));
        self
    }

    pub fn build(self) -> HealthMonitor {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_gauge!(
                "healthcheck_status",
                "Latest check status (0 = healthy, 1 = degraded, 2 = unhealthy)"
            );
        });

        let checks = self
            .checks
            .into_iter()
            .map(|check| (check.name.clone(), Arc::new(check)))
            .collect();

        HealthMonitor {
            inner: Arc::new(Inner {
                name: self.name,
                checks: RwLock::new(checks),
                state: RwLock::new(State {
                    results: BTreeMap::new(),
                    status: HealthStatus::Healthy,
                }),
                tasks: Mutex::new(HashMap::new()),
                running: AtomicBool::new(false),
                created_at: Instant::now(),
                event_listeners: self.event_listeners,
            }),
        }
    }
}
