use crate::classifier::{DefaultClassifier, FnClassifier};
use crate::events::CircuitBreakerEvent;
use crate::{CircuitBreaker, CircuitState};
use bulwark_core::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a circuit breaker.
///
/// Immutable once built. `C` is the [trip classifier](crate::classifier).
pub struct CircuitBreakerConfig<C = DefaultClassifier> {
    pub(crate) name: String,
    pub(crate) failure_threshold: usize,
    pub(crate) success_threshold: usize,
    pub(crate) timeout: Duration,
    pub(crate) reset_timeout: Option<Duration>,
    pub(crate) permitted_calls_in_half_open: usize,
    pub(crate) tracking_window: Option<Duration>,
    pub(crate) classifier: C,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfig<DefaultClassifier> {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder<DefaultClassifier> {
        CircuitBreakerConfigBuilder::new()
    }
}

impl<C> CircuitBreakerConfig<C> {
    /// How long the circuit stays open before admitting a probe.
    pub(crate) fn open_duration(&self) -> Duration {
        self.reset_timeout.unwrap_or(self.timeout)
    }

    /// Breaker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Consecutive tripping failures that open the circuit.
    pub fn failure_threshold(&self) -> usize {
        self.failure_threshold
    }

    /// Consecutive probe successes that close the circuit.
    pub fn success_threshold(&self) -> usize {
        self.success_threshold
    }
}

impl<C> std::fmt::Debug for CircuitBreakerConfig<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("name", &self.name)
            .field("failure_threshold", &self.failure_threshold)
            .field("success_threshold", &self.success_threshold)
            .field("timeout", &self.timeout)
            .field("reset_timeout", &self.reset_timeout)
            .field("permitted_calls_in_half_open", &self.permitted_calls_in_half_open)
            .field("tracking_window", &self.tracking_window)
            .field("event_listeners", &self.event_listeners)
            .finish()
    }
}

/// Builder for a [`CircuitBreaker`].
pub struct CircuitBreakerConfigBuilder<C = DefaultClassifier> {
    name: String,
    failure_threshold: usize,
    success_threshold: usize,
    timeout: Duration,
    reset_timeout: Option<Duration>,
    permitted_calls_in_half_open: usize,
    tracking_window: Option<Duration>,
    classifier: C,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfigBuilder<DefaultClassifier> {
    /// Creates a builder with default values.
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            failure_threshold: 5,
            success_threshold: 1,
            timeout: Duration::from_secs(30),
            reset_timeout: None,
            permitted_calls_in_half_open: 1,
            tracking_window: None,
            classifier: DefaultClassifier,
            event_listeners: EventListeners::new(),
        }
    }

    /// Preset: balanced settings for most dependencies.
    ///
    /// - 5 consecutive failures open the circuit
    /// - 2 probe successes close it
    /// - 30 second open period
    ///
    /// ```
    /// use bulwark_circuitbreaker::CircuitBreakerConfigBuilder;
    ///
    /// let breaker = CircuitBreakerConfigBuilder::standard()
    ///     .name("inventory")
    ///     .build();
    /// assert_eq!(breaker.name(), "inventory");
    /// ```
    pub fn standard() -> Self {
        Self::new()
            .failure_threshold(5)
            .success_threshold(2)
            .timeout(Duration::from_secs(30))
    }

    /// Preset: open early and probe soon, for latency-sensitive paths.
    ///
    /// - 3 consecutive failures open the circuit
    /// - 1 probe success closes it
    /// - 10 second open period
    pub fn fast_fail() -> Self {
        Self::new()
            .failure_threshold(3)
            .success_threshold(1)
            .timeout(Duration::from_secs(10))
    }

    /// Preset: ride out transient trouble before opening.
    ///
    /// - 10 consecutive failures open the circuit
    /// - 3 probe successes close it
    /// - 60 second open period
    pub fn tolerant() -> Self {
        Self::new()
            .failure_threshold(10)
            .success_threshold(3)
            .timeout(Duration::from_secs(60))
    }

    /// Restricts which errors trip the breaker.
    ///
    /// Errors for which `f` returns `false` are returned to the caller but
    /// count neither as failures nor as successes.
    ///
    /// Default: every error trips
    pub fn should_trip<F, E>(self, f: F) -> CircuitBreakerConfigBuilder<FnClassifier<F>>
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        CircuitBreakerConfigBuilder {
            name: self.name,
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            timeout: self.timeout,
            reset_timeout: self.reset_timeout,
            permitted_calls_in_half_open: self.permitted_calls_in_half_open,
            tracking_window: self.tracking_window,
            classifier: FnClassifier::new(f),
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for CircuitBreakerConfigBuilder<DefaultClassifier> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CircuitBreakerConfigBuilder<C> {
    /// Give this breaker a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Consecutive tripping failures that open the circuit. Values below 1
    /// are raised to 1.
    ///
    /// Default: 5
    pub fn failure_threshold(mut self, n: usize) -> Self {
        self.failure_threshold = n.max(1);
        self
    }

    /// Consecutive half-open successes that close the circuit. Values below
    /// 1 are raised to 1.
    ///
    /// Default: 1
    pub fn success_threshold(mut self, n: usize) -> Self {
        self.success_threshold = n.max(1);
        self
    }

    /// How long the circuit stays open after the last failure.
    ///
    /// Default: 30 seconds
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    /// Overrides `timeout` as the open period when set.
    ///
    /// Default: None
    pub fn reset_timeout(mut self, duration: Duration) -> Self {
        self.reset_timeout = Some(duration);
        self
    }

    /// Maximum concurrent probes while half-open. Values below 1 are raised
    /// to 1.
    ///
    /// Default: 1
    pub fn permitted_calls_in_half_open(mut self, n: usize) -> Self {
        self.permitted_calls_in_half_open = n.max(1);
        self
    }

    /// Forget failures older than `window` when counting toward the
    /// threshold.
    ///
    /// Default: None (failures count until a success resets them)
    pub fn tracking_window(mut self, window: Duration) -> Self {
        self.tracking_window = Some(window);
        self
    }

    /// Registers a callback for state transitions, called with `(from, to)`.
    ///
    /// ```rust
    /// use bulwark_circuitbreaker::{CircuitBreakerConfig, CircuitState};
    ///
    /// let breaker = CircuitBreakerConfig::builder()
    ///     .on_state_change(|from, to| {
    ///         if to == CircuitState::Open {
    ///             eprintln!("breaker opened (was {:?})", from);
    ///         }
    ///     })
    ///     .build();
    /// # let _ = breaker;
    /// ```
    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Registers a callback for recorded successes, called with the state at
    /// the time of the call.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::SuccessRecorded { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a callback for recorded tripping failures.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::FailureRecorded { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a callback for calls rejected without being invoked.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                    f();
                }
            }));
        self
    }

    /// Builds the configuration without constructing a breaker.
    pub fn build_config(self) -> CircuitBreakerConfig<C> {
        CircuitBreakerConfig {
            name: self.name,
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            timeout: self.timeout,
            reset_timeout: self.reset_timeout,
            permitted_calls_in_half_open: self.permitted_calls_in_half_open,
            tracking_window: self.tracking_window,
            classifier: self.classifier,
            event_listeners: self.event_listeners,
        }
    }

    /// Builds a circuit breaker, starting closed.
    pub fn build(self) -> CircuitBreaker<C> {
        CircuitBreaker::new(self.build_config())
    }
}
