use crate::events::RateLimiterEvent;
use crate::strategy::RateLimitStrategy;
use crate::RateLimiter;
use bulwark_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a rate limiter.
pub struct RateLimiterConfig {
    pub(crate) strategy: RateLimitStrategy,
    pub(crate) max_requests: usize,
    pub(crate) window: Duration,
    pub(crate) timeout_duration: Duration,
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
    pub(crate) name: String,
}

impl RateLimiterConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }

    /// The counting strategy.
    pub fn strategy(&self) -> RateLimitStrategy {
        self.strategy
    }

    /// Admissions allowed per window.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// The window length.
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl std::fmt::Debug for RateLimiterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterConfig")
            .field("name", &self.name)
            .field("strategy", &self.strategy)
            .field("max_requests", &self.max_requests)
            .field("window", &self.window)
            .field("timeout_duration", &self.timeout_duration)
            .finish()
    }
}

/// Builder for [`RateLimiter`].
pub struct RateLimiterConfigBuilder {
    strategy: RateLimitStrategy,
    max_requests: usize,
    window: Duration,
    timeout_duration: Duration,
    event_listeners: EventListeners<RateLimiterEvent>,
    name: String,
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - strategy: sliding window
    /// - max_requests: 50
    /// - window: 1 second
    /// - timeout_duration: zero (reject immediately)
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            strategy: RateLimitStrategy::default(),
            max_requests: 50,
            window: Duration::from_secs(1),
            timeout_duration: Duration::ZERO,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Selects the counting strategy. Fixed for the limiter's lifetime.
    pub fn strategy(mut self, strategy: RateLimitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Shorthand for `strategy(RateLimitStrategy::FixedWindow)`.
    pub fn fixed_window(self) -> Self {
        self.strategy(RateLimitStrategy::FixedWindow)
    }

    /// Shorthand for `strategy(RateLimitStrategy::SlidingWindow)`.
    pub fn sliding_window(self) -> Self {
        self.strategy(RateLimitStrategy::SlidingWindow)
    }

    /// Shorthand for `strategy(RateLimitStrategy::TokenBucket)`.
    pub fn token_bucket(self) -> Self {
        self.strategy(RateLimitStrategy::TokenBucket)
    }

    /// Admissions allowed per window (the bucket capacity for the token
    /// bucket). Values below 1 are raised to 1.
    pub fn max_requests(mut self, limit: usize) -> Self {
        self.max_requests = limit.max(1);
        self
    }

    /// The counting window. A zero window is raised to one millisecond.
    pub fn window(mut self, duration: Duration) -> Self {
        self.window = duration.max(Duration::from_millis(1));
        self
    }

    /// How long [`RateLimiter::acquire`] may wait for admission before
    /// rejecting.
    ///
    /// If the reported wait would overrun this budget the call is rejected
    /// at once instead of sleeping.
    pub fn timeout_duration(mut self, duration: Duration) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Sets the name for this rate limiter instance (used in events).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a call is admitted, with how long it waited.
    ///
    /// ```rust
    /// use bulwark_ratelimiter::RateLimiter;
    /// use std::time::Duration;
    ///
    /// let limiter = RateLimiter::builder()
    ///     .max_requests(100)
    ///     .on_permit_acquired(|waited| {
    ///         if waited > Duration::ZERO {
    ///             println!("admitted after {:?}", waited);
    ///         }
    ///     })
    ///     .build();
    /// # let _ = limiter;
    /// ```
    pub fn on_permit_acquired<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::PermitAcquired { wait_duration, .. } = event {
                f(*wait_duration);
            }
        }));
        self
    }

    /// Registers a callback when a call is rejected, with the time until the
    /// next admission could succeed.
    pub fn on_permit_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::PermitRejected { retry_after, .. } = event {
                f(*retry_after);
            }
        }));
        self
    }

    /// Builds the configuration without constructing a limiter.
    pub fn build_config(self) -> RateLimiterConfig {
        RateLimiterConfig {
            strategy: self.strategy,
            max_requests: self.max_requests,
            window: self.window,
            timeout_duration: self.timeout_duration,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the rate limiter.
    pub fn build(self) -> RateLimiter {
        RateLimiter::new(self.build_config())
    }
}
