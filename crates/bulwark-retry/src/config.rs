use crate::backoff::{Backoff, BackoffPolicy};
use crate::events::RetryEvent;
use crate::Retry;
use bulwark_core::events::{EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

pub(crate) type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Configuration for retrying an operation that fails with `E`.
pub struct RetryConfig<E> {
    pub(crate) max_attempts: usize,
    pub(crate) policy: BackoffPolicy,
    pub(crate) retry_on: Option<RetryPredicate<E>>,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) name: String,
}

impl<E> RetryConfig<E> {
    /// Creates a new configuration builder.
    pub fn builder() -> RetryConfigBuilder<E> {
        RetryConfigBuilder::new()
    }

    /// Maximum attempts, including the first.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// The delay schedule.
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// The name used in events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn should_retry(&self, error: &E) -> bool {
        self.retry_on.as_ref().map_or(true, |retry_on| retry_on(error))
    }
}

impl<E> std::fmt::Debug for RetryConfig<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryConfig")
            .field("name", &self.name)
            .field("max_attempts", &self.max_attempts)
            .field("policy", &self.policy)
            .field("retry_on", &self.retry_on.as_ref().map(|_| "<predicate>"))
            .finish()
    }
}

/// Builder for [`RetryConfig`].
pub struct RetryConfigBuilder<E> {
    max_attempts: usize,
    policy: BackoffPolicy,
    retry_on: Option<RetryPredicate<E>>,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
}

impl<E> Default for RetryConfigBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> RetryConfigBuilder<E> {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - max_attempts: 3
    /// - backoff: exponential, 100ms initial delay, factor 2, capped at 30s
    /// - jitter: none
    /// - retry_on: every error
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            policy: BackoffPolicy::default(),
            retry_on: None,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets the maximum number of attempts.
    ///
    /// This includes the initial attempt, so max_attempts=3 means
    /// 1 initial attempt + 2 retries. Values below 1 are raised to 1.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets how the delay grows between retries.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.policy.backoff = backoff;
        self
    }

    /// Every retry waits `delay`.
    pub fn constant_backoff(self, delay: Duration) -> Self {
        self.backoff(Backoff::Constant).initial_delay(delay)
    }

    /// The n-th retry waits `initial * n`.
    pub fn linear_backoff(self, initial: Duration) -> Self {
        self.backoff(Backoff::Linear).initial_delay(initial)
    }

    /// The n-th retry waits `initial * factor^(n-1)`.
    pub fn exponential_backoff(self, initial: Duration) -> Self {
        self.backoff(Backoff::Exponential).initial_delay(initial)
    }

    /// Sets the delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    /// Caps every delay, before and after jitter.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Growth factor for exponential backoff. Values below 1 (and NaN) are
    /// raised to 1.
    pub fn factor(mut self, factor: f64) -> Self {
        self.policy.factor = if factor >= 1.0 { factor } else { 1.0 };
        self
    }

    /// Spreads each delay uniformly over `delay ± jitter * delay`.
    ///
    /// Clamped to `[0, 1]`.
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.policy.jitter = if jitter.is_nan() { 0.0 } else { jitter.clamp(0.0, 1.0) };
        self
    }

    /// Sets a predicate to determine which errors should be retried.
    ///
    /// Errors it rejects are returned at once as
    /// [`RetryError::NonRetryable`](crate::RetryError::NonRetryable).
    ///
    /// ```rust
    /// use bulwark_retry::Retry;
    /// use std::io::{Error, ErrorKind};
    ///
    /// let retry = Retry::<Error>::builder()
    ///     .max_attempts(3)
    ///     .retry_on(|err| {
    ///         matches!(err.kind(), ErrorKind::ConnectionRefused | ErrorKind::TimedOut)
    ///     })
    ///     .build();
    /// # let _ = retry;
    /// ```
    pub fn retry_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_on = Some(Arc::new(predicate));
        self
    }

    /// Sets the name for this retry instance (used in events).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a retry is about to be made.
    ///
    /// Called after a failed attempt and before the delay begins, with the
    /// retry number (1 = first retry) and the delay.
    ///
    /// ```rust
    /// use bulwark_retry::Retry;
    /// use std::time::Duration;
    ///
    /// let retry = Retry::<std::io::Error>::builder()
    ///     .max_attempts(5)
    ///     .exponential_backoff(Duration::from_millis(100))
    ///     .on_retry(|attempt, delay| {
    ///         println!("retry {} after {:?}", attempt, delay);
    ///     })
    ///     .build();
    /// # let _ = retry;
    /// ```
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback when the operation succeeds, with the total
    /// number of attempts made.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Success { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback when every attempt has failed.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Exhausted { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback when an error is returned without retrying.
    pub fn on_ignored_error<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, RetryEvent::IgnoredError { .. }) {
                f();
            }
        }));
        self
    }

    /// Builds the configuration without constructing an executor.
    pub fn build_config(self) -> RetryConfig<E> {
        RetryConfig {
            max_attempts: self.max_attempts,
            policy: self.policy,
            retry_on: self.retry_on,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the retry executor.
    pub fn build(self) -> Retry<E> {
        Retry::new(self.build_config())
    }
}
