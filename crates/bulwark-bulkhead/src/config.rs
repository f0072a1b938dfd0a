//! Configuration for the bulkhead.

use crate::events::BulkheadEvent;
use crate::Bulkhead;
use bulwark_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a bulkhead.
pub struct BulkheadConfig {
    /// Maximum number of calls running at once.
    pub(crate) max_concurrent: usize,
    /// Maximum number of callers waiting for a slot.
    pub(crate) max_queue: usize,
    /// How long a queued caller waits before giving up. `None` waits forever.
    pub(crate) queue_timeout: Option<Duration>,
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<BulkheadEvent>,
}

impl BulkheadConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder::new()
    }

    /// Maximum number of calls running at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Maximum number of callers waiting for a slot.
    pub fn max_queue(&self) -> usize {
        self.max_queue
    }

    /// How long a queued caller waits before giving up.
    pub fn queue_timeout(&self) -> Option<Duration> {
        self.queue_timeout
    }
}

impl std::fmt::Debug for BulkheadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkheadConfig")
            .field("name", &self.name)
            .field("max_concurrent", &self.max_concurrent)
            .field("max_queue", &self.max_queue)
            .field("queue_timeout", &self.queue_timeout)
            .finish()
    }
}

/// Builder for [`Bulkhead`].
pub struct BulkheadConfigBuilder {
    max_concurrent: usize,
    max_queue: usize,
    queue_timeout: Option<Duration>,
    name: String,
    event_listeners: EventListeners<BulkheadEvent>,
}

impl BulkheadConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            max_concurrent: 25,
            max_queue: 0,
            queue_timeout: None,
            name: "<unnamed>".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the maximum number of concurrent calls.
    ///
    /// Values below 1 are raised to 1.
    /// Default: 25
    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Sets how many callers may wait for a slot once all are busy.
    ///
    /// Callers beyond this are rejected immediately.
    /// Default: 0 (no queue)
    pub fn max_queue(mut self, max: usize) -> Self {
        self.max_queue = max;
        self
    }

    /// Sets the longest a queued caller waits for a slot.
    ///
    /// Default: none, queued callers wait until a slot frees
    pub fn queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = Some(timeout);
        self
    }

    /// Sets the name of this bulkhead instance.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a call obtains a slot.
    ///
    /// Called with the number of running calls, including this one.
    ///
    /// ```rust
    /// use bulwark_bulkhead::Bulkhead;
    ///
    /// let bulkhead = Bulkhead::builder()
    ///     .max_concurrent(10)
    ///     .on_call_permitted(|concurrent| {
    ///         if concurrent >= 8 {
    ///             println!("approaching capacity: {concurrent}");
    ///         }
    ///     })
    ///     .build();
    /// # let _ = bulkhead;
    /// ```
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallPermitted {
                concurrent_calls, ..
            } = event
            {
                f(*concurrent_calls);
            }
        }));
        self
    }

    /// Registers a callback when a call joins the wait queue, with the
    /// queue length including it.
    pub fn on_call_queued<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallQueued { queued_calls, .. } = event {
                f(*queued_calls);
            }
        }));
        self
    }

    /// Registers a callback when a call is rejected.
    ///
    /// The flag is `true` when the call gave up after waiting in the queue,
    /// `false` when the queue was already full.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallRejected {
                queue_timed_out, ..
            } = event
            {
                f(*queue_timed_out);
            }
        }));
        self
    }

    /// Registers a callback when a call finishes successfully, with how long
    /// it held its slot.
    pub fn on_call_finished<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallFinished { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Registers a callback when a call fails with an error.
    pub fn on_call_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallFailed { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Builds the configuration without constructing a bulkhead.
    pub fn build_config(self) -> BulkheadConfig {
        BulkheadConfig {
            max_concurrent: self.max_concurrent,
            max_queue: self.max_queue,
            queue_timeout: self.queue_timeout,
            name: self.name,
            event_listeners: self.event_listeners,
        }
    }

    /// Builds the bulkhead.
    pub fn build(self) -> Bulkhead {
        Bulkhead::new(self.build_config())
    }
}

impl Default for BulkheadConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
