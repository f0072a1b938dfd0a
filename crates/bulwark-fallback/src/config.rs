//! Configuration for the fallback executor.

use crate::events::FallbackEvent;
use crate::Fallback;
use bulwark_core::{EventListeners, FnListener};
use std::sync::Arc;

/// Predicate to determine if an error should trigger the fallback.
pub type HandlePredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Configuration for a [`Fallback`] executor.
pub struct FallbackConfig<E> {
    pub(crate) name: String,
    pub(crate) handle: Option<HandlePredicate<E>>,
    pub(crate) event_listeners: EventListeners<FallbackEvent>,
}

impl<E> FallbackConfig<E> {
    /// Creates a new configuration builder.
    pub fn builder() -> FallbackConfigBuilder<E> {
        FallbackConfigBuilder::new()
    }

    pub(crate) fn handles(&self, error: &E) -> bool {
        self.handle.as_ref().map(|p| p(error)).unwrap_or(true)
    }
}

/// Builder for [`FallbackConfig`].
pub struct FallbackConfigBuilder<E> {
    name: String,
    handle: Option<HandlePredicate<E>>,
    event_listeners: EventListeners<FallbackEvent>,
}

impl<E> Default for FallbackConfigBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> FallbackConfigBuilder<E> {
    /// Creates a new builder. Every error triggers the fallback by default.
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            handle: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the name for this fallback instance.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Only errors matching `predicate` trigger the fallback; others are
    /// returned as [`FallbackError::Inner`](crate::FallbackError::Inner).
    pub fn handle<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.handle = Some(Arc::new(predicate));
        self
    }

    /// Registers a callback for every fallback event.
    pub fn on_event<F>(mut self, listener: F) -> Self
    where
        F: Fn(&FallbackEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(listener));
        self
    }

    /// Registers a callback when the fallback replaced a failure.
    pub fn on_applied<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, FallbackEvent::Applied { .. }) {
                f();
            }
        }));
        self
    }

    /// Registers a callback when the fallback itself failed.
    pub fn on_failed<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, FallbackEvent::Failed { .. }) {
                f();
            }
        }));
        self
    }

    /// Builds the configuration without constructing an executor.
    pub fn build_config(self) -> FallbackConfig<E> {
        FallbackConfig {
            name: self.name,
            handle: self.handle,
            event_listeners: self.event_listeners,
        }
    }

    /// Builds the fallback executor.
    pub fn build(self) -> Fallback<E> {
        Fallback::new(self.build_config())
    }
}
