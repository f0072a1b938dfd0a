//! Event system backing the hooks of every pattern.
//!
//! Each pattern defines its own event enum implementing [`ResilienceEvent`].
//! Builder methods such as `on_state_change` or `on_retry` register a
//! [`FnListener`] that filters for the variant it cares about, so a
//! configuration carries one [`EventListeners`] collection regardless of how
//! many hooks were registered.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// An event emitted by a pattern instance.
pub trait ResilienceEvent: Send + Sync + fmt::Debug {
    /// Short machine-readable kind, e.g. `"state_transition"`.
    fn event_type(&self) -> &'static str;

    /// When the event was produced.
    fn timestamp(&self) -> Instant;

    /// Name of the breaker, limiter, bulkhead... that produced the event.
    fn pattern_name(&self) -> &str;
}

/// Receives events of type `E`.
pub trait EventListener<E: ResilienceEvent>: Send + Sync {
    /// Called synchronously by the emitting pattern.
    fn on_event(&self, event: &E);
}

/// Shared handle to a listener.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// An ordered set of listeners for one event type.
///
/// Cloning is cheap and yields an independent collection that shares the
/// listener instances.
#[derive(Clone)]
pub struct EventListeners<E: ResilienceEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: ResilienceEvent> EventListeners<E> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Registers a listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Registers a closure as a listener.
    pub fn add_fn<F>(&mut self, f: F)
    where
        E: 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.add(FnListener::new(f));
    }

    /// Delivers `event` to every listener in registration order.
    ///
    /// A panicking listener is isolated: the panic is caught and the
    /// remaining listeners still run. Hooks never unwind into the guarded
    /// call path.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let delivered = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));

            #[cfg(feature = "tracing")]
            if delivered.is_err() {
                tracing::warn!(
                    pattern = event.pattern_name(),
                    event = event.event_type(),
                    "event listener panicked"
                );
            }
            #[cfg(not(feature = "tracing"))]
            let _ = delivered;
        }
    }

    /// Returns true when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ResilienceEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _event: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _event: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: ResilienceEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
