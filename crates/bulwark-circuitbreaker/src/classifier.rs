//! Deciding which errors count against the breaker.
//!
//! Errors the classifier rejects are returned to the caller unchanged but are
//! invisible to the state machine: they count neither as a failure nor as a
//! success.

use std::sync::Arc;

/// Decides whether an error should count as a breaker failure.
pub trait TripClassifier<E>: Send + Sync {
    /// Returns `true` if `error` counts toward opening the circuit.
    fn should_trip(&self, error: &E) -> bool;
}

/// Counts every error as a failure.
///
/// Implements [`TripClassifier<E>`] for every `E`, so a breaker built with it
/// can guard operations with any error type.
///
/// ```rust
/// use bulwark_circuitbreaker::classifier::{DefaultClassifier, TripClassifier};
///
/// assert!(TripClassifier::<std::io::Error>::should_trip(
///     &DefaultClassifier,
///     &std::io::Error::other("boom"),
/// ));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl<E> TripClassifier<E> for DefaultClassifier {
    fn should_trip(&self, _error: &E) -> bool {
        true
    }
}

/// A classifier backed by a closure.
///
/// ```rust
/// use bulwark_circuitbreaker::classifier::{FnClassifier, TripClassifier};
/// use std::io::{Error, ErrorKind};
///
/// // Client mistakes say nothing about the dependency's health.
/// let classifier = FnClassifier::new(|e: &Error| e.kind() != ErrorKind::InvalidInput);
///
/// assert!(!classifier.should_trip(&Error::new(ErrorKind::InvalidInput, "bad id")));
/// assert!(classifier.should_trip(&Error::new(ErrorKind::ConnectionRefused, "down")));
/// ```
#[derive(Clone)]
pub struct FnClassifier<F> {
    f: Arc<F>,
}

impl<F> FnClassifier<F> {
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F, E> TripClassifier<E> for FnClassifier<F>
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn should_trip(&self, error: &E) -> bool {
        (self.f)(error)
    }
}

impl<F> std::fmt::Debug for FnClassifier<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnClassifier")
            .field("f", &"<closure>")
            .finish()
    }
}
