use bulwark_core::ResilienceError;
use thiserror::Error;

/// Errors returned by [`CircuitBreaker::call`](crate::CircuitBreaker::call).
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the operation was not invoked.
    #[error("circuit breaker '{name}' is open; call not permitted")]
    OpenCircuit {
        /// Name of the breaker that rejected the call.
        name: String,
    },

    /// The operation ran and failed.
    #[error("inner error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the breaker rejected the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::OpenCircuit { .. })
    }

    /// Returns the operation's error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<CircuitBreakerError<E>> for ResilienceError<E> {
    fn from(err: CircuitBreakerError<E>) -> Self {
        match err {
            CircuitBreakerError::OpenCircuit { name } => ResilienceError::CircuitOpen { name },
            CircuitBreakerError::Inner(e) => ResilienceError::Application(e),
        }
    }
}
