use bulwark_core::ResilienceError;

/// Errors returned by a retried call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error.
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    Exhausted {
        /// Attempts made, including the first.
        attempts: usize,
        /// The error from the final attempt.
        last_error: E,
    },

    /// An attempt failed with an error the retry predicate rejected.
    #[error("non-retryable error: {0}")]
    NonRetryable(E),
}

impl<E> RetryError<E> {
    /// Returns true if every attempt was used.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// The underlying operation error.
    pub fn last_error(&self) -> &E {
        match self {
            RetryError::Exhausted { last_error, .. } => last_error,
            RetryError::NonRetryable(e) => e,
        }
    }

    /// Consumes the error, returning the underlying operation error.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last_error, .. } => last_error,
            RetryError::NonRetryable(e) => e,
        }
    }
}

impl<E> From<RetryError<E>> for ResilienceError<E> {
    fn from(err: RetryError<E>) -> Self {
        match err {
            RetryError::Exhausted {
                attempts,
                last_error,
            } => ResilienceError::RetryExhausted {
                attempts,
                last_error: Box::new(ResilienceError::Application(last_error)),
            },
            RetryError::NonRetryable(e) => ResilienceError::Application(e),
        }
    }
}
