use bulwark_core::ResilienceError;
use std::convert::Infallible;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when using the rate limiter.
///
/// `E` is the guarded operation's error; [`RateLimiter::acquire`] uses the
/// default `Infallible` since it runs no operation.
///
/// [`RateLimiter::acquire`]: crate::RateLimiter::acquire
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimiterError<E = Infallible> {
    /// No admission was possible within the configured wait budget.
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimitExceeded {
        /// Time until the next admission could succeed.
        retry_after: Duration,
    },

    /// The operation ran and failed.
    #[error("inner error: {0}")]
    Inner(E),
}

impl<E> RateLimiterError<E> {
    /// Returns true if the limiter rejected the call.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RateLimiterError::RateLimitExceeded { .. })
    }

    /// Time until the next admission could succeed, for rejections.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RateLimiterError::RateLimitExceeded { retry_after } => Some(*retry_after),
            RateLimiterError::Inner(_) => None,
        }
    }

    /// Returns the operation's error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RateLimiterError::Inner(e) => Some(e),
            RateLimiterError::RateLimitExceeded { .. } => None,
        }
    }
}

impl RateLimiterError<Infallible> {
    /// Re-types a rejection for use with any operation error.
    pub fn widen<E>(self) -> RateLimiterError<E> {
        match self {
            RateLimiterError::RateLimitExceeded { retry_after } => {
                RateLimiterError::RateLimitExceeded { retry_after }
            }
            RateLimiterError::Inner(never) => match never {},
        }
    }
}

impl<E> From<RateLimiterError<E>> for ResilienceError<E> {
    fn from(err: RateLimiterError<E>) -> Self {
        match err {
            RateLimiterError::RateLimitExceeded { retry_after } => ResilienceError::RateLimited {
                retry_after: Some(retry_after),
            },
            RateLimiterError::Inner(e) => ResilienceError::Application(e),
        }
    }
}
