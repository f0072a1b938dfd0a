//! The fallback's error type.

use bulwark_core::ResilienceError;
use std::fmt;

/// Why a fallback-guarded call produced no value.
///
/// Both variants carry an `E`: the fallback answers with the same error type
/// as the primary, so callers can always recover the underlying failure with
/// [`into_inner`](Self::into_inner).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackError<E> {
    /// The primary's error, passed through untouched because the `handle`
    /// predicate declined it.
    Inner(E),
    /// The fallback's own error.
    FallbackFailed(E),
}

impl<E> FallbackError<E> {
    /// Whether the fallback was run before giving up.
    pub fn fallback_ran(&self) -> bool {
        matches!(self, Self::FallbackFailed(_))
    }

    pub fn get_ref(&self) -> &E {
        let (Self::Inner(e) | Self::FallbackFailed(e)) = self;
        e
    }

    pub fn into_inner(self) -> E {
        let (Self::Inner(e) | Self::FallbackFailed(e)) = self;
        e
    }
}

impl<E: fmt::Display> fmt::Display for FallbackError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fallback_ran() {
            write!(f, "primary and fallback both failed: {}", self.get_ref())
        } else {
            write!(f, "{}", self.get_ref())
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for FallbackError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.get_ref())
    }
}

impl<E> From<FallbackError<E>> for ResilienceError<E> {
    fn from(err: FallbackError<E>) -> Self {
        ResilienceError::Application(err.into_inner())
    }
}
