//! The success/failure envelope returned by `execute` methods.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// The result of a guarded call together with how long it took.
///
/// An `Outcome` always holds exactly one of a value or an error; the
/// `success` flag is derived from which one is present, so the two can
/// never disagree.
///
/// ```
/// use bulwark_core::Outcome;
/// use std::time::Duration;
///
/// let ok: Outcome<&str, ()> = Outcome::success("ok", Duration::from_millis(3));
/// assert!(ok.is_success());
/// assert_eq!(ok.value(), Some(&"ok"));
/// assert_eq!(ok.duration_ms(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T, E> {
    result: Result<T, E>,
    duration: Duration,
}

impl<T, E> Outcome<T, E> {
    /// A successful outcome.
    pub fn success(value: T, duration: Duration) -> Self {
        Self {
            result: Ok(value),
            duration,
        }
    }

    /// A failed outcome.
    pub fn failure(error: E, duration: Duration) -> Self {
        Self {
            result: Err(error),
            duration,
        }
    }

    /// Wraps an already computed result.
    pub fn from_result(result: Result<T, E>, duration: Duration) -> Self {
        Self { result, duration }
    }

    /// Awaits `fut` and records its wall-clock duration.
    pub async fn timed<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let result = fut.await;
        Self {
            result,
            duration: start.elapsed(),
        }
    }

    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Whether the call failed.
    pub fn is_failure(&self) -> bool {
        self.result.is_err()
    }

    /// The value, if the call succeeded.
    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    /// The error, if the call failed.
    pub fn error(&self) -> Option<&E> {
        self.result.as_ref().err()
    }

    /// Time spent producing this outcome.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Duration in whole milliseconds.
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// Borrowing view of the underlying result.
    pub fn as_result(&self) -> Result<&T, &E> {
        self.result.as_ref()
    }

    /// Discards the timing metadata.
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }

    /// Splits into the result and the duration.
    pub fn into_parts(self) -> (Result<T, E>, Duration) {
        (self.result, self.duration)
    }

    /// Maps the success value, keeping the duration.
    pub fn map<U, F>(self, f: F) -> Outcome<U, E>
    where
        F: FnOnce(T) -> U,
    {
        Outcome {
            result: self.result.map(f),
            duration: self.duration,
        }
    }

    /// Maps the error, keeping the duration.
    pub fn map_err<U, F>(self, f: F) -> Outcome<T, U>
    where
        F: FnOnce(E) -> U,
    {
        Outcome {
            result: self.result.map_err(f),
            duration: self.duration,
        }
    }
}

impl<T, E> From<Outcome<T, E>> for Result<T, E> {
    fn from(outcome: Outcome<T, E>) -> Self {
        outcome.result
    }
}

#[cfg(feature = "serde")]
impl<T, E> serde::Serialize for Outcome<T, E>
where
    T: serde::Serialize,
    E: std::fmt::Display,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Outcome", 4)?;
        state.serialize_field("success", &self.is_success())?;
        match &self.result {
            Ok(value) => {
                state.serialize_field("value", value)?;
                state.skip_field("error")?;
            }
            Err(error) => {
                state.skip_field("value")?;
                state.serialize_field("error", &error.to_string())?;
            }
        }
        state.serialize_field("duration_ms", &self.duration_ms())?;
        state.end()
    }
}
