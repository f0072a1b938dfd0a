//! First-settles-wins race between an operation and a timer.

use std::future::Future;
use std::time::Duration;

/// The operation lost a race against its timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{layer} timed out after {after:?}")]
pub struct TimeoutError {
    /// Which component imposed the deadline, e.g. `"health_check"`.
    pub layer: &'static str,
    /// The deadline that elapsed.
    pub after: Duration,
}

/// Runs `fut` with a deadline.
///
/// Whichever settles first wins. When the timer wins, `fut` is dropped; when
/// `fut` wins, the timer is dropped. Nothing keeps running in the background.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use bulwark_core::timeout;
/// use std::time::Duration;
///
/// let fast = timeout("example", Duration::from_secs(1), async { 42 }).await;
/// assert_eq!(fast, Ok(42));
/// # }
/// ```
pub async fn timeout<F>(layer: &'static str, after: Duration, fut: F) -> Result<F::Output, TimeoutError>
where
    F: Future,
{
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| TimeoutError { layer, after })
}
