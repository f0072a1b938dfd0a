//! Admission state for the three counting strategies.
//!
//! Every strategy answers the same question synchronously: may one more
//! call proceed at `now`? On rejection it reports how long until the next
//! admission could succeed, which is never zero.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// How a rate limiter counts admissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RateLimitStrategy {
    /// A counter that resets every window. Windows are aligned to the
    /// limiter's creation, so a burst straddling a boundary can admit up to
    /// twice the limit in a short span.
    FixedWindow,
    /// Admits while fewer than the limit were admitted in the trailing
    /// window.
    #[default]
    SlidingWindow,
    /// A bucket of `max_requests` tokens refilled continuously at
    /// `max_requests / window`.
    TokenBucket,
}

impl RateLimitStrategy {
    /// Lowercase label, as used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitStrategy::FixedWindow => "fixed_window",
            RateLimitStrategy::SlidingWindow => "sliding_window",
            RateLimitStrategy::TokenBucket => "token_bucket",
        }
    }
}

#[derive(Debug)]
pub(crate) enum Window {
    Fixed(FixedWindow),
    Sliding(SlidingWindow),
    Bucket(TokenBucket),
}

impl Window {
    pub(crate) fn new(
        strategy: RateLimitStrategy,
        max_requests: usize,
        window: Duration,
        now: Instant,
    ) -> Self {
        match strategy {
            RateLimitStrategy::FixedWindow => Window::Fixed(FixedWindow::new(max_requests, window, now)),
            RateLimitStrategy::SlidingWindow => Window::Sliding(SlidingWindow::new(max_requests, window)),
            RateLimitStrategy::TokenBucket => Window::Bucket(TokenBucket::new(max_requests, window, now)),
        }
    }

    /// Admits one call, or returns the time until one could be admitted.
    pub(crate) fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        match self {
            Window::Fixed(w) => w.try_acquire(now),
            Window::Sliding(w) => w.try_acquire(now),
            Window::Bucket(w) => w.try_acquire(now),
        }
    }

    /// Admissions that would succeed right now.
    pub(crate) fn available(&mut self, now: Instant) -> usize {
        match self {
            Window::Fixed(w) => w.available(now),
            Window::Sliding(w) => w.available(now),
            Window::Bucket(w) => w.available(now),
        }
    }
}

#[derive(Debug)]
pub(crate) struct FixedWindow {
    max_requests: usize,
    window: Duration,
    window_start: Instant,
    count: usize,
}

impl FixedWindow {
    fn new(max_requests: usize, window: Duration, now: Instant) -> Self {
        Self {
            max_requests,
            window,
            window_start: now,
            count: 0,
        }
    }

    /// Advances `window_start` to the window containing `now`.
    fn roll(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.window_start);
        if elapsed < self.window {
            return;
        }
        let windows = elapsed.as_nanos() / self.window.as_nanos();
        let advance = u64::try_from(windows * self.window.as_nanos())
            .map(Duration::from_nanos)
            .unwrap_or(elapsed);
        self.window_start += advance;
        self.count = 0;
    }

    fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        self.roll(now);
        if self.count < self.max_requests {
            self.count += 1;
            Ok(())
        } else {
            Err(self.window - now.duration_since(self.window_start))
        }
    }

    fn available(&mut self, now: Instant) -> usize {
        self.roll(now);
        self.max_requests - self.count
    }
}

#[derive(Debug)]
pub(crate) struct SlidingWindow {
    max_requests: usize,
    window: Duration,
    admitted: VecDeque<Instant>,
}

impl SlidingWindow {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            admitted: VecDeque::with_capacity(max_requests.min(1024)),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.admitted.front() {
            if now.duration_since(oldest) >= self.window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }

    fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        self.prune(now);
        if self.admitted.len() < self.max_requests {
            self.admitted.push_back(now);
            return Ok(());
        }
        // Full, so the deque is non-empty and its front is inside the window.
        let oldest = self.admitted.front().copied().unwrap_or(now);
        Err(self.window - now.duration_since(oldest))
    }

    fn available(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.max_requests - self.admitted.len()
    }
}

/// Token bucket in integer fixed point.
///
/// One token is `window_nanos` units and every elapsed nanosecond adds
/// `max_requests` units, so the refill rate `max_requests / window` is exact:
/// after `window / max_requests` exactly one token has been added.
#[derive(Debug)]
pub(crate) struct TokenBucket {
    per_token: u128,
    per_nano: u128,
    capacity: u128,
    units: u128,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(max_requests: usize, window: Duration, now: Instant) -> Self {
        let per_token = window.as_nanos().max(1);
        let per_nano = max_requests as u128;
        let capacity = per_token * per_nano;
        Self {
            per_token,
            per_nano,
            capacity,
            units: capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_nanos();
        self.units = self
            .units
            .saturating_add(elapsed.saturating_mul(self.per_nano))
            .min(self.capacity);
        self.last_refill = now;
    }

    fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        if self.units >= self.per_token {
            self.units -= self.per_token;
            return Ok(());
        }
        let deficit = self.per_token - self.units;
        let nanos = deficit.div_ceil(self.per_nano);
        Err(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }

    fn available(&mut self, now: Instant) -> usize {
        self.refill(now);
        usize::try_from(self.units / self.per_token).unwrap_or(usize::MAX)
    }
}
