use rand::Rng;
use std::time::Duration;

/// How the delay grows between retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Backoff {
    /// Every retry waits `initial_delay`.
    Constant,
    /// The n-th retry waits `initial_delay * n`.
    Linear,
    /// The n-th retry waits `initial_delay * factor^(n-1)`.
    #[default]
    Exponential,
}

impl Backoff {
    /// Returns the strategy name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Backoff::Constant => "constant",
            Backoff::Linear => "linear",
            Backoff::Exponential => "exponential",
        }
    }
}

/// Delay schedule for retries.
///
/// Retries are numbered from 1; the first attempt never waits.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BackoffPolicy {
    pub(crate) backoff: Backoff,
    pub(crate) initial_delay: Duration,
    pub(crate) max_delay: Duration,
    pub(crate) factor: f64,
    pub(crate) jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            backoff: Backoff::Exponential,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
            jitter: 0.0,
        }
    }
}

impl BackoffPolicy {
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// The delay before the `retry`-th retry, clamped to `max_delay`, without
    /// jitter.
    pub fn delay(&self, retry: usize) -> Duration {
        let retry = retry.max(1);
        let delay = match self.backoff {
            Backoff::Constant => self.initial_delay,
            Backoff::Linear => u32::try_from(retry)
                .ok()
                .and_then(|n| self.initial_delay.checked_mul(n))
                .unwrap_or(self.max_delay),
            Backoff::Exponential => {
                let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
                let nanos = self.initial_delay.as_nanos() as f64 * self.factor.powi(exponent);
                if !nanos.is_finite() || nanos >= self.max_delay.as_nanos() as f64 {
                    self.max_delay
                } else {
                    Duration::from_nanos(nanos.round() as u64)
                }
            }
        };
        delay.min(self.max_delay)
    }

    /// The delay before the `retry`-th retry with jitter applied.
    ///
    /// Jitter spreads the delay uniformly over `delay ± jitter * delay`; the
    /// result never exceeds `max_delay`.
    pub fn next_delay(&self, retry: usize) -> Duration {
        let delay = self.delay(retry);
        if self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }

        let nanos = delay.as_nanos() as f64;
        let spread = nanos * self.jitter;
        let sampled = rand::rng().random_range((nanos - spread)..=(nanos + spread));
        Duration::from_nanos(sampled.max(0.0) as u64).min(self.max_delay)
    }
}
