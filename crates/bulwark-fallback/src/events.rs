//! Fallback events.
//!
//! Every call ends in exactly one event: `Success` when the primary answers,
//! `Skipped` when its error is not handled, otherwise `Applied` or `Failed`
//! depending on the fallback's result.

use bulwark_core::ResilienceEvent;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub enum FallbackEvent {
    Success {
        pattern_name: String,
        timestamp: Instant,
    },
    /// The fallback produced the value; `fallback_duration` is the time it
    /// took.
    Applied {
        pattern_name: String,
        timestamp: Instant,
        fallback_duration: Duration,
    },
    Failed {
        pattern_name: String,
        timestamp: Instant,
        fallback_duration: Duration,
    },
    Skipped {
        pattern_name: String,
        timestamp: Instant,
    },
}

impl FallbackEvent {
    /// Time spent in the fallback, if it ran.
    pub fn fallback_duration(&self) -> Option<Duration> {
        match self {
            Self::Applied {
                fallback_duration, ..
            }
            | Self::Failed {
                fallback_duration, ..
            } => Some(*fallback_duration),
            Self::Success { .. } | Self::Skipped { .. } => None,
        }
    }
}

impl ResilienceEvent for FallbackEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Applied { .. } => "applied",
            Self::Failed { .. } => "failed",
            Self::Skipped { .. } => "skipped",
        }
    }

    fn timestamp(&self) -> Instant {
        let (Self::Success { timestamp, .. }
        | Self::Applied { timestamp, .. }
        | Self::Failed { timestamp, .. }
        | Self::Skipped { timestamp, .. }) = self;
        *timestamp
    }

    fn pattern_name(&self) -> &str {
        let (Self::Success { pattern_name, .. }
        | Self::Applied { pattern_name, .. }
        | Self::Failed { pattern_name, .. }
        | Self::Skipped { pattern_name, .. }) = self;
        pattern_name
    }
}
