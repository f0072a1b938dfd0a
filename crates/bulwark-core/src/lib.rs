//! Core infrastructure shared by every bulwark pattern.
//!
//! This crate provides the pieces the individual pattern crates build on:
//! - [`Outcome`], the success/failure envelope with timing metadata
//! - An event system ([`EventListeners`]) backing each pattern's hooks
//! - [`ResilienceError`], a unified error for composed call pipelines
//! - [`TimeoutError`] and [`timeout`], the timer race used across patterns
//! - [`HealthStatus`] and [`HealthReporter`], consumed by the health monitor

pub mod error;
pub mod events;
pub mod health;
pub mod outcome;
pub mod timeout;

pub use error::ResilienceError;
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
pub use health::{HealthReporter, HealthStatus};
pub use outcome::Outcome;
pub use timeout::{timeout, TimeoutError};
