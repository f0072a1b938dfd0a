//! Fault-tolerance patterns for async Rust.
//!
//! This crate re-exports the individual pattern crates behind feature flags
//! and adds [`ResilienceGuard`](guard::ResilienceGuard), which composes them
//! around a single call.
//!
//! # Patterns
//!
//! - **Circuit Breaker**: stop calling a dependency that keeps failing
//! - **Rate Limiter**: fixed window, sliding window or token bucket admission
//! - **Bulkhead**: bound concurrency, with an optional waiting queue
//! - **Retry**: constant, linear or exponential backoff
//! - **Fallback**: substitute a value when the primary fails
//! - **Health Check**: background polling of named checks
//!
//! # Usage
//!
//! Enable the patterns you need:
//!
//! ```toml
//! [dependencies]
//! bulwark = { version = "0.3", features = ["circuitbreaker", "retry"] }
//! ```
//!
//! Or everything, including the guard:
//!
//! ```toml
//! [dependencies]
//! bulwark = { version = "0.3", features = ["full"] }
//! ```
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "guard")]
//! # {
//! use bulwark::bulkhead::Bulkhead;
//! use bulwark::circuitbreaker::CircuitBreaker;
//! use bulwark::guard::ResilienceGuard;
//! use bulwark::ratelimiter::RateLimiter;
//! use bulwark::retry::Retry;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let guard = ResilienceGuard::<u64, std::io::Error>::builder()
//!     .name("ledger")
//!     .bulkhead(Bulkhead::builder().max_concurrent(10).max_queue(20).build())
//!     .rate_limiter(RateLimiter::builder().max_requests(100).window(Duration::from_secs(1)).build())
//!     .circuit_breaker(CircuitBreaker::builder().failure_threshold(5).build())
//!     .retry(Retry::builder().max_attempts(3).build())
//!     .attempt_timeout(Duration::from_millis(500))
//!     .build();
//!
//! let outcome = guard.execute(|| async { Ok(42) }).await;
//! println!("{:?} in {:?}", outcome.value(), outcome.duration());
//! # }
//! # }
//! ```
//!
//! # Individual Crates
//!
//! Each pattern is also published on its own:
//! - [`bulwark-core`](https://docs.rs/bulwark-core)
//! - [`bulwark-circuitbreaker`](https://docs.rs/bulwark-circuitbreaker)
//! - [`bulwark-ratelimiter`](https://docs.rs/bulwark-ratelimiter)
//! - [`bulwark-bulkhead`](https://docs.rs/bulwark-bulkhead)
//! - [`bulwark-retry`](https://docs.rs/bulwark-retry)
//! - [`bulwark-fallback`](https://docs.rs/bulwark-fallback)
//! - [`bulwark-healthcheck`](https://docs.rs/bulwark-healthcheck)

// Core is always available
pub use bulwark_core as core;
pub use bulwark_core::{HealthReporter, HealthStatus, Outcome, ResilienceError};

// Re-export patterns based on features
#[cfg(feature = "circuitbreaker")]
pub use bulwark_circuitbreaker as circuitbreaker;

#[cfg(feature = "bulkhead")]
pub use bulwark_bulkhead as bulkhead;

#[cfg(feature = "ratelimiter")]
pub use bulwark_ratelimiter as ratelimiter;

#[cfg(feature = "retry")]
pub use bulwark_retry as retry;

#[cfg(feature = "fallback")]
pub use bulwark_fallback as fallback;

#[cfg(feature = "healthcheck")]
pub use bulwark_healthcheck as healthcheck;

#[cfg(feature = "guard")]
pub mod guard;

#[cfg(feature = "guard")]
pub use guard::{ResilienceGuard, ResilienceGuardBuilder};
