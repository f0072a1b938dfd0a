//! Property-based tests for bulwark patterns.
//!
//! Run with: cargo test --test property_tests
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold across all patterns.

pub mod health;
pub mod rate_limiter;
pub mod retry;

/// A current-thread runtime with the clock paused, so sleeps resolve
/// instantly and in order.
pub fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}
