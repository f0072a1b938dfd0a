//! Property tests for health aggregation.
//!
//! Invariants tested:
//! - Unhealthy exactly when a critical check is unhealthy
//! - Otherwise degraded exactly when some check is not healthy
//! - Result order never matters

use bulwark_healthcheck::{aggregate, HealthCheckResult, HealthStatus};
use proptest::prelude::*;
use std::time::{Duration, SystemTime};

fn status() -> impl Strategy<Value = HealthStatus> {
    prop_oneof![
        Just(HealthStatus::Healthy),
        Just(HealthStatus::Degraded),
        Just(HealthStatus::Unhealthy),
    ]
}

fn results() -> impl Strategy<Value = Vec<HealthCheckResult>> {
    prop::collection::vec((status(), any::<bool>()), 0..12).prop_map(|checks| {
        checks
            .into_iter()
            .enumerate()
            .map(|(i, (status, critical))| HealthCheckResult {
                name: format!("check-{i}"),
                status,
                timestamp: SystemTime::UNIX_EPOCH,
                duration: Duration::ZERO,
                critical,
                message: None,
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn aggregate_follows_precedence(results in results()) {
        let critical_down = results
            .iter()
            .any(|r| r.critical && r.status == HealthStatus::Unhealthy);
        let any_unwell = results.iter().any(|r| r.status != HealthStatus::Healthy);

        let expected = if critical_down {
            HealthStatus::Unhealthy
        } else if any_unwell {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        prop_assert_eq!(aggregate(&results), expected);
    }

    #[test]
    fn aggregate_ignores_order(results in results()) {
        let mut reversed = results.clone();
        reversed.reverse();
        prop_assert_eq!(aggregate(&results), aggregate(&reversed));
    }
}
