use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::collections::VecDeque;
use tokio::time::Instant;

/// The state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum CircuitState {
    /// Calls pass through.
    Closed = 0,
    /// Calls are rejected without being invoked.
    Open = 1,
    /// A limited number of probe calls test whether the dependency recovered.
    HalfOpen = 2,
}

impl CircuitState {
    /// Lowercase label, as used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a breaker's counters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CircuitStats {
    /// Current state.
    pub state: CircuitState,
    /// Every call offered to the breaker, rejected ones included.
    pub total_calls: u64,
    /// Calls that completed successfully.
    pub successful_calls: u64,
    /// Calls that failed with a tripping error.
    pub failed_calls: u64,
    /// Calls rejected without being invoked.
    pub rejected_calls: u64,
    /// Calls that failed with an error the classifier ignored.
    pub ignored_errors: u64,
    /// Failures currently counting toward the threshold.
    pub failure_count: usize,
    /// `failed / (successful + failed)`, 0.0 with no completed calls.
    pub failure_rate: f64,
    /// `successful / (successful + failed)`, 1.0 with no completed calls.
    pub success_rate: f64,
}

/// A successful admission. `epoch` ties the eventual outcome to the state
/// period it was admitted in.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Admission {
    pub(crate) epoch: u64,
    pub(crate) probe: bool,
}

pub(crate) struct Circuit {
    state: CircuitState,
    // Bumped on every transition; outcomes from an older epoch only touch
    // the stats counters.
    epoch: u64,
    failures: VecDeque<Instant>,
    half_open_successes: usize,
    half_open_in_flight: usize,
    next_attempt_time: Option<Instant>,
    total: u64,
    successful: u64,
    failed: u64,
    rejected: u64,
    ignored: u64,
}

impl Circuit {
    pub(crate) fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            epoch: 0,
            failures: VecDeque::new(),
            half_open_successes: 0,
            half_open_in_flight: 0,
            next_attempt_time: None,
            total: 0,
            successful: 0,
            failed: 0,
            rejected: 0,
            ignored: 0,
        }
    }

    /// Applies the lazy OPEN -> HALF_OPEN transition.
    pub(crate) fn refresh<C>(
        &mut self,
        config: &CircuitBreakerConfig<C>,
        now: Instant,
        events: &mut Vec<CircuitBreakerEvent>,
    ) -> CircuitState {
        if self.state == CircuitState::Open
            && self.next_attempt_time.is_some_and(|at| now >= at)
        {
            self.transition_to(CircuitState::HalfOpen, config, now, events);
        }
        self.state
    }

    pub(crate) fn try_acquire<C>(
        &mut self,
        config: &CircuitBreakerConfig<C>,
        now: Instant,
        events: &mut Vec<CircuitBreakerEvent>,
    ) -> Option<Admission> {
        self.refresh(config, now, events);
        self.total += 1;

        let admission = match self.state {
            CircuitState::Closed => Some(Admission {
                epoch: self.epoch,
                probe: false,
            }),
            CircuitState::HalfOpen
                if self.half_open_in_flight < config.permitted_calls_in_half_open =>
            {
                self.half_open_in_flight += 1;
                Some(Admission {
                    epoch: self.epoch,
                    probe: true,
                })
            }
            CircuitState::HalfOpen | CircuitState::Open => None,
        };

        match admission {
            Some(_) => events.push(CircuitBreakerEvent::CallPermitted {
                pattern_name: config.name.clone(),
                timestamp: std::time::Instant::now(),
                state: self.state,
            }),
            None => {
                self.rejected += 1;
                events.push(CircuitBreakerEvent::CallRejected {
                    pattern_name: config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    state: self.state,
                });

                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "rejected").increment(1);
            }
        }

        admission
    }

    pub(crate) fn on_success<C>(
        &mut self,
        config: &CircuitBreakerConfig<C>,
        admission: Admission,
        now: Instant,
        events: &mut Vec<CircuitBreakerEvent>,
    ) {
        self.successful += 1;
        events.push(CircuitBreakerEvent::SuccessRecorded {
            pattern_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            state: self.state,
        });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "success").increment(1);

        if admission.epoch != self.epoch {
            return;
        }

        match self.state {
            CircuitState::Closed => self.failures.clear(),
            CircuitState::HalfOpen => {
                self.release_probe(admission);
                self.half_open_successes += 1;
                if self.half_open_successes >= config.success_threshold {
                    self.transition_to(CircuitState::Closed, config, now, events);
                }
            }
            CircuitState::Open => {}
        }
    }

    pub(crate) fn on_failure<C>(
        &mut self,
        config: &CircuitBreakerConfig<C>,
        admission: Admission,
        now: Instant,
        events: &mut Vec<CircuitBreakerEvent>,
    ) {
        self.failed += 1;
        events.push(CircuitBreakerEvent::FailureRecorded {
            pattern_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            state: self.state,
        });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "failure").increment(1);

        if admission.epoch != self.epoch {
            return;
        }

        match self.state {
            CircuitState::Closed => {
                self.prune_failures(config, now);
                self.failures.push_back(now);
                if self.failures.len() >= config.failure_threshold {
                    self.transition_to(CircuitState::Open, config, now, events);
                }
            }
            CircuitState::HalfOpen => {
                self.transition_to(CircuitState::Open, config, now, events);
            }
            CircuitState::Open => {}
        }
    }

    pub(crate) fn on_ignored<C>(
        &mut self,
        config: &CircuitBreakerConfig<C>,
        admission: Admission,
        events: &mut Vec<CircuitBreakerEvent>,
    ) {
        self.ignored += 1;
        events.push(CircuitBreakerEvent::ErrorIgnored {
            pattern_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            state: self.state,
        });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "ignored").increment(1);

        self.release_probe(admission);
    }

    /// Frees a half-open probe slot whose call never reported an outcome.
    pub(crate) fn release_probe(&mut self, admission: Admission) {
        if admission.probe
            && admission.epoch == self.epoch
            && self.state == CircuitState::HalfOpen
        {
            self.half_open_in_flight = self.half_open_in_flight.saturating_sub(1);
        }
    }

    pub(crate) fn force_state<C>(
        &mut self,
        state: CircuitState,
        config: &CircuitBreakerConfig<C>,
        now: Instant,
        events: &mut Vec<CircuitBreakerEvent>,
    ) {
        self.transition_to(state, config, now, events);
    }

    pub(crate) fn reset<C>(
        &mut self,
        config: &CircuitBreakerConfig<C>,
        now: Instant,
        events: &mut Vec<CircuitBreakerEvent>,
    ) {
        self.transition_to(CircuitState::Closed, config, now, events);
        self.failures.clear();
        self.total = 0;
        self.successful = 0;
        self.failed = 0;
        self.rejected = 0;
        self.ignored = 0;
    }

    pub(crate) fn stats<C>(&mut self, config: &CircuitBreakerConfig<C>, now: Instant) -> CircuitStats {
        self.prune_failures(config, now);
        let completed = self.successful + self.failed;
        let (failure_rate, success_rate) = if completed == 0 {
            (0.0, 1.0)
        } else {
            (
                self.failed as f64 / completed as f64,
                self.successful as f64 / completed as f64,
            )
        };

        CircuitStats {
            state: self.state,
            total_calls: self.total,
            successful_calls: self.successful,
            failed_calls: self.failed,
            rejected_calls: self.rejected,
            ignored_errors: self.ignored,
            failure_count: self.failures.len(),
            failure_rate,
            success_rate,
        }
    }

    #[cfg(test)]
    pub(crate) fn next_attempt_time(&self) -> Option<Instant> {
        self.next_attempt_time
    }

    fn prune_failures<C>(&mut self, config: &CircuitBreakerConfig<C>, now: Instant) {
        if let Some(window) = config.tracking_window {
            while let Some(&oldest) = self.failures.front() {
                if now.duration_since(oldest) >= window {
                    self.failures.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    fn transition_to<C>(
        &mut self,
        state: CircuitState,
        config: &CircuitBreakerConfig<C>,
        now: Instant,
        events: &mut Vec<CircuitBreakerEvent>,
    ) {
        if self.state == state {
            return;
        }

        let from_state = self.state;
        self.state = state;
        self.epoch = self.epoch.wrapping_add(1);
        self.half_open_successes = 0;
        self.half_open_in_flight = 0;

        match state {
            CircuitState::Open => {
                self.failures.clear();
                self.next_attempt_time = Some(now + config.open_duration());
            }
            CircuitState::Closed => {
                self.failures.clear();
                self.next_attempt_time = None;
            }
            CircuitState::HalfOpen => {}
        }

        events.push(CircuitBreakerEvent::StateTransition {
            pattern_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            from_state,
            to_state: state,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(
            breaker = %config.name,
            from = %from_state,
            to = %state,
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);
            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone())
                .set(state as u8 as f64);
        }
    }
}
