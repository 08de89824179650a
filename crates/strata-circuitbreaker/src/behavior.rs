//! Failure-accounting policies.

use crate::health::{HealthInfo, HealthMetrics};
use crate::state::CircuitState;
use std::time::Duration;
use strata_core::SharedTimeProvider;

/// Opens the circuit after a run of consecutive failures.
#[derive(Debug, Clone)]
pub struct ConsecutiveFailuresBehavior {
    threshold: u32,
    consecutive_failures: u32,
}

impl ConsecutiveFailuresBehavior {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive_failures: 0,
        }
    }

    fn on_action_success(&mut self, state: CircuitState) {
        if state == CircuitState::Closed {
            self.consecutive_failures = 0;
        }
    }

    fn on_action_failure(&mut self, state: CircuitState) -> bool {
        if state != CircuitState::Closed {
            return false;
        }
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_failures >= self.threshold
    }

    fn health_info(&self) -> HealthInfo {
        HealthInfo::from_counts(0, self.consecutive_failures)
    }
}

/// Opens the circuit when the sampled failure rate crosses a ratio.
#[derive(Debug)]
pub struct AdvancedBehavior {
    failure_ratio: f64,
    minimum_throughput: u32,
    metrics: HealthMetrics,
}

impl AdvancedBehavior {
    pub fn new(
        failure_ratio: f64,
        minimum_throughput: u32,
        sampling_duration: Duration,
        time: SharedTimeProvider,
    ) -> Self {
        Self {
            failure_ratio,
            minimum_throughput,
            metrics: HealthMetrics::new(sampling_duration, time),
        }
    }

    fn on_action_failure(&mut self, state: CircuitState) -> bool {
        self.metrics.increment_failure();
        match state {
            CircuitState::Closed | CircuitState::HalfOpen => {
                let health = self.metrics.health_info();
                health.throughput >= self.minimum_throughput
                    && health.failure_rate >= self.failure_ratio
            }
            // Counted, but a broken circuit is never re-broken
            CircuitState::Open | CircuitState::Isolated => false,
        }
    }
}

/// The failure-accounting policy of a circuit breaker.
///
/// Selected once from the configuration; the controller drives it under its
/// state lock.
#[derive(Debug)]
pub enum CircuitBehavior {
    ConsecutiveFailures(ConsecutiveFailuresBehavior),
    Advanced(AdvancedBehavior),
}

impl CircuitBehavior {
    pub fn on_action_success(&mut self, state: CircuitState) {
        match self {
            CircuitBehavior::ConsecutiveFailures(b) => b.on_action_success(state),
            CircuitBehavior::Advanced(b) => b.metrics.increment_success(),
        }
    }

    /// Records a handled failure and returns whether the circuit should open.
    pub fn on_action_failure(&mut self, state: CircuitState) -> bool {
        match self {
            CircuitBehavior::ConsecutiveFailures(b) => b.on_action_failure(state),
            CircuitBehavior::Advanced(b) => b.on_action_failure(state),
        }
    }

    pub fn on_circuit_closed(&mut self) {
        match self {
            CircuitBehavior::ConsecutiveFailures(b) => b.consecutive_failures = 0,
            CircuitBehavior::Advanced(b) => b.metrics.reset(),
        }
    }

    pub fn health_info(&mut self) -> HealthInfo {
        match self {
            CircuitBehavior::ConsecutiveFailures(b) => b.health_info(),
            CircuitBehavior::Advanced(b) => b.metrics.health_info(),
        }
    }
}
