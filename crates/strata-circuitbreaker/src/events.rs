//! Events emitted by the circuit breaker.

use crate::state::CircuitState;
use std::time::{Duration, Instant};
use strata_core::{ResilienceEvent, Severity};

#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The circuit moved between states.
    StateTransition {
        pattern_name: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
        /// Triggered through manual control rather than by call outcomes.
        manual: bool,
        /// How long the circuit stays open; set for transitions to Open or Isolated.
        break_duration: Option<Duration>,
    },
    /// A call was rejected without reaching the operation.
    CallRejected {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    SuccessRecorded {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A handled failure was recorded.
    FailureRecorded {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { pattern_name, .. }
            | CircuitBreakerEvent::CallRejected { pattern_name, .. }
            | CircuitBreakerEvent::SuccessRecorded { pattern_name, .. }
            | CircuitBreakerEvent::FailureRecorded { pattern_name, .. } => pattern_name,
        }
    }

    fn severity(&self) -> Severity {
        match self {
            CircuitBreakerEvent::StateTransition { to_state, .. } => match to_state {
                CircuitState::Open | CircuitState::Isolated => Severity::Error,
                CircuitState::HalfOpen => Severity::Warning,
                CircuitState::Closed => Severity::Information,
            },
            CircuitBreakerEvent::CallRejected { .. } => Severity::Debug,
            CircuitBreakerEvent::SuccessRecorded { .. } => Severity::Debug,
            CircuitBreakerEvent::FailureRecorded { .. } => Severity::Warning,
        }
    }
}
