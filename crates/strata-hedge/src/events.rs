//! Events emitted by the hedging strategy.

use std::time::{Duration, Instant};
use strata_core::{ResilienceEvent, Severity};

/// Events emitted during hedged execution.
#[derive(Debug, Clone)]
pub enum HedgeEvent {
    /// A secondary attempt is being launched.
    Hedging {
        pattern_name: String,
        timestamp: Instant,
        /// Attempt number; the primary is attempt 0.
        attempt: u32,
    },

    /// An attempt finished, whether or not its outcome was used.
    ExecutionAttempt {
        pattern_name: String,
        timestamp: Instant,
        attempt: u32,
        /// Time from launch to completion.
        execution_time: Duration,
        /// Whether the outcome was classified as a failure worth hedging.
        handled: bool,
    },
}

impl ResilienceEvent for HedgeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            HedgeEvent::Hedging { .. } => "hedging",
            HedgeEvent::ExecutionAttempt { .. } => "execution_attempt",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            HedgeEvent::Hedging { timestamp, .. }
            | HedgeEvent::ExecutionAttempt { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            HedgeEvent::Hedging { pattern_name, .. }
            | HedgeEvent::ExecutionAttempt { pattern_name, .. } => pattern_name,
        }
    }

    fn severity(&self) -> Severity {
        match self {
            HedgeEvent::Hedging { .. } => Severity::Warning,
            HedgeEvent::ExecutionAttempt { handled: true, .. } => Severity::Warning,
            HedgeEvent::ExecutionAttempt { handled: false, .. } => Severity::Information,
        }
    }
}
