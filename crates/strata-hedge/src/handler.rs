//! Shared per-strategy state used by every attempt.

use crate::args::{HedgingActionGenerator, OnHedgingCallback};
use crate::events::HedgeEvent;
use std::time::Duration;
use strata_core::{CancellationTokenPool, EventListeners, SharedClassifier, SharedTimeProvider};

#[cfg(feature = "metrics")]
use metrics::{counter, histogram};

pub(crate) struct HedgingHandler<T> {
    pub(crate) name: String,
    pub(crate) classifier: SharedClassifier<T>,
    pub(crate) action_generator: HedgingActionGenerator<T>,
    pub(crate) on_hedging: Option<OnHedgingCallback>,
    pub(crate) listeners: EventListeners<HedgeEvent>,
    pub(crate) time: SharedTimeProvider,
    pub(crate) tokens: CancellationTokenPool,
}

impl<T> HedgingHandler<T> {
    pub(crate) fn report_hedging(&self, attempt: u32) {
        #[cfg(feature = "tracing")]
        tracing::debug!(hedge = %self.name, attempt, "Launching hedged attempt");

        self.listeners.emit(&HedgeEvent::Hedging {
            pattern_name: self.name.clone(),
            timestamp: self.time.now(),
            attempt,
        });
    }

    pub(crate) fn report_attempt(&self, attempt: u32, execution_time: Duration, handled: bool) {
        #[cfg(feature = "tracing")]
        tracing::trace!(
            hedge = %self.name,
            attempt,
            execution_time = ?execution_time,
            handled,
            "Hedged attempt finished"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "hedge_attempts_total",
                "hedge" => self.name.clone(),
                "handled" => if handled { "true" } else { "false" }
            )
            .increment(1);
            histogram!("hedge_attempt_duration_seconds", "hedge" => self.name.clone())
                .record(execution_time.as_secs_f64());
        }

        self.listeners.emit(&HedgeEvent::ExecutionAttempt {
            pattern_name: self.name.clone(),
            timestamp: self.time.now(),
            attempt,
            execution_time,
            handled,
        });
    }
}
