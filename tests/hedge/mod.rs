//! Tests for the hedging strategy.
//!
//! - **integration**: Winners, losers and the attempt cap
//! - **delay_modes**: Latency, parallel, fallback and dynamic delays
//! - **cancellation**: Caller cancellation and cleanup of losing attempts
//! - **events**: Event emission, `on_hedging` and the action generator
//! - **layer**: The tower layer

mod delay_modes;
mod events;
mod integration;

use std::fmt;
use std::sync::{Arc, Mutex};
use strata_hedge::HedgeEvent;

/// Test error type for use in test operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestError {
    pub message: String,
}

impl TestError {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TestError: {}", self.message)
    }
}

impl std::error::Error for TestError {}

/// Collects every hedge event it sees.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<HedgeEvent>>>,
}

impl EventLog {
    pub fn listener(&self) -> impl Fn(&HedgeEvent) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event: &HedgeEvent| events.lock().unwrap().push(event.clone())
    }

    pub fn hedges(&self) -> Vec<u32> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                HedgeEvent::Hedging { attempt, .. } => Some(*attempt),
                _ => None,
            })
            .collect()
    }

    /// `(attempt, handled)` of every finished attempt, sorted by attempt.
    pub fn attempts(&self) -> Vec<(u32, bool)> {
        let mut attempts: Vec<_> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                HedgeEvent::ExecutionAttempt {
                    attempt, handled, ..
                } => Some((*attempt, *handled)),
                _ => None,
            })
            .collect();
        attempts.sort_unstable();
        attempts
    }
}

/// Yields to the runtime until `condition` holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}
