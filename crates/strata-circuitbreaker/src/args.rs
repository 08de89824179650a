//! Arguments passed to user callbacks.

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use strata_core::{BoxError, Outcome, ResilienceContext};

/// An async, fallible user callback.
pub type CircuitCallback<A> =
    Arc<dyn Fn(A) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Computes the break duration each time the circuit opens automatically.
pub type BreakDurationGenerator =
    Arc<dyn Fn(BreakDurationGeneratorArguments) -> Duration + Send + Sync>;

/// Passed to `on_opened`.
#[derive(Debug, Clone)]
pub struct OnCircuitOpenedArguments {
    pub context: ResilienceContext,
    /// The handled outcome that opened the circuit; a success when opened manually.
    pub outcome: Outcome<()>,
    pub break_duration: Duration,
    pub is_manual: bool,
}

/// Passed to `on_closed`.
#[derive(Debug, Clone)]
pub struct OnCircuitClosedArguments {
    pub context: ResilienceContext,
    pub outcome: Outcome<()>,
    pub is_manual: bool,
}

/// Passed to `on_half_opened`.
#[derive(Debug, Clone)]
pub struct OnCircuitHalfOpenedArguments {
    pub context: ResilienceContext,
}

/// Passed to the break duration generator.
#[derive(Debug, Clone)]
pub struct BreakDurationGeneratorArguments {
    pub context: ResilienceContext,
    /// Failure rate sampled when the circuit opened.
    pub failure_rate: f64,
    pub failure_count: u32,
    /// Half-open test calls since the circuit was last closed.
    pub half_open_attempts: u32,
}
