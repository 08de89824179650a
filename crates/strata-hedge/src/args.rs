//! Arguments passed to hedging callbacks and generators.

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use strata_core::{BoxError, Outcome, ResilienceCallback, ResilienceContext};

/// A secondary attempt, ready to be run.
pub type HedgingAction<T> = BoxFuture<'static, Outcome<T>>;

/// Produces the action for a secondary attempt, or `None` to skip it.
pub type HedgingActionGenerator<T> =
    Arc<dyn Fn(HedgingActionGeneratorArguments<T>) -> Option<HedgingAction<T>> + Send + Sync>;

/// Computes the delay before the next secondary attempt.
pub type HedgingDelayGenerator =
    Arc<dyn Fn(HedgingDelayGeneratorArguments) -> Duration + Send + Sync>;

/// Async, fallible callback run right before a secondary attempt starts.
pub type OnHedgingCallback =
    Arc<dyn Fn(OnHedgingArguments) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Passed to the action generator.
pub struct HedgingActionGeneratorArguments<T> {
    /// The caller's context.
    pub primary_context: ResilienceContext,
    /// The private context of the attempt being generated.
    pub action_context: ResilienceContext,
    pub attempt_number: u32,
    /// The operation being hedged.
    pub callback: ResilienceCallback<T>,
}

/// Passed to a dynamic delay generator.
#[derive(Debug, Clone)]
pub struct HedgingDelayGeneratorArguments {
    pub context: ResilienceContext,
    /// Number of the attempt the delay leads up to.
    pub attempt_number: u32,
}

/// Passed to `on_hedging`.
#[derive(Debug, Clone)]
pub struct OnHedgingArguments {
    pub primary_context: ResilienceContext,
    pub action_context: ResilienceContext,
    pub attempt_number: u32,
}

pub(crate) fn default_action_generator<T: Send + 'static>() -> HedgingActionGenerator<T> {
    Arc::new(|args: HedgingActionGeneratorArguments<T>| {
        Some(args.callback.invoke(args.action_context))
    })
}
