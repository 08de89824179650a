//! The hedging loop.

use crate::args::HedgingDelayGeneratorArguments;
use crate::config::HedgeDelay;
use crate::controller::HedgingController;
use crate::execution_context::HedgingExecutionContext;
use crate::layer::HedgeLayer;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use strata_core::{
    OperationCanceledError, Outcome, ResilienceCallback, ResilienceContext, ResilienceStrategy,
};

/// A built hedging strategy.
///
/// Cheap to clone; clones share the same pools.
pub struct HedgingStrategy<T> {
    controller: Arc<HedgingController<T>>,
    delay: HedgeDelay,
}

impl<T> Clone for HedgingStrategy<T> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
            delay: self.delay.clone(),
        }
    }
}

impl<T: Send + 'static> HedgingStrategy<T> {
    pub(crate) fn new(controller: HedgingController<T>, delay: HedgeDelay) -> Self {
        Self {
            controller: Arc::new(controller),
            delay,
        }
    }

    pub fn controller(&self) -> &Arc<HedgingController<T>> {
        &self.controller
    }

    pub fn name(&self) -> &str {
        self.controller.name()
    }

    pub fn delay(&self) -> &HedgeDelay {
        &self.delay
    }

    /// Wraps this strategy as a tower layer sharing the same pools.
    pub fn layer(&self) -> HedgeLayer<T> {
        HedgeLayer::new(self.clone())
    }

    /// Runs `callback`, starting secondary attempts as delays elapse or
    /// attempts fail, and returns the first acceptable outcome.
    pub async fn execute(
        &self,
        callback: ResilienceCallback<T>,
        context: ResilienceContext,
    ) -> Outcome<T> {
        let mut hedging = self.controller.get_context(context.clone());
        let outcome = self.hedge(&mut hedging, &callback, &context).await;
        self.controller.complete(hedging);
        outcome
    }

    async fn hedge(
        &self,
        hedging: &mut HedgingExecutionContext<T>,
        callback: &ResilienceCallback<T>,
        context: &ResilienceContext,
    ) -> Outcome<T> {
        loop {
            if context.cancellation_token().is_cancelled() {
                return Outcome::from_error(OperationCanceledError);
            }

            let loaded = match hedging.load_execution(callback) {
                Ok(loaded) => loaded,
                Err(error) => return Outcome::from_error(error),
            };

            // Nothing new to start: wait for a running attempt instead of spinning.
            let delay = if loaded.is_loaded() {
                self.delay.get_delay(HedgingDelayGeneratorArguments {
                    context: context.clone(),
                    attempt_number: hedging.loaded_tasks() as u32,
                })
            } else {
                Duration::MAX
            };

            if let Some(outcome) = loaded.into_outcome() {
                return outcome;
            }

            let Some(index) = hedging.try_wait_for_completed_execution(delay).await else {
                continue;
            };

            if !hedging.tasks()[index].is_handled() {
                return hedging.accept(index);
            }
        }
    }
}

impl<T: Send + 'static> ResilienceStrategy<T> for HedgingStrategy<T> {
    fn execute_core<'a>(
        &'a self,
        callback: ResilienceCallback<T>,
        context: ResilienceContext,
    ) -> BoxFuture<'a, Outcome<T>> {
        self.execute(callback, context).boxed()
    }
}

impl<T> std::fmt::Debug for HedgingStrategy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HedgingStrategy")
            .field("controller", &self.controller)
            .field("delay", &self.delay)
            .finish()
    }
}
