//! Pools of hedging contexts and attempt slots.

use crate::execution_context::HedgingExecutionContext;
use crate::handler::HedgingHandler;
use crate::task_execution::TaskExecution;
use std::sync::Arc;
use strata_core::{ObjectPool, ResilienceContext};

/// Hands out [`HedgingExecutionContext`]s and takes them back once a call
/// ends.
///
/// Attempts that lose the race may still be running when the call returns.
/// Their context is then drained in the background and only returned to the
/// pool once every attempt has stopped.
pub struct HedgingController<T> {
    handler: Arc<HedgingHandler<T>>,
    executions: Arc<ObjectPool<TaskExecution<T>>>,
    contexts: Arc<ObjectPool<HedgingExecutionContext<T>>>,
    max_hedged_attempts: usize,
}

impl<T: Send + 'static> HedgingController<T> {
    pub(crate) fn new(handler: HedgingHandler<T>, max_hedged_attempts: usize) -> Self {
        let handler = Arc::new(handler);

        let slot_handler = Arc::clone(&handler);
        let executions = ObjectPool::new(
            move || TaskExecution::new(Arc::clone(&slot_handler)),
            TaskExecution::reset,
        );
        // Room for every attempt of each context the context pool retains.
        let retained = executions.max_retained().saturating_mul(max_hedged_attempts);
        let executions = Arc::new(executions.with_max_retained(retained));

        let context_handler = Arc::clone(&handler);
        let context_executions = Arc::clone(&executions);
        let contexts = Arc::new(ObjectPool::new(
            move || {
                HedgingExecutionContext::new(
                    Arc::clone(&context_handler),
                    Arc::clone(&context_executions),
                    max_hedged_attempts,
                )
            },
            HedgingExecutionContext::reset,
        ));

        Self {
            handler,
            executions,
            contexts,
            max_hedged_attempts,
        }
    }

    pub fn name(&self) -> &str {
        &self.handler.name
    }

    /// Total attempts per call, the primary included.
    pub fn max_hedged_attempts(&self) -> usize {
        self.max_hedged_attempts
    }

    /// Rents a context bound to the caller's context.
    pub fn get_context(&self, primary: ResilienceContext) -> HedgingExecutionContext<T> {
        let mut context = self.contexts.get();
        context.initialize(primary);
        context
    }

    /// Completes the call and returns the context to the pool.
    pub fn complete(&self, mut context: HedgingExecutionContext<T>) {
        context.complete();

        if !context.has_running() {
            self.contexts.put(context);
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let contexts = Arc::clone(&self.contexts);
        runtime.spawn(async move {
            context.drain().await;
            contexts.put(context);
        });
    }

    /// Idle contexts waiting in the pool.
    pub fn idle_contexts(&self) -> usize {
        self.contexts.len()
    }

    /// Idle attempt slots waiting in the pool.
    pub fn idle_executions(&self) -> usize {
        self.executions.len()
    }
}

impl<T> std::fmt::Debug for HedgingController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HedgingController")
            .field("name", &self.handler.name)
            .field("max_hedged_attempts", &self.max_hedged_attempts)
            .finish()
    }
}
