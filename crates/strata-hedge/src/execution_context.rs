//! The state of one hedged call.

use crate::error::HedgeError;
use crate::handler::HedgingHandler;
use crate::task_execution::{HedgedTaskType, TaskExecution};
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;
use strata_core::{ObjectPool, Outcome, ResilienceCallback, ResilienceContext};

/// Result of [`HedgingExecutionContext::load_execution`].
#[derive(Debug)]
pub struct ExecutionInfo<T> {
    loaded: bool,
    outcome: Option<Outcome<T>>,
}

impl<T> ExecutionInfo<T> {
    /// Whether a new attempt was started.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// The final outcome, when nothing could be loaded and every attempt
    /// has already finished.
    pub fn outcome(&self) -> Option<&Outcome<T>> {
        self.outcome.as_ref()
    }

    pub fn into_outcome(self) -> Option<Outcome<T>> {
        self.outcome
    }
}

/// Tracks the attempts of one hedged call.
///
/// Attempts are kept in launch order; the primary is always first. When
/// several attempts have finished, the earliest one in that order is
/// reported first.
pub struct HedgingExecutionContext<T> {
    handler: Arc<HedgingHandler<T>>,
    executions: Arc<ObjectPool<TaskExecution<T>>>,
    max_attempts: usize,
    primary: Option<ResilienceContext>,
    tasks: Vec<TaskExecution<T>>,
    /// Indices into `tasks` of attempts not yet reported as finished.
    executing: Vec<usize>,
}

impl<T: Send + 'static> HedgingExecutionContext<T> {
    pub(crate) fn new(
        handler: Arc<HedgingHandler<T>>,
        executions: Arc<ObjectPool<TaskExecution<T>>>,
        max_attempts: usize,
    ) -> Self {
        Self {
            handler,
            executions,
            max_attempts,
            primary: None,
            tasks: Vec::new(),
            executing: Vec::new(),
        }
    }

    /// Binds the context to the caller's context.
    pub fn initialize(&mut self, primary: ResilienceContext) {
        self.tasks.clear();
        self.executing.clear();
        self.primary = Some(primary);
    }

    pub fn primary_context(&self) -> Option<&ResilienceContext> {
        self.primary.as_ref()
    }

    /// Number of attempts started so far.
    pub fn loaded_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn tasks(&self) -> &[TaskExecution<T>] {
        &self.tasks
    }

    /// Starts the next attempt: the primary first, then secondaries.
    ///
    /// When no attempt can be started and every started attempt has
    /// finished, the first of them is accepted and its outcome returned.
    pub fn load_execution(
        &mut self,
        callback: &ResilienceCallback<T>,
    ) -> Result<ExecutionInfo<T>, HedgeError> {
        let primary = self.primary.clone().ok_or(HedgeError::NotInitialized)?;

        if self.tasks.len() >= self.max_attempts {
            return self.no_execution();
        }

        let task_type = if self.tasks.is_empty() {
            HedgedTaskType::Primary
        } else {
            HedgedTaskType::Secondary
        };

        let attempt_number = self.tasks.len() as u32;
        let mut execution = self.executions.get();
        if !execution.initialize(task_type, &primary, callback, attempt_number) {
            self.executions.put(execution);
            return self.no_execution();
        }

        self.executing.push(self.tasks.len());
        self.tasks.push(execution);
        Ok(ExecutionInfo {
            loaded: true,
            outcome: None,
        })
    }

    fn no_execution(&mut self) -> Result<ExecutionInfo<T>, HedgeError> {
        if !self.executing.is_empty() {
            return Ok(ExecutionInfo {
                loaded: false,
                outcome: None,
            });
        }

        let index = self
            .tasks
            .iter()
            .position(TaskExecution::is_completed)
            .ok_or(HedgeError::NoExecutionLoaded)?;

        Ok(ExecutionInfo {
            loaded: false,
            outcome: Some(self.accept(index)),
        })
    }

    /// Waits up to `delay` for an attempt to finish and returns its index.
    ///
    /// - an attempt that already finished is returned immediately;
    /// - once every attempt is started, or for `Duration::MAX`, waits for
    ///   the next attempt to finish however long it takes;
    /// - a zero delay never waits;
    /// - otherwise returns `None` when the delay elapses or the caller is
    ///   canceled first.
    pub async fn try_wait_for_completed_execution(&mut self, delay: Duration) -> Option<usize> {
        if let Some(index) = self.try_remove_executed() {
            return Some(index);
        }

        if self.tasks.len() >= self.max_attempts || delay == Duration::MAX {
            self.wait_for_any().await;
            return self.try_remove_executed();
        }

        if delay.is_zero() || self.tasks.is_empty() {
            return None;
        }

        let caller = self.primary.as_ref()?.cancellation_token().clone();
        let timer = self.handler.time.delay(delay);
        let finished = tokio::select! {
            _ = self.wait_for_any() => true,
            _ = timer => false,
            _ = caller.cancelled() => false,
        };

        if finished {
            self.try_remove_executed()
        } else {
            None
        }
    }

    /// Accepts the outcome of the attempt at `index`.
    ///
    /// # Panics
    ///
    /// Panics if that attempt has not finished or was already accepted.
    pub fn accept(&mut self, index: usize) -> Outcome<T> {
        self.tasks[index].accept_outcome()
    }

    /// Ends the call: copies the accepted attempt's properties back into the
    /// caller's context and cancels every other attempt.
    pub fn complete(&mut self) {
        let accepted = self.tasks.iter().find(|task| task.is_accepted());
        if let (Some(primary), Some(accepted)) = (&self.primary, accepted) {
            if let Some(context) = accepted.context() {
                primary.properties().merge_from(context.properties());
            }
        }

        for task in &self.tasks {
            task.cancel();
        }
    }

    pub(crate) fn has_running(&self) -> bool {
        self.tasks.iter().any(TaskExecution::is_running)
    }

    /// Waits for every attempt to stop.
    pub(crate) async fn drain(&mut self) {
        for task in &mut self.tasks {
            futures::future::poll_fn(|cx| task.poll_completion(cx)).await;
        }
    }

    /// Returns every attempt slot to its pool and unbinds the caller.
    pub(crate) fn reset(&mut self) -> bool {
        for task in self.tasks.drain(..) {
            self.executions.put(task);
        }
        self.executing.clear();
        self.primary = None;
        true
    }

    fn try_remove_executed(&mut self) -> Option<usize> {
        let tasks = &mut self.tasks;
        let position = self.executing.iter().position(|&i| tasks[i].try_complete())?;
        Some(self.executing.remove(position))
    }

    async fn wait_for_any(&mut self) {
        if self.executing.is_empty() {
            return;
        }

        let tasks = &mut self.tasks;
        let executing = &self.executing;
        futures::future::poll_fn(|cx| {
            let mut finished = false;
            for &index in executing {
                if tasks[index].poll_completion(cx).is_ready() {
                    finished = true;
                }
            }
            if finished {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await
    }
}

impl<T> std::fmt::Debug for HedgingExecutionContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HedgingExecutionContext")
            .field("max_attempts", &self.max_attempts)
            .field("tasks", &self.tasks)
            .field("executing", &self.executing)
            .finish()
    }
}
