//! One attempt of a hedged call.

use crate::args::{HedgingAction, HedgingActionGeneratorArguments, OnHedgingArguments};
use crate::error::HedgeError;
use crate::handler::HedgingHandler;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use strata_core::{
    panic_message, propagate_cancellation, CancellationToken, Outcome, OutcomeError,
    ResilienceCallback, ResilienceContext,
};
use tokio::task::JoinHandle;

/// Whether an attempt is the caller's own operation or a hedge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HedgedTaskType {
    Primary,
    Secondary,
}

struct AttemptResult<T> {
    outcome: Outcome<T>,
    handled: bool,
    execution_time: Duration,
}

/// A pooled slot running one attempt.
///
/// Each attempt gets a private context: a deep copy of the caller's
/// properties and its own cancellation token, which is canceled when the
/// caller's token is. Exactly one attempt of a call is accepted; its outcome
/// is moved out to the caller. The outcomes of all other attempts are
/// dropped when the slot is reset.
pub struct TaskExecution<T> {
    handler: Arc<HedgingHandler<T>>,
    task_type: HedgedTaskType,
    attempt_number: u32,
    context: Option<ResilienceContext>,
    cancellation: Option<CancellationToken>,
    task: Option<JoinHandle<AttemptResult<T>>>,
    outcome: Option<Outcome<T>>,
    is_completed: bool,
    is_handled: bool,
    is_accepted: bool,
    execution_time: Duration,
}

impl<T: Send + 'static> TaskExecution<T> {
    pub(crate) fn new(handler: Arc<HedgingHandler<T>>) -> Self {
        Self {
            handler,
            task_type: HedgedTaskType::Primary,
            attempt_number: 0,
            context: None,
            cancellation: None,
            task: None,
            outcome: None,
            is_completed: false,
            is_handled: false,
            is_accepted: false,
            execution_time: Duration::ZERO,
        }
    }

    /// Starts an attempt.
    ///
    /// Returns `false` without starting anything when the action generator
    /// declines a secondary attempt.
    pub(crate) fn initialize(
        &mut self,
        task_type: HedgedTaskType,
        primary: &ResilienceContext,
        callback: &ResilienceCallback<T>,
        attempt_number: u32,
    ) -> bool {
        let token = self.handler.tokens.get();
        let context = primary.snapshot_with_token(token.clone());

        let (action, hedging) = match task_type {
            HedgedTaskType::Primary => (callback.invoke(context.clone()), None),
            HedgedTaskType::Secondary => {
                let Some(action) = self.generate_action(primary, &context, callback, attempt_number)
                else {
                    self.handler.tokens.put(token);
                    return false;
                };
                self.handler.report_hedging(attempt_number);
                let hedging = OnHedgingArguments {
                    primary_context: primary.clone(),
                    action_context: context.clone(),
                    attempt_number,
                };
                (action, Some(hedging))
            }
        };

        self.task = Some(tokio::spawn(run_attempt(
            Arc::clone(&self.handler),
            action,
            hedging,
            attempt_number,
            primary.cancellation_token().clone(),
            token.clone(),
        )));
        self.task_type = task_type;
        self.attempt_number = attempt_number;
        self.context = Some(context);
        self.cancellation = Some(token);
        true
    }

    fn generate_action(
        &self,
        primary: &ResilienceContext,
        context: &ResilienceContext,
        callback: &ResilienceCallback<T>,
        attempt_number: u32,
    ) -> Option<HedgingAction<T>> {
        let args = HedgingActionGeneratorArguments {
            primary_context: primary.clone(),
            action_context: context.clone(),
            attempt_number,
            callback: callback.clone(),
        };

        match std::panic::catch_unwind(AssertUnwindSafe(|| (self.handler.action_generator)(args))) {
            Ok(action) => action,
            Err(payload) => {
                let error = HedgeError::PanickedAttempt {
                    attempt: attempt_number,
                    message: panic_message(&*payload),
                };
                Some(futures::future::ready(Outcome::from_error(error)).boxed())
            }
        }
    }
}

impl<T> TaskExecution<T> {
    pub fn task_type(&self) -> HedgedTaskType {
        self.task_type
    }

    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    /// The attempt's private context, while the slot is in use.
    pub fn context(&self) -> Option<&ResilienceContext> {
        self.context.as_ref()
    }

    /// The attempt's outcome; `None` while running or once accepted.
    pub fn outcome(&self) -> Option<&Outcome<T>> {
        self.outcome.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    /// Whether the outcome was classified as worth hedging.
    pub fn is_handled(&self) -> bool {
        self.is_handled
    }

    pub fn is_accepted(&self) -> bool {
        self.is_accepted
    }

    pub fn execution_time(&self) -> Duration {
        self.execution_time
    }

    /// Polls the running attempt, storing its outcome once it finishes.
    pub(crate) fn poll_completion(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let Some(task) = self.task.as_mut() else {
            return Poll::Ready(());
        };

        let joined = ready!(Pin::new(task).poll(cx));
        self.task = None;
        self.is_completed = true;
        match joined {
            Ok(attempt) => {
                self.outcome = Some(attempt.outcome);
                self.is_handled = attempt.handled;
                self.execution_time = attempt.execution_time;
            }
            Err(error) => {
                self.outcome = Some(Outcome::from_error(error));
                self.is_handled = true;
            }
        }
        Poll::Ready(())
    }

    /// Checks for completion without waiting.
    pub(crate) fn try_complete(&mut self) -> bool {
        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        self.poll_completion(&mut cx).is_ready() && self.is_completed
    }

    /// Moves the outcome out to the caller.
    ///
    /// # Panics
    ///
    /// Panics if the attempt has not completed or was already accepted.
    pub(crate) fn accept_outcome(&mut self) -> Outcome<T> {
        match (self.is_completed, self.outcome.take()) {
            (true, Some(outcome)) => {
                self.is_accepted = true;
                outcome
            }
            _ => panic!(
                "attempt {} cannot be accepted: it is still running or was already accepted",
                self.attempt_number
            ),
        }
    }

    /// Requests cancellation unless the outcome was accepted.
    pub(crate) fn cancel(&self) {
        if self.is_accepted {
            return;
        }
        if let Some(token) = &self.cancellation {
            token.cancel();
        }
    }

    /// Returns the slot to its pristine state.
    ///
    /// An outcome that was not accepted is dropped here. Returns `false`
    /// while the attempt is still running; such a slot must not be reused.
    pub(crate) fn reset(&mut self) -> bool {
        if self.task.is_some() {
            return false;
        }

        if let Some(token) = self.cancellation.take() {
            self.handler.tokens.put(token);
        }
        if let Some(context) = self.context.take() {
            context.properties().clear();
        }
        self.outcome = None;
        self.task_type = HedgedTaskType::Primary;
        self.attempt_number = 0;
        self.is_completed = false;
        self.is_handled = false;
        self.is_accepted = false;
        self.execution_time = Duration::ZERO;
        true
    }
}

impl<T> Drop for TaskExecution<T> {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.cancel();
        }
    }
}

impl<T> fmt::Debug for TaskExecution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskExecution")
            .field("task_type", &self.task_type)
            .field("attempt_number", &self.attempt_number)
            .field("is_running", &self.task.is_some())
            .field("is_completed", &self.is_completed)
            .field("is_handled", &self.is_handled)
            .field("is_accepted", &self.is_accepted)
            .finish()
    }
}

async fn run_attempt<T: Send + 'static>(
    handler: Arc<HedgingHandler<T>>,
    action: HedgingAction<T>,
    hedging: Option<OnHedgingArguments>,
    attempt: u32,
    caller: CancellationToken,
    token: CancellationToken,
) -> AttemptResult<T> {
    let started = handler.time.now();
    let on_hedging = handler.on_hedging.clone();

    let execution = async move {
        if let (Some(on_hedging), Some(args)) = (on_hedging, hedging) {
            if let Err(error) = on_hedging(args).await {
                return Outcome::Failure(OutcomeError::from_boxed(error));
            }
        }
        action.await
    };

    let outcome = match AssertUnwindSafe(propagate_cancellation(execution, &caller, &token))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(payload) => Outcome::from_error(HedgeError::PanickedAttempt {
            attempt,
            message: panic_message(&*payload),
        }),
    };

    let execution_time = handler.time.elapsed(started);
    let handled = handler.classifier.should_handle(&outcome);
    handler.report_attempt(attempt, execution_time, handled);

    AttemptResult {
        outcome,
        handled,
        execution_time,
    }
}
