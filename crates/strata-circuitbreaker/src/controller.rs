//! The circuit breaker state machine.

use crate::args::{
    BreakDurationGenerator, BreakDurationGeneratorArguments, CircuitCallback,
    OnCircuitClosedArguments, OnCircuitHalfOpenedArguments, OnCircuitOpenedArguments,
};
use crate::behavior::CircuitBehavior;
use crate::error::{
    BrokenCircuitError, CircuitBreakerError, IsolatedCircuitError, ScheduledTaskError,
};
use crate::events::CircuitBreakerEvent;
use crate::health::HealthInfo;
use crate::scheduler::{ScheduledTask, ScheduledTaskExecutor};
use crate::state::CircuitState;
use futures::future::BoxFuture;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use strata_core::{
    Deadline, EventListeners, ObjectDisposedError, OperationCanceledError, Outcome, OutcomeError,
    ResilienceContext, SharedTimeProvider,
};

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

pub(crate) struct ControllerOptions {
    pub(crate) name: String,
    pub(crate) behavior: CircuitBehavior,
    pub(crate) break_duration: Duration,
    pub(crate) break_duration_generator: Option<BreakDurationGenerator>,
    pub(crate) on_opened: Option<CircuitCallback<OnCircuitOpenedArguments>>,
    pub(crate) on_closed: Option<CircuitCallback<OnCircuitClosedArguments>>,
    pub(crate) on_half_opened: Option<CircuitCallback<OnCircuitHalfOpenedArguments>>,
    pub(crate) listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) time: SharedTimeProvider,
}

struct ControllerState {
    circuit_state: CircuitState,
    blocked_until: Deadline,
    last_outcome: Option<Outcome<()>>,
    half_open_attempts: u32,
    behavior: CircuitBehavior,
    disposed: bool,
}

/// Work produced under the state lock and carried out after it is released.
#[derive(Default)]
struct Effects {
    events: Vec<CircuitBreakerEvent>,
    task: Option<Result<ScheduledTask, ScheduledTaskError>>,
}

/// Owns the state of one circuit breaker.
///
/// Every mutation happens under a single lock, in the `*_needs_lock`
/// helpers. User callbacks are scheduled on a [`ScheduledTaskExecutor`]
/// while the lock is held and awaited after it is released, so they run in
/// transition order and never under the lock. A failing callback is
/// reported to the call that triggered it as
/// [`CircuitBreakerError::Callback`].
pub struct CircuitStateController {
    name: String,
    state: Mutex<ControllerState>,
    break_duration: Duration,
    break_duration_generator: Option<BreakDurationGenerator>,
    on_opened: Option<CircuitCallback<OnCircuitOpenedArguments>>,
    on_closed: Option<CircuitCallback<OnCircuitClosedArguments>>,
    on_half_opened: Option<CircuitCallback<OnCircuitHalfOpenedArguments>>,
    executor: ScheduledTaskExecutor,
    detached_fault: Arc<Mutex<Option<ScheduledTaskError>>>,
    listeners: EventListeners<CircuitBreakerEvent>,
    time: SharedTimeProvider,
}

impl CircuitStateController {
    pub(crate) fn new(options: ControllerOptions) -> Self {
        #[cfg(feature = "metrics")]
        gauge!(
            "circuitbreaker_state",
            "circuitbreaker" => options.name.clone(),
            "state" => CircuitState::Closed.as_str()
        )
        .set(1.0);

        Self {
            executor: ScheduledTaskExecutor::with_thread_name(format!(
                "circuit-callbacks-{}",
                options.name
            )),
            detached_fault: Arc::new(Mutex::new(None)),
            name: options.name,
            state: Mutex::new(ControllerState {
                circuit_state: CircuitState::Closed,
                blocked_until: Deadline::Elapsed,
                last_outcome: None,
                half_open_attempts: 0,
                behavior: options.behavior,
                disposed: false,
            }),
            break_duration: options.break_duration,
            break_duration_generator: options.break_duration_generator,
            on_opened: options.on_opened,
            on_closed: options.on_closed,
            on_half_opened: options.on_half_opened,
            listeners: options.listeners,
            time: options.time,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    pub fn circuit_state(&self) -> CircuitState {
        self.state.lock().circuit_state
    }

    /// Error of the last handled outcome, if it was a failure.
    pub fn last_error(&self) -> Option<OutcomeError> {
        self.state
            .lock()
            .last_outcome
            .as_ref()
            .and_then(Outcome::error)
            .cloned()
    }

    /// The last handled outcome since the circuit was closed.
    ///
    /// Only the failure side is kept. An outcome handled because of its
    /// result value is recorded as `Outcome::Success(())`; the value itself
    /// belongs to the caller.
    pub fn last_handled_outcome(&self) -> Option<Outcome<()>> {
        self.state.lock().last_outcome.clone()
    }

    /// Health as currently sampled by the behavior.
    pub fn health_info(&self) -> HealthInfo {
        self.state.lock().behavior.health_info()
    }

    /// Half-open test calls admitted since the circuit was last closed.
    pub fn half_open_attempts(&self) -> u32 {
        self.state.lock().half_open_attempts
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Holds the circuit open until [`close`](Self::close) is called.
    ///
    /// Isolating an isolated circuit keeps it isolated.
    pub async fn isolate(&self, context: &ResilienceContext) -> Result<(), CircuitBreakerError> {
        let effects = {
            let mut state = self.lock_live()?;
            let mut effects = Effects::default();
            self.isolate_needs_lock(&mut state, context, &mut effects);
            effects
        };
        self.apply(effects).await
    }

    /// Closes the circuit manually, resetting the behavior's counters.
    pub async fn close(&self, context: &ResilienceContext) -> Result<(), CircuitBreakerError> {
        let effects = {
            let mut state = self.lock_live()?;
            let mut effects = Effects::default();
            let outcome = Outcome::Success(());
            self.close_circuit_needs_lock(&mut state, outcome, true, context, &mut effects);
            effects
        };
        self.apply(effects).await
    }

    /// Decides whether a call may proceed.
    ///
    /// Returns the rejection outcome when it may not. While open, the first
    /// caller to arrive once the break duration has elapsed moves the circuit
    /// to half-open and is let through as the test call. The break deadline
    /// is pushed out by a full break duration, so no other caller gets
    /// through until the test resolves or that duration elapses again, in
    /// which case one more test call is admitted.
    pub async fn on_action_pre_execute<T>(
        &self,
        context: &ResilienceContext,
    ) -> Result<Option<Outcome<T>>, CircuitBreakerError> {
        let (rejection, effects) = {
            let mut state = self.lock_live()?;
            let mut effects = Effects::default();

            if context.cancellation_token().is_cancelled() {
                return Ok(Some(Outcome::from_error(OperationCanceledError)));
            }

            let mut is_test_call = false;
            if matches!(state.circuit_state, CircuitState::Open | CircuitState::HalfOpen)
                && self.permit_half_open_needs_lock(&mut state)
            {
                if state.circuit_state == CircuitState::Open {
                    self.half_open_circuit_needs_lock(&mut state, context, &mut effects);
                }
                is_test_call = true;
            }

            let rejection = match state.circuit_state {
                CircuitState::Open => Some(self.broken_circuit_error_needs_lock(&state)),
                CircuitState::HalfOpen if !is_test_call => {
                    Some(self.broken_circuit_error_needs_lock(&state))
                }
                CircuitState::Isolated => Some(OutcomeError::new(IsolatedCircuitError)),
                CircuitState::Closed | CircuitState::HalfOpen => None,
            };

            if rejection.is_some() {
                effects.events.push(CircuitBreakerEvent::CallRejected {
                    pattern_name: self.name.clone(),
                    timestamp: self.time.now(),
                    state: state.circuit_state,
                });
            }

            (rejection, effects)
        };

        self.apply(effects).await?;
        Ok(rejection.map(Outcome::Failure))
    }

    /// Records an outcome that was not handled; closes a half-open circuit.
    pub fn on_action_success<T>(
        &self,
        outcome: &Outcome<T>,
        context: &ResilienceContext,
    ) -> BoxFuture<'_, Result<(), CircuitBreakerError>> {
        Box::pin(self.record_success(outcome.erase(), context.clone()))
    }

    /// Records a handled outcome; may open the circuit.
    ///
    /// A failure of the half-open test call reopens the circuit. A failure
    /// while closed opens it when the behavior says so. Failures observed
    /// while open or isolated never extend the break.
    pub fn on_action_failure<T>(
        &self,
        outcome: &Outcome<T>,
        context: &ResilienceContext,
    ) -> BoxFuture<'_, Result<(), CircuitBreakerError>> {
        Box::pin(self.record_failure(outcome.erase(), context.clone()))
    }

    /// Disposes the controller and its callback executor.
    ///
    /// Later operations fail with [`CircuitBreakerError::Disposed`].
    pub fn dispose(&self) {
        self.state.lock().disposed = true;
        self.executor.dispose();
    }

    /// Isolates the circuit without waiting for the `on_opened` callback.
    ///
    /// No caller observes the callback, so its failure is logged and kept
    /// for [`take_detached_fault`](Self::take_detached_fault).
    pub(crate) fn isolate_detached(&self) {
        let effects = {
            let mut state = self.state.lock();
            let mut effects = Effects::default();
            self.isolate_needs_lock(&mut state, &ResilienceContext::new(), &mut effects);
            effects
        };
        for event in &effects.events {
            self.report(event);
        }

        let task = match effects.task {
            Some(Ok(task)) => task,
            Some(Err(error)) => {
                self.record_detached_fault(error);
                return;
            }
            None => return,
        };

        // Queued behind the callback, so it only runs once the callback is done.
        let slot = Arc::clone(&self.detached_fault);
        #[cfg(feature = "tracing")]
        let name = self.name.clone();
        let watcher = self.executor.schedule(move || async move {
            if let Err(error) = task.await {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    circuitbreaker = %name,
                    error = %error,
                    "Detached circuit callback failed"
                );
                *slot.lock() = Some(error);
            }
            Ok(())
        });
        if let Err(error) = watcher {
            self.record_detached_fault(error);
        }
    }

    /// Takes the failure of a callback that ran with no caller to report to.
    ///
    /// Only the `on_opened` callback of a breaker that starts isolated runs
    /// that way.
    pub fn take_detached_fault(&self) -> Option<ScheduledTaskError> {
        self.detached_fault.lock().take()
    }

    fn record_detached_fault(&self, error: ScheduledTaskError) {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            circuitbreaker = %self.name,
            error = %error,
            "Detached circuit callback failed"
        );
        *self.detached_fault.lock() = Some(error);
    }

    async fn record_success(
        &self,
        outcome: Outcome<()>,
        context: ResilienceContext,
    ) -> Result<(), CircuitBreakerError> {
        let effects = {
            let mut state = self.lock_live()?;
            let mut effects = Effects::default();
            let current = state.circuit_state;

            state.behavior.on_action_success(current);
            effects.events.push(CircuitBreakerEvent::SuccessRecorded {
                pattern_name: self.name.clone(),
                timestamp: self.time.now(),
                state: current,
            });

            if current == CircuitState::HalfOpen {
                self.close_circuit_needs_lock(&mut state, outcome, false, &context, &mut effects);
            }
            effects
        };
        self.apply(effects).await
    }

    async fn record_failure(
        &self,
        outcome: Outcome<()>,
        context: ResilienceContext,
    ) -> Result<(), CircuitBreakerError> {
        let effects = {
            let mut state = self.lock_live()?;
            let mut effects = Effects::default();
            let current = state.circuit_state;

            state.last_outcome = Some(outcome.clone());
            let should_break = state.behavior.on_action_failure(current);
            effects.events.push(CircuitBreakerEvent::FailureRecorded {
                pattern_name: self.name.clone(),
                timestamp: self.time.now(),
                state: current,
            });

            if current == CircuitState::HalfOpen
                || (current == CircuitState::Closed && should_break)
            {
                self.open_circuit_needs_lock(&mut state, outcome, false, &context, &mut effects);
            }
            effects
        };
        self.apply(effects).await
    }

    fn lock_live(&self) -> Result<MutexGuard<'_, ControllerState>, CircuitBreakerError> {
        let state = self.state.lock();
        if state.disposed {
            return Err(ObjectDisposedError::new("CircuitStateController").into());
        }
        Ok(state)
    }

    fn isolate_needs_lock(
        &self,
        state: &mut ControllerState,
        context: &ResilienceContext,
        effects: &mut Effects,
    ) {
        state.last_outcome = Some(Outcome::from_error(IsolatedCircuitError));
        self.open_circuit_for_needs_lock(
            state,
            Outcome::Success(()),
            Duration::MAX,
            true,
            CircuitState::Isolated,
            context,
            effects,
        );
    }

    fn permit_half_open_needs_lock(&self, state: &mut ControllerState) -> bool {
        let now = self.time.now();
        if state.blocked_until.has_passed(now) {
            state.blocked_until = Deadline::after(now, self.break_duration);
            return true;
        }
        false
    }

    fn broken_circuit_error_needs_lock(&self, state: &ControllerState) -> OutcomeError {
        let retry_after = state.blocked_until.remaining(self.time.now());
        let error = BrokenCircuitError::new(retry_after);
        let error = match state.last_outcome.as_ref().and_then(Outcome::error) {
            Some(last_error) => error.with_last_error(last_error.clone()),
            None => error,
        };
        OutcomeError::new(error)
    }

    fn open_circuit_needs_lock(
        &self,
        state: &mut ControllerState,
        outcome: Outcome<()>,
        manual: bool,
        context: &ResilienceContext,
        effects: &mut Effects,
    ) {
        let break_duration = match &self.break_duration_generator {
            Some(generator) => {
                let health = state.behavior.health_info();
                generator(BreakDurationGeneratorArguments {
                    context: context.clone(),
                    failure_rate: health.failure_rate,
                    failure_count: health.failure_count,
                    half_open_attempts: state.half_open_attempts,
                })
            }
            None => self.break_duration,
        };

        self.open_circuit_for_needs_lock(
            state,
            outcome,
            break_duration,
            manual,
            CircuitState::Open,
            context,
            effects,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn open_circuit_for_needs_lock(
        &self,
        state: &mut ControllerState,
        outcome: Outcome<()>,
        break_duration: Duration,
        manual: bool,
        target: CircuitState,
        context: &ResilienceContext,
        effects: &mut Effects,
    ) {
        let now = self.time.now();
        state.blocked_until = Deadline::after(now, break_duration);

        let previous = state.circuit_state;
        state.circuit_state = target;
        self.transition(previous, target, manual, Some(break_duration), effects);

        if let Some(on_opened) = &self.on_opened {
            let on_opened = Arc::clone(on_opened);
            let args = OnCircuitOpenedArguments {
                context: context.clone(),
                outcome,
                break_duration,
                is_manual: manual,
            };
            effects.task = Some(self.executor.schedule(move || on_opened(args)));
        }
    }

    fn close_circuit_needs_lock(
        &self,
        state: &mut ControllerState,
        outcome: Outcome<()>,
        manual: bool,
        context: &ResilienceContext,
        effects: &mut Effects,
    ) {
        state.blocked_until = Deadline::Elapsed;
        state.last_outcome = None;
        state.half_open_attempts = 0;

        let previous = state.circuit_state;
        state.circuit_state = CircuitState::Closed;
        state.behavior.on_circuit_closed();

        if previous == CircuitState::Closed {
            return;
        }
        self.transition(previous, CircuitState::Closed, manual, None, effects);

        if let Some(on_closed) = &self.on_closed {
            let on_closed = Arc::clone(on_closed);
            let args = OnCircuitClosedArguments {
                context: context.clone(),
                outcome,
                is_manual: manual,
            };
            effects.task = Some(self.executor.schedule(move || on_closed(args)));
        }
    }

    fn half_open_circuit_needs_lock(
        &self,
        state: &mut ControllerState,
        context: &ResilienceContext,
        effects: &mut Effects,
    ) {
        state.circuit_state = CircuitState::HalfOpen;
        state.half_open_attempts = state.half_open_attempts.saturating_add(1);
        self.transition(CircuitState::Open, CircuitState::HalfOpen, false, None, effects);

        if let Some(on_half_opened) = &self.on_half_opened {
            let on_half_opened = Arc::clone(on_half_opened);
            let args = OnCircuitHalfOpenedArguments {
                context: context.clone(),
            };
            effects.task = Some(self.executor.schedule(move || on_half_opened(args)));
        }
    }

    fn transition(
        &self,
        from_state: CircuitState,
        to_state: CircuitState,
        manual: bool,
        break_duration: Option<Duration>,
        effects: &mut Effects,
    ) {
        effects.events.push(CircuitBreakerEvent::StateTransition {
            pattern_name: self.name.clone(),
            timestamp: self.time.now(),
            from_state,
            to_state,
            manual,
            break_duration,
        });
    }

    async fn apply(&self, effects: Effects) -> Result<(), CircuitBreakerError> {
        for event in &effects.events {
            self.report(event);
        }

        match effects.task {
            Some(Ok(task)) => task.await.map_err(CircuitBreakerError::Callback),
            Some(Err(error)) => Err(CircuitBreakerError::Callback(error)),
            None => Ok(()),
        }
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn report(&self, event: &CircuitBreakerEvent) {
        match event {
            CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                manual,
                break_duration,
                ..
            } => {
                #[cfg(feature = "tracing")]
                self.trace_transition(*from_state, *to_state, *manual, *break_duration);

                #[cfg(feature = "metrics")]
                {
                    counter!(
                        "circuitbreaker_transitions_total",
                        "circuitbreaker" => self.name.clone(),
                        "from" => from_state.as_str(),
                        "to" => to_state.as_str()
                    )
                    .increment(1);

                    for state in CircuitState::ALL {
                        gauge!(
                            "circuitbreaker_state",
                            "circuitbreaker" => self.name.clone(),
                            "state" => state.as_str()
                        )
                        .set(if state == *to_state { 1.0 } else { 0.0 });
                    }
                }
            }
            CircuitBreakerEvent::CallRejected { state, .. } => {
                #[cfg(feature = "tracing")]
                tracing::debug!(circuitbreaker = %self.name, state = %state, "Call rejected");

                #[cfg(feature = "metrics")]
                counter!(
                    "circuitbreaker_calls_total",
                    "circuitbreaker" => self.name.clone(),
                    "outcome" => "rejected"
                )
                .increment(1);
            }
            CircuitBreakerEvent::SuccessRecorded { .. } => {
                #[cfg(feature = "metrics")]
                counter!(
                    "circuitbreaker_calls_total",
                    "circuitbreaker" => self.name.clone(),
                    "outcome" => "success"
                )
                .increment(1);
            }
            CircuitBreakerEvent::FailureRecorded { state, .. } => {
                #[cfg(feature = "tracing")]
                tracing::trace!(circuitbreaker = %self.name, state = %state, "Failure recorded");

                #[cfg(feature = "metrics")]
                counter!(
                    "circuitbreaker_calls_total",
                    "circuitbreaker" => self.name.clone(),
                    "outcome" => "failure"
                )
                .increment(1);
            }
        }

        self.listeners.emit(event);
    }
}

#[cfg(feature = "tracing")]
impl CircuitStateController {
    fn trace_transition(
        &self,
        from: CircuitState,
        to: CircuitState,
        manual: bool,
        break_duration: Option<Duration>,
    ) {
        match to {
            CircuitState::Open | CircuitState::Isolated => tracing::error!(
                circuitbreaker = %self.name,
                from = %from,
                to = %to,
                manual,
                break_duration = ?break_duration,
                "Circuit opened"
            ),
            CircuitState::HalfOpen => tracing::warn!(
                circuitbreaker = %self.name,
                from = %from,
                to = %to,
                "Circuit half-opened"
            ),
            CircuitState::Closed => tracing::info!(
                circuitbreaker = %self.name,
                from = %from,
                manual,
                "Circuit closed"
            ),
        }
    }
}

impl fmt::Debug for CircuitStateController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitStateController")
            .field("name", &self.name)
            .field("state", &self.circuit_state())
            .field("break_duration", &self.break_duration)
            .finish()
    }
}
