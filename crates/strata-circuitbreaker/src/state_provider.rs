//! Read-only view of a circuit breaker's state.

use crate::controller::CircuitStateController;
use crate::error::CircuitBreakerError;
use crate::state::CircuitState;
use std::sync::{Arc, OnceLock, Weak};
use strata_core::Outcome;

/// Reports the state of the circuit breaker it is bound to.
///
/// Before binding, and after the breaker is dropped, the provider reports
/// [`CircuitState::Closed`] and no last outcome.
#[derive(Clone, Default)]
pub struct CircuitBreakerStateProvider {
    controller: Arc<OnceLock<Weak<CircuitStateController>>>,
}

impl CircuitBreakerStateProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self) -> bool {
        self.controller.get().is_some()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.live()
            .map_or(CircuitState::Closed, |controller| controller.circuit_state())
    }

    /// The last handled outcome, with any result value erased.
    ///
    /// See [`CircuitStateController::last_handled_outcome`].
    pub fn last_handled_outcome(&self) -> Option<Outcome<()>> {
        self.live()?.last_handled_outcome()
    }

    pub(crate) fn bind(
        &self,
        controller: &Arc<CircuitStateController>,
    ) -> Result<(), CircuitBreakerError> {
        self.controller
            .set(Arc::downgrade(controller))
            .map_err(|_| CircuitBreakerError::AlreadyInitialized("CircuitBreakerStateProvider"))
    }

    fn live(&self) -> Option<Arc<CircuitStateController>> {
        self.controller.get()?.upgrade()
    }
}

impl std::fmt::Debug for CircuitBreakerStateProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerStateProvider")
            .field("bound", &self.is_bound())
            .field("state", &self.circuit_state())
            .finish()
    }
}
