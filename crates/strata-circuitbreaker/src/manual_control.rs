//! Manual isolation and reset of a circuit breaker.

use crate::controller::CircuitStateController;
use crate::error::CircuitBreakerError;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use strata_core::{ObjectDisposedError, ResilienceContext};

#[derive(Default)]
struct ManualControlState {
    controller: Option<Weak<CircuitStateController>>,
    isolated: bool,
}

/// Isolates or resets the circuit breaker it is bound to.
///
/// A control binds to at most one breaker, when that breaker is built.
/// Calling [`isolate`](Self::isolate) before binding marks the control, and
/// the breaker it is later bound to starts isolated.
///
/// ```rust
/// use strata_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerManualControl, CircuitState};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let control = CircuitBreakerManualControl::new();
/// let breaker = CircuitBreakerConfig::<String>::builder()
///     .manual_control(&control)
///     .build();
///
/// control.isolate().await.unwrap();
/// assert_eq!(breaker.circuit_state(), CircuitState::Isolated);
///
/// control.reset().await.unwrap();
/// assert_eq!(breaker.circuit_state(), CircuitState::Closed);
/// # }
/// ```
#[derive(Clone, Default)]
pub struct CircuitBreakerManualControl {
    inner: Arc<Mutex<ManualControlState>>,
}

impl CircuitBreakerManualControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the control is bound to a breaker.
    pub fn is_bound(&self) -> bool {
        self.inner.lock().controller.is_some()
    }

    /// True while the control holds its breaker isolated.
    pub fn is_isolated(&self) -> bool {
        self.inner.lock().isolated
    }

    /// Isolates the bound breaker, or marks the control if none is bound yet.
    pub async fn isolate(&self) -> Result<(), CircuitBreakerError> {
        let controller = {
            let mut inner = self.inner.lock();
            inner.isolated = true;
            Self::upgrade(&inner)?
        };

        match controller {
            Some(controller) => controller.isolate(&ResilienceContext::new()).await,
            None => Ok(()),
        }
    }

    /// Closes the bound breaker and clears the isolation mark.
    pub async fn reset(&self) -> Result<(), CircuitBreakerError> {
        let controller = {
            let mut inner = self.inner.lock();
            inner.isolated = false;
            Self::upgrade(&inner)?
        };

        match controller {
            Some(controller) => controller.close(&ResilienceContext::new()).await,
            None => Ok(()),
        }
    }

    /// Binds the control; returns whether the breaker must start isolated.
    pub(crate) fn bind(
        &self,
        controller: &Arc<CircuitStateController>,
    ) -> Result<bool, CircuitBreakerError> {
        let mut inner = self.inner.lock();
        if inner.controller.is_some() {
            return Err(CircuitBreakerError::AlreadyInitialized(
                "CircuitBreakerManualControl",
            ));
        }
        inner.controller = Some(Arc::downgrade(controller));
        Ok(inner.isolated)
    }

    fn upgrade(
        inner: &ManualControlState,
    ) -> Result<Option<Arc<CircuitStateController>>, CircuitBreakerError> {
        match &inner.controller {
            None => Ok(None),
            Some(weak) => weak
                .upgrade()
                .map(Some)
                .ok_or_else(|| ObjectDisposedError::new("CircuitStateController").into()),
        }
    }
}

impl std::fmt::Debug for CircuitBreakerManualControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreakerManualControl")
            .field("bound", &inner.controller.is_some())
            .field("isolated", &inner.isolated)
            .finish()
    }
}
