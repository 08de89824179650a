use std::time::Duration;
use strata_core::{ObjectDisposedError, OutcomeError};
use thiserror::Error;

/// Returned instead of calling the operation while the circuit is open.
#[derive(Debug, Clone, Error)]
#[error("the circuit is now open and is not allowing calls{}", retry_hint(.retry_after))]
pub struct BrokenCircuitError {
    retry_after: Option<Duration>,
    #[source]
    last_error: Option<OutcomeError>,
}

impl BrokenCircuitError {
    pub fn new(retry_after: Option<Duration>) -> Self {
        Self {
            retry_after,
            last_error: None,
        }
    }

    /// Attaches the failure that caused the circuit to open.
    pub fn with_last_error(mut self, error: OutcomeError) -> Self {
        self.last_error = Some(error);
        self
    }

    /// Time until the circuit admits a test call, if known.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// The handled failure that opened the circuit, if it was an error.
    pub fn last_error(&self) -> Option<&OutcomeError> {
        self.last_error.as_ref()
    }
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(after) => format!("; it can be retried after {after:?}"),
        None => String::new(),
    }
}

/// Returned instead of calling the operation while the circuit is isolated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("the circuit is manually held open and is not allowing calls")]
pub struct IsolatedCircuitError;

/// A scheduled callback did not complete successfully.
#[derive(Debug, Clone, Error)]
pub enum ScheduledTaskError {
    /// The executor was disposed before the task started.
    #[error("scheduled task was canceled before it started")]
    Canceled,

    /// The task returned an error or panicked.
    #[error("scheduled task failed: {0}")]
    Faulted(#[source] OutcomeError),

    #[error(transparent)]
    Disposed(#[from] ObjectDisposedError),
}

/// A scheduled callback panicked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("scheduled task panicked: {message}")]
pub struct CallbackPanicked {
    pub message: String,
}

/// Errors returned by the circuit state controller and its control handles.
#[derive(Debug, Clone, Error)]
pub enum CircuitBreakerError {
    #[error(transparent)]
    Disposed(#[from] ObjectDisposedError),

    /// A manual control or state provider was bound to a second breaker.
    #[error("{0} is already bound to a circuit breaker")]
    AlreadyInitialized(&'static str),

    /// A user callback (`on_opened`, `on_closed`, `on_half_opened`) failed.
    #[error("circuit breaker callback failed: {0}")]
    Callback(#[source] ScheduledTaskError),
}

impl CircuitBreakerError {
    pub fn is_disposed(&self) -> bool {
        matches!(self, CircuitBreakerError::Disposed(_))
    }
}
