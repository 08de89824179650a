//! Error types for the hedging strategy.

use thiserror::Error;

/// Failures produced by the hedging machinery itself.
///
/// Errors of the hedged operation are never wrapped; they reach the caller
/// unchanged through the accepted attempt's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HedgeError {
    /// Not even the primary attempt could be started.
    #[error("no hedged execution could be loaded")]
    NoExecutionLoaded,

    /// The execution context was used before it was bound to a caller context.
    #[error("the hedging execution context is not initialized")]
    NotInitialized,

    /// An attempt panicked; the panic is reported as that attempt's outcome.
    #[error("hedged attempt {attempt} panicked: {message}")]
    PanickedAttempt { attempt: u32, message: String },
}

impl HedgeError {
    /// Returns `true` if an attempt panicked.
    pub fn is_panic(&self) -> bool {
        matches!(self, HedgeError::PanickedAttempt { .. })
    }
}
