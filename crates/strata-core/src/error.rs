//! Error types shared by every strategy.

use std::any::Any;
use thiserror::Error;

/// Returned when a strategy builder is given an out-of-range option.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid `{option}` option: {reason}")]
pub struct ConfigError {
    /// Name of the offending option.
    pub option: &'static str,
    /// Why the value was rejected.
    pub reason: String,
}

impl ConfigError {
    /// Creates a new configuration error.
    pub fn new(option: &'static str, reason: impl Into<String>) -> Self {
        Self {
            option,
            reason: reason.into(),
        }
    }
}

/// The operation was canceled through its cancellation token.
///
/// Classifiers treat this error as a cooperative stop rather than a fault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("the operation was canceled")]
pub struct OperationCanceledError;

/// An object was used after it was disposed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot access a disposed object: {object}")]
pub struct ObjectDisposedError {
    /// Name of the disposed object.
    pub object: &'static str,
}

impl ObjectDisposedError {
    /// Creates a new disposed-object error.
    pub fn new(object: &'static str) -> Self {
        Self { object }
    }
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
