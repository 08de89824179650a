//! Outcome classification.
//!
//! A classifier decides whether an [`Outcome`] is *handled*: a handled
//! outcome counts as a failure for a circuit breaker and triggers another
//! attempt for hedging.

use crate::error::OperationCanceledError;
use crate::outcome::Outcome;
use std::sync::Arc;

/// Decides whether an outcome should be handled by a strategy.
pub trait OutcomeClassifier<T>: Send + Sync {
    /// Returns `true` if the outcome should be handled.
    fn should_handle(&self, outcome: &Outcome<T>) -> bool;
}

/// Shared classifier, as stored by strategies.
pub type SharedClassifier<T> = Arc<dyn OutcomeClassifier<T>>;

/// Handles every failure except cancellation.
///
/// ```rust
/// use strata_core::{DefaultClassifier, Outcome, OutcomeClassifier, OperationCanceledError};
///
/// let classifier = DefaultClassifier;
/// assert!(!classifier.should_handle(&Outcome::Success(1)));
/// assert!(classifier.should_handle(&Outcome::<u8>::from_error(std::io::Error::other("x"))));
/// assert!(!classifier.should_handle(&Outcome::<u8>::from_error(OperationCanceledError)));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl<T> OutcomeClassifier<T> for DefaultClassifier {
    fn should_handle(&self, outcome: &Outcome<T>) -> bool {
        match outcome {
            Outcome::Success(_) => false,
            Outcome::Failure(error) => !error.is::<OperationCanceledError>(),
        }
    }
}

/// A classifier backed by a closure.
///
/// ```rust
/// use strata_core::{FnClassifier, Outcome, OutcomeClassifier};
///
/// // Treat empty responses as failures too
/// let classifier = FnClassifier::new(|outcome: &Outcome<String>| match outcome {
///     Outcome::Success(body) => body.is_empty(),
///     Outcome::Failure(_) => true,
/// });
///
/// assert!(classifier.should_handle(&Outcome::Success(String::new())));
/// assert!(!classifier.should_handle(&Outcome::Success("ok".to_string())));
/// ```
#[derive(Clone)]
pub struct FnClassifier<F> {
    f: F,
}

impl<F> FnClassifier<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, F> OutcomeClassifier<T> for FnClassifier<F>
where
    F: Fn(&Outcome<T>) -> bool + Send + Sync,
{
    fn should_handle(&self, outcome: &Outcome<T>) -> bool {
        (self.f)(outcome)
    }
}
