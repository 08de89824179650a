//! The result type threaded through every strategy.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Boxed error type accepted at the edges of the crate.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A cloneable, type-erased error carried by a failed [`Outcome`].
///
/// The wrapped error can be inspected with [`OutcomeError::is`] and
/// [`OutcomeError::downcast_ref`]. Cloning is cheap; all clones share the
/// same underlying error.
#[derive(Clone)]
pub struct OutcomeError {
    inner: Arc<dyn StdError + Send + Sync + 'static>,
}

impl OutcomeError {
    /// Wraps a concrete error.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Wraps a boxed error, unwrapping it first if it already is an `OutcomeError`.
    pub fn from_boxed(error: BoxError) -> Self {
        match error.downcast::<OutcomeError>() {
            Ok(outcome_error) => *outcome_error,
            Err(error) => Self {
                inner: Arc::from(error),
            },
        }
    }

    /// Returns true if the wrapped error is of type `E`.
    pub fn is<E>(&self) -> bool
    where
        E: StdError + 'static,
    {
        self.inner.is::<E>()
    }

    /// Returns a reference to the wrapped error if it is of type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    /// Returns the wrapped error as a trait object.
    pub fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.inner
    }
}

impl fmt::Debug for OutcomeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl fmt::Display for OutcomeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl StdError for OutcomeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}

impl From<BoxError> for OutcomeError {
    fn from(error: BoxError) -> Self {
        Self::from_boxed(error)
    }
}

/// The outcome of an operation: either a value or an error.
///
/// Strategies never see a raw `Result`; user callbacks are adapted into an
/// `Outcome` so that failures travel as values and can be classified,
/// recorded and replayed. Dropping an outcome drops its value, so an outcome
/// that is not handed back to the caller is released exactly once.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The operation produced a value.
    Success(T),
    /// The operation failed.
    Failure(OutcomeError),
}

impl<T> Outcome<T> {
    /// Creates a successful outcome.
    pub fn from_result(value: T) -> Self {
        Outcome::Success(value)
    }

    /// Creates a failed outcome from a concrete error.
    pub fn from_error<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Outcome::Failure(OutcomeError::new(error))
    }

    /// Returns true if this outcome carries a value.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Returns true if this outcome carries an error.
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    /// Returns true if this outcome failed with an error of type `E`.
    pub fn is_error<E>(&self) -> bool
    where
        E: StdError + 'static,
    {
        self.error().is_some_and(OutcomeError::is::<E>)
    }

    /// Returns the value, if any.
    pub fn result(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    /// Returns the error, if any.
    pub fn error(&self) -> Option<&OutcomeError> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(error) => Some(error),
        }
    }

    /// Converts into a standard `Result`.
    pub fn into_result(self) -> Result<T, OutcomeError> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(error) => Err(error),
        }
    }

    /// Maps the value of a successful outcome.
    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failure(error) => Outcome::Failure(error),
        }
    }

    /// Returns a value-less copy that keeps only success or the error.
    ///
    /// Used wherever an outcome must be remembered without owning `T`.
    pub fn erase(&self) -> Outcome<()> {
        match self {
            Outcome::Success(_) => Outcome::Success(()),
            Outcome::Failure(error) => Outcome::Failure(error.clone()),
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T>
where
    E: Into<BoxError>,
{
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(error) => Outcome::Failure(OutcomeError::from_boxed(error.into())),
        }
    }
}
