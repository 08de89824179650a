//! Core infrastructure for strata.
//!
//! This crate provides the pieces every strategy is built from:
//! - [`Outcome`] and [`OutcomeError`], the result type threaded through strategies
//! - [`ResilienceContext`] with its typed property bag and a context pool
//! - Object pools for contexts and cancellation tokens
//! - [`TimeProvider`], the injectable clock
//! - Event system for observability
//! - [`ResilienceStrategy`] and [`ResiliencePipeline`] for composition

pub mod cancellation;
pub mod classifier;
pub mod context;
pub mod error;
pub mod events;
pub mod outcome;
pub mod pipeline;
pub mod pool;
pub mod strategy;
pub mod time;

pub use cancellation::{propagate_cancellation, CancellationTokenPool};
pub use classifier::{DefaultClassifier, FnClassifier, OutcomeClassifier, SharedClassifier};
pub use context::{
    ResilienceContext, ResilienceContextPool, ResilienceProperties, ResiliencePropertyKey,
};
pub use error::{panic_message, ConfigError, ObjectDisposedError, OperationCanceledError};
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent, Severity};
pub use outcome::{BoxError, Outcome, OutcomeError};
pub use pipeline::{ResiliencePipeline, ResiliencePipelineBuilder};
pub use pool::ObjectPool;
pub use strategy::{ResilienceCallback, ResilienceStrategy};
pub use time::{Deadline, SharedTimeProvider, SystemTimeProvider, TimeProvider};

#[cfg(any(test, feature = "test-util"))]
pub use time::FakeTimeProvider;

/// Re-exported so callers do not need a direct `tokio-util` dependency.
pub use tokio_util::sync::CancellationToken;
