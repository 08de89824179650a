//! Hedging strategy for strata.
//!
//! Hedging reduces tail latency by running redundant attempts of the same
//! operation. The primary attempt starts at once; whenever the configured
//! delay elapses without a result, or an attempt finishes with an outcome
//! worth hedging, another attempt is started. The first acceptable outcome
//! wins and every other attempt is canceled.
//!
//! # Modes
//!
//! ## Latency mode (delay > 0)
//!
//! Wait before each hedge. Extra attempts only start when the primary is slow.
//!
//! ```rust
//! use strata_hedge::HedgeConfig;
//! use std::time::Duration;
//!
//! // Start a hedge if the primary takes more than 100ms
//! let hedge = HedgeConfig::builder::<String>()
//!     .delay(Duration::from_millis(100))
//!     .max_hedged_attempts(2)
//!     .build();
//! ```
//!
//! ## Parallel mode (no delay)
//!
//! Start every attempt at once and keep the fastest acceptable one.
//!
//! ```rust
//! use strata_hedge::HedgeConfig;
//!
//! let hedge = HedgeConfig::builder::<String>()
//!     .no_delay()
//!     .max_hedged_attempts(3)
//!     .build();
//! ```
//!
//! ## Fallback mode (infinite delay)
//!
//! Never hedge on a timer; a new attempt only starts after a handled outcome.
//!
//! ```rust
//! use strata_hedge::HedgeConfig;
//!
//! let hedge = HedgeConfig::builder::<String>()
//!     .infinite_delay()
//!     .max_hedged_attempts(3)
//!     .build();
//! ```
//!
//! # Tower
//!
//! ```rust
//! use tower::{Layer, ServiceExt};
//! use strata_hedge::HedgeConfig;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), strata_core::OutcomeError> {
//! let service = tower::service_fn(|req: String| async move {
//!     Ok::<_, std::io::Error>(format!("response: {req}"))
//! });
//!
//! let layer = HedgeConfig::builder::<String>()
//!     .delay(Duration::from_millis(50))
//!     .build_layer();
//!
//! let response = layer.layer(service).oneshot("hello".to_string()).await?;
//! assert_eq!(response, "response: hello");
//! # Ok(())
//! # }
//! ```
//!
//! # Events
//!
//! - [`HedgeEvent::Hedging`] when a secondary attempt starts
//! - [`HedgeEvent::ExecutionAttempt`] when any attempt finishes
//!
//! # Important considerations
//!
//! - **Idempotency**: only hedge operations that are safe to run more than once
//! - **Cancellation**: losing attempts see their context's token canceled;
//!   operations should observe it to stop early

mod args;
mod config;
mod controller;
mod error;
mod events;
mod execution_context;
mod handler;
mod layer;
mod strategy;
mod task_execution;

pub use args::{
    HedgingAction, HedgingActionGenerator, HedgingActionGeneratorArguments,
    HedgingDelayGenerator, HedgingDelayGeneratorArguments, OnHedgingArguments,
    OnHedgingCallback,
};
pub use config::{HedgeConfig, HedgeConfigBuilder, HedgeDelay};
pub use controller::HedgingController;
pub use error::HedgeError;
pub use events::HedgeEvent;
pub use execution_context::{ExecutionInfo, HedgingExecutionContext};
pub use layer::{Hedge, HedgeLayer};
pub use strategy::HedgingStrategy;
pub use task_execution::{HedgedTaskType, TaskExecution};
