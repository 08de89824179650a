//! Circuit breaker strategy for strata.
//!
//! A circuit breaker stops calling a failing dependency for a while so it
//! gets a chance to recover.
//!
//! ## States
//! - **Closed**: calls flow through and failures are accounted
//! - **Open**: calls are rejected with [`BrokenCircuitError`] until the break elapses
//! - **Half-Open**: one test call is admitted; its outcome closes or re-opens the circuit
//! - **Isolated**: opened manually, rejected with [`IsolatedCircuitError`] until closed
//!
//! ## Behaviors
//!
//! The default behavior samples calls over a rolling window and opens when
//! enough of them failed.
//! [`consecutive_failures`](CircuitBreakerConfigBuilder::consecutive_failures)
//! switches to a simple run-length threshold.
//!
//! ```rust
//! use std::time::Duration;
//! use strata_circuitbreaker::CircuitBreakerConfig;
//! use strata_core::ResiliencePipeline;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let breaker = CircuitBreakerConfig::<String>::builder()
//!     .name("inventory")
//!     .failure_ratio(0.5)
//!     .minimum_throughput(20)
//!     .sampling_duration(Duration::from_secs(10))
//!     .break_duration(Duration::from_secs(30))
//!     .on_opened(|args| async move {
//!         println!("circuit opened for {:?}", args.break_duration);
//!         Ok(())
//!     })
//!     .build();
//!
//! let pipeline = ResiliencePipeline::builder().add_strategy(breaker).build();
//! let stock = pipeline
//!     .execute(|_context| async { Ok::<_, std::io::Error>("42 units".to_string()) })
//!     .await;
//! assert!(stock.is_ok());
//! # }
//! ```
//!
//! ## Callbacks
//!
//! `on_opened`, `on_closed` and `on_half_opened` run one at a time in the
//! order of the transitions that scheduled them, on a dedicated thread.
//! The call that caused a transition waits for its callback, so a failing
//! callback is visible to that caller as [`CircuitBreakerError::Callback`].
//!
//! ## Tower
//!
//! [`CircuitBreakerLayer`] wraps any `tower::Service`:
//!
//! ```rust
//! use tower::{ServiceBuilder, service_fn};
//! use strata_circuitbreaker::CircuitBreakerLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(CircuitBreakerLayer::<String>::fast_fail().build_layer())
//!     .service(service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) }));
//! ```
//!
//! ## Features
//! - `tracing`: log transitions and rejections
//! - `metrics`: export call counters and a state gauge
//! - `serde`: serialize [`CircuitState`]

mod args;
mod behavior;
mod config;
mod controller;
mod error;
mod events;
mod health;
mod layer;
mod manual_control;
mod scheduler;
mod state;
mod state_provider;
mod strategy;

pub use args::{
    BreakDurationGenerator, BreakDurationGeneratorArguments, CircuitCallback,
    OnCircuitClosedArguments, OnCircuitHalfOpenedArguments, OnCircuitOpenedArguments,
};
pub use behavior::{AdvancedBehavior, CircuitBehavior, ConsecutiveFailuresBehavior};
pub use config::{BehaviorOptions, CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use controller::CircuitStateController;
pub use error::{
    BrokenCircuitError, CallbackPanicked, CircuitBreakerError, IsolatedCircuitError,
    ScheduledTaskError,
};
pub use events::CircuitBreakerEvent;
pub use health::{HealthInfo, HealthMetrics};
pub use layer::{CircuitBreaker, CircuitBreakerLayer};
pub use manual_control::CircuitBreakerManualControl;
pub use scheduler::{ScheduledTask, ScheduledTaskExecutor};
pub use state::CircuitState;
pub use state_provider::CircuitBreakerStateProvider;
pub use strategy::CircuitBreakerStrategy;
