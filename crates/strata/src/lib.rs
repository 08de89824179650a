//! Composable resilience strategies.
//!
//! `strata` bundles the strategy crates behind features so applications can
//! depend on a single crate.
//!
//! # Strategies
//!
//! - **Circuit breaker** (`circuitbreaker` feature): stops calling a failing
//!   dependency for a break duration, then probes it before closing again
//! - **Hedge** (`hedge` feature): races delayed secondary attempts against the
//!   primary to cut tail latency
//!
//! ```toml
//! [dependencies]
//! strata = { version = "0.1", features = ["full"] }
//! ```
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "full")]
//! # async fn example() {
//! use std::time::Duration;
//! use strata::circuitbreaker::CircuitBreakerConfig;
//! use strata::core::ResiliencePipeline;
//! use strata::hedge::HedgeConfig;
//!
//! let pipeline = ResiliencePipeline::<String>::builder()
//!     .add_strategy(
//!         CircuitBreakerConfig::<String>::builder()
//!             .consecutive_failures(5)
//!             .build(),
//!     )
//!     .add_strategy(
//!         HedgeConfig::builder::<String>()
//!             .delay(Duration::from_millis(50))
//!             .build(),
//!     )
//!     .build();
//!
//! let value = pipeline
//!     .execute(|_context| async { Ok::<_, std::io::Error>("ok".to_string()) })
//!     .await
//!     .unwrap();
//! assert_eq!(value, "ok");
//! # }
//! ```

pub use strata_core as core;

#[cfg(feature = "circuitbreaker")]
pub use strata_circuitbreaker as circuitbreaker;

#[cfg(feature = "hedge")]
pub use strata_hedge as hedge;

pub use strata_core::{
    Outcome, OutcomeError, ResilienceCallback, ResilienceContext, ResiliencePipeline,
    ResilienceStrategy,
};
