//! Property tests for the circuit breaker.
//!
//! Invariants tested:
//! - Opens exactly when the consecutive failure threshold is reached
//! - Rejects calls without invoking the operation while open
//! - A successful test call after the break closes the circuit

use super::TestError;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strata_circuitbreaker::{BrokenCircuitError, CircuitBreakerConfig, CircuitState};
use strata_core::{FakeTimeProvider, ResiliencePipeline};
use tokio::runtime::Runtime;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// Property: the circuit opens on the Nth consecutive failure, not before
    #[test]
    fn opens_at_consecutive_threshold(threshold in 1u32..=20, successes in 0usize..5) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let breaker = CircuitBreakerConfig::<u32>::builder()
                .consecutive_failures(threshold)
                .break_duration(Duration::from_secs(60))
                .build();
            let pipeline = ResiliencePipeline::builder().add_strategy(breaker.clone()).build();

            for _ in 0..successes {
                pipeline.execute(|_| async { Ok::<_, TestError>(1) }).await.unwrap();
            }

            for failure in 1..=threshold {
                let _ = pipeline.execute(|_| async { Err::<u32, _>(TestError) }).await;
                let expected = if failure < threshold {
                    CircuitState::Closed
                } else {
                    CircuitState::Open
                };
                prop_assert_eq!(breaker.circuit_state(), expected);
            }

            Ok(())
        })?;
    }

    /// Property: no call reaches the operation while the circuit is open
    #[test]
    fn open_circuit_never_invokes_operation(threshold in 1u32..=5, attempts in 1usize..=30) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let calls = Arc::new(AtomicUsize::new(0));
            let breaker = CircuitBreakerConfig::<u32>::builder()
                .consecutive_failures(threshold)
                .break_duration(Duration::from_secs(60))
                .build();
            let pipeline = ResiliencePipeline::builder().add_strategy(breaker).build();

            for _ in 0..threshold {
                let _ = pipeline.execute(|_| async { Err::<u32, _>(TestError) }).await;
            }

            for _ in 0..attempts {
                let counted = Arc::clone(&calls);
                let error = pipeline
                    .execute(move |_| {
                        counted.fetch_add(1, Ordering::SeqCst);
                        async { Ok::<_, TestError>(1) }
                    })
                    .await
                    .unwrap_err();
                prop_assert!(error.is::<BrokenCircuitError>());
            }

            prop_assert_eq!(calls.load(Ordering::SeqCst), 0);
            Ok(())
        })?;
    }

    /// Property: after any break duration, one successful call closes the circuit
    #[test]
    fn successful_test_call_closes(break_millis in 500u64..=10_000) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let time = FakeTimeProvider::new();
            let break_duration = Duration::from_millis(break_millis);
            let breaker = CircuitBreakerConfig::<u32>::builder()
                .consecutive_failures(1)
                .break_duration(break_duration)
                .time_provider(time.shared())
                .build();
            let pipeline = ResiliencePipeline::builder().add_strategy(breaker.clone()).build();

            let _ = pipeline.execute(|_| async { Err::<u32, _>(TestError) }).await;
            prop_assert_eq!(breaker.circuit_state(), CircuitState::Open);

            time.advance(break_duration - Duration::from_millis(1));
            let rejected = pipeline.execute(|_| async { Ok::<_, TestError>(1) }).await;
            prop_assert!(rejected.is_err());

            time.advance(Duration::from_millis(1));
            let value = pipeline.execute(|_| async { Ok::<_, TestError>(7) }).await.unwrap();
            prop_assert_eq!(value, 7);
            prop_assert_eq!(breaker.circuit_state(), CircuitState::Closed);

            Ok(())
        })?;
    }
}
