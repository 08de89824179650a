//! End-to-end open, break and recovery.

use super::{failing, succeeding, TestError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strata_circuitbreaker::{BrokenCircuitError, CircuitBreakerConfig, CircuitState};
use strata_core::{FakeTimeProvider, ResilienceContext, ResiliencePipeline, ResilienceStrategy};

#[tokio::test]
async fn five_failures_open_the_circuit_until_the_break_elapses() {
    let time = FakeTimeProvider::new();
    let breaker = CircuitBreakerConfig::<u32>::builder()
        .consecutive_failures(5)
        .break_duration(Duration::from_millis(500))
        .time_provider(time.shared())
        .build();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let outcome = breaker
            .execute_core(failing(&calls), ResilienceContext::new())
            .await;
        assert!(outcome.is_error::<TestError>());
    }
    assert_eq!(breaker.circuit_state(), CircuitState::Open);

    // Rejected without reaching the operation, with the time left to wait.
    time.advance(Duration::from_millis(200));
    let outcome = breaker
        .execute_core(succeeding(&calls), ResilienceContext::new())
        .await;
    let error = outcome.error().unwrap().downcast_ref::<BrokenCircuitError>().unwrap();
    assert_eq!(error.retry_after(), Some(Duration::from_millis(300)));
    assert!(error.last_error().unwrap().is::<TestError>());
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    // The first call after the break is the test call; its success closes the circuit.
    time.advance(Duration::from_millis(300));
    let outcome = breaker
        .execute_core(succeeding(&calls), ResilienceContext::new())
        .await;
    assert_eq!(outcome.into_result().unwrap(), 1);
    assert_eq!(breaker.circuit_state(), CircuitState::Closed);
    assert_eq!(calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn successes_reset_the_consecutive_count() {
    let breaker = CircuitBreakerConfig::<u32>::builder()
        .consecutive_failures(3)
        .build();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..4 {
        for _ in 0..2 {
            let _ = breaker.execute_core(failing(&calls), ResilienceContext::new()).await;
        }
        let _ = breaker.execute_core(succeeding(&calls), ResilienceContext::new()).await;
    }

    assert_eq!(breaker.circuit_state(), CircuitState::Closed);
    assert_eq!(calls.load(Ordering::SeqCst), 12);
}

#[tokio::test]
async fn breaker_runs_inside_a_pipeline() {
    let breaker = CircuitBreakerConfig::<u32>::builder()
        .consecutive_failures(2)
        .break_duration(Duration::from_secs(30))
        .build();
    let pipeline = ResiliencePipeline::builder()
        .add_strategy(breaker.clone())
        .build();

    for _ in 0..2 {
        let error = pipeline
            .execute(|_| async { Err::<u32, _>(TestError) })
            .await
            .unwrap_err();
        assert!(error.is::<TestError>());
    }

    let error = pipeline
        .execute(|_| async { Ok::<_, TestError>(1) })
        .await
        .unwrap_err();
    assert!(error.is::<BrokenCircuitError>());
    assert_eq!(breaker.circuit_state(), CircuitState::Open);
}

#[tokio::test]
async fn disposed_breaker_fails_calls() {
    let breaker = CircuitBreakerConfig::<u32>::builder().build();
    let calls = Arc::new(AtomicUsize::new(0));

    breaker.dispose();
    let outcome = breaker
        .execute_core(succeeding(&calls), ResilienceContext::new())
        .await;

    assert!(outcome.is_error::<strata_circuitbreaker::CircuitBreakerError>());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(breaker.circuit_state(), CircuitState::Closed);
}
