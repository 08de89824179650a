//! Consecutive and sampled failure thresholds.

use super::{failing, succeeding};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;
use strata_circuitbreaker::{
    BrokenCircuitError, CircuitBreakerConfig, CircuitBreakerStrategy, CircuitState,
};
use strata_core::{FakeTimeProvider, ResilienceContext, ResilienceStrategy};

fn sampled(time: &FakeTimeProvider) -> CircuitBreakerStrategy<u32> {
    CircuitBreakerConfig::<u32>::builder()
        .failure_ratio(0.5)
        .minimum_throughput(4)
        .sampling_duration(Duration::from_secs(1))
        .break_duration(Duration::from_secs(5))
        .time_provider(time.shared())
        .build()
}

#[tokio::test]
async fn consecutive_threshold_opens_exactly_at_the_limit() {
    let breaker = CircuitBreakerConfig::<u32>::builder()
        .consecutive_failures(3)
        .build();
    let calls = Arc::new(AtomicUsize::new(0));

    for expected in [CircuitState::Closed, CircuitState::Closed, CircuitState::Open] {
        let _ = breaker.execute_core(failing(&calls), ResilienceContext::new()).await;
        assert_eq!(breaker.circuit_state(), expected);
    }
}

#[tokio::test]
async fn sampled_ratio_waits_for_minimum_throughput() {
    let time = FakeTimeProvider::new();
    let breaker = sampled(&time);
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let _ = breaker.execute_core(failing(&calls), ResilienceContext::new()).await;
    }
    // 100% failures, but only 3 of the 4 calls needed.
    assert_eq!(breaker.circuit_state(), CircuitState::Closed);
    assert_eq!(breaker.controller().health_info().throughput, 3);

    let _ = breaker.execute_core(failing(&calls), ResilienceContext::new()).await;
    assert_eq!(breaker.circuit_state(), CircuitState::Open);
}

#[tokio::test]
async fn sampled_ratio_below_threshold_stays_closed() {
    let time = FakeTimeProvider::new();
    let breaker = sampled(&time);
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let _ = breaker.execute_core(succeeding(&calls), ResilienceContext::new()).await;
        let _ = breaker.execute_core(succeeding(&calls), ResilienceContext::new()).await;
        let _ = breaker.execute_core(failing(&calls), ResilienceContext::new()).await;
    }

    let health = breaker.controller().health_info();
    assert_eq!(health.throughput, 9);
    assert_eq!(health.failure_count, 3);
    assert_eq!(breaker.circuit_state(), CircuitState::Closed);
}

#[tokio::test]
async fn samples_older_than_the_sampling_duration_are_forgotten() {
    let time = FakeTimeProvider::new();
    let breaker = sampled(&time);
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let _ = breaker.execute_core(failing(&calls), ResilienceContext::new()).await;
    }
    time.advance(Duration::from_secs(1));

    // The earlier failures have aged out, so one more is not enough.
    let _ = breaker.execute_core(failing(&calls), ResilienceContext::new()).await;
    assert_eq!(breaker.circuit_state(), CircuitState::Closed);
    assert_eq!(breaker.controller().health_info().failure_count, 1);
}

#[tokio::test]
async fn custom_classifier_decides_what_counts_as_failure() {
    let breaker = CircuitBreakerConfig::<u32>::builder()
        .consecutive_failures(2)
        .should_handle(|outcome| matches!(outcome.result(), Some(&n) if n >= 500))
        .build();

    for status in [200u32, 503, 404, 500, 502] {
        let callback = strata_core::ResilienceCallback::new(move |_| async move {
            strata_core::Outcome::Success(status)
        });
        let _ = breaker.execute_core(callback, ResilienceContext::new()).await;
    }

    assert_eq!(breaker.circuit_state(), CircuitState::Open);
}

#[tokio::test]
async fn result_handled_outcomes_are_recorded_without_their_value() {
    let breaker = CircuitBreakerConfig::<u32>::builder()
        .consecutive_failures(1)
        .should_handle(|outcome| matches!(outcome.result(), Some(&n) if n >= 500))
        .build();

    let callback =
        strata_core::ResilienceCallback::new(|_| async { strata_core::Outcome::Success(503) });
    let outcome = breaker.execute_core(callback, ResilienceContext::new()).await;
    assert_eq!(outcome.into_result().unwrap(), 503);
    assert_eq!(breaker.circuit_state(), CircuitState::Open);

    let last = breaker.controller().last_handled_outcome().unwrap();
    assert!(last.is_success());
    assert!(breaker.controller().last_error().is_none());

    let calls = Arc::new(AtomicUsize::new(0));
    let outcome = breaker.execute_core(succeeding(&calls), ResilienceContext::new()).await;
    let error = outcome.error().unwrap().downcast_ref::<BrokenCircuitError>().unwrap();
    assert!(error.last_error().is_none());
}
