//! Circuit breaker metrics regression tests

use super::helpers::*;
use serial_test::serial;
use std::time::Duration;
use strata_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerManualControl};
use strata_core::{FakeTimeProvider, ResiliencePipeline};

#[derive(Debug)]
struct Failure;

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failure")
    }
}

impl std::error::Error for Failure {}

#[tokio::test]
#[serial]
async fn circuitbreaker_call_metrics_exist() {
    init_recorder();

    let time = FakeTimeProvider::new();
    let breaker = CircuitBreakerConfig::<u32>::builder()
        .name("metrics_cb")
        .consecutive_failures(2)
        .break_duration(Duration::from_secs(5))
        .time_provider(time.shared())
        .build();
    let pipeline = ResiliencePipeline::builder().add_strategy(breaker).build();

    let _ = pipeline.execute(|_| async { Ok::<_, Failure>(1) }).await;
    for _ in 0..2 {
        let _ = pipeline.execute(|_| async { Err::<u32, _>(Failure) }).await;
    }
    // Open now; this one is rejected.
    let _ = pipeline.execute(|_| async { Ok::<_, Failure>(1) }).await;

    assert_counter_exists("circuitbreaker_calls_total");
    assert_metric_has_label("circuitbreaker_calls_total", "circuitbreaker", "metrics_cb");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "success");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "failure");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "rejected");
}

#[tokio::test]
#[serial]
async fn circuitbreaker_transition_metrics_exist() {
    init_recorder();

    let control = CircuitBreakerManualControl::new();
    let _breaker = CircuitBreakerConfig::<u32>::builder()
        .name("transition_cb")
        .manual_control(&control)
        .build();

    control.isolate().await.unwrap();
    control.reset().await.unwrap();

    assert_counter_exists("circuitbreaker_transitions_total");
    assert_metric_has_label(
        "circuitbreaker_transitions_total",
        "circuitbreaker",
        "transition_cb",
    );
    assert_metric_has_label("circuitbreaker_transitions_total", "from", "Closed");
    assert_metric_has_label("circuitbreaker_transitions_total", "to", "Isolated");
    assert_metric_has_label("circuitbreaker_transitions_total", "from", "Isolated");
    assert_metric_has_label("circuitbreaker_transitions_total", "to", "Closed");

    assert_gauge_exists("circuitbreaker_state");
    assert_metric_has_label("circuitbreaker_state", "circuitbreaker", "transition_cb");
    assert_metric_has_label("circuitbreaker_state", "state", "Isolated");
}
