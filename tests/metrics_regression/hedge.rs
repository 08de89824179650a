//! Hedge metrics regression tests

use super::helpers::*;
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strata_core::ResiliencePipeline;
use strata_hedge::HedgeConfig;

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
async fn hedge_attempt_metrics_exist() {
    init_recorder();

    let pipeline = ResiliencePipeline::builder()
        .add_strategy(
            HedgeConfig::builder::<u32>()
                .name("metrics_hedge")
                .infinite_delay()
                .build(),
        )
        .build();

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let value = pipeline
        .execute(move |_| {
            let call = counted.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    Err(Failure)
                } else {
                    Ok(call as u32)
                }
            }
        })
        .await
        .unwrap();
    assert_eq!(value, 1);

    assert_counter_exists("hedge_attempts_total");
    assert_metric_has_label("hedge_attempts_total", "hedge", "metrics_hedge");
    assert_metric_has_label("hedge_attempts_total", "handled", "true");
    assert_metric_has_label("hedge_attempts_total", "handled", "false");

    assert_histogram_exists("hedge_attempt_duration_seconds");
    assert_metric_has_label("hedge_attempt_duration_seconds", "hedge", "metrics_hedge");
}
