//! Winners, losers and the attempt cap.

use super::{eventually, EventLog, TestError};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strata_core::{
    FakeTimeProvider, FnListener, Outcome, ResilienceCallback, ResilienceContext,
    ResiliencePipeline,
};
use strata_hedge::HedgeConfig;

#[tokio::test]
async fn failed_primary_is_replaced_by_secondary() {
    let log = EventLog::default();
    let calls = Arc::new(AtomicU32::new(0));
    let counted = Arc::clone(&calls);
    let hedge = HedgeConfig::builder::<String>()
        .max_hedged_attempts(2)
        .delay(Duration::from_secs(1))
        .time_provider(FakeTimeProvider::new().shared())
        .on_event(FnListener::new(log.listener()))
        .build();

    let callback = ResilienceCallback::new(move |_| {
        let attempt = counted.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt == 0 {
                Outcome::from_error(TestError::new("primary"))
            } else {
                Outcome::Success(format!("secondary {attempt}"))
            }
        }
    });

    let outcome = hedge.execute(callback, ResilienceContext::new()).await;

    assert_eq!(outcome.into_result().unwrap(), "secondary 1");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(log.hedges(), vec![1]);
    // Two executions ran; only the unhandled secondary could be accepted.
    assert_eq!(log.attempts(), vec![(0, true), (1, false)]);
    assert_eq!(hedge.controller().idle_executions(), 2);
}

#[tokio::test]
async fn fast_primary_needs_no_hedge() {
    let log = EventLog::default();
    let hedge = HedgeConfig::builder::<u32>()
        .delay(Duration::from_secs(1))
        .time_provider(FakeTimeProvider::new().shared())
        .on_event(FnListener::new(log.listener()))
        .build();
    let callback = ResilienceCallback::new(|_| async { Outcome::Success(7) });

    let outcome = hedge.execute(callback, ResilienceContext::new()).await;

    assert_eq!(outcome.into_result().unwrap(), 7);
    assert!(log.hedges().is_empty());
    assert_eq!(log.attempts(), vec![(0, false)]);
}

#[tokio::test]
async fn attempts_never_exceed_the_cap() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let hedge = HedgeConfig::builder::<u32>()
        .no_delay()
        .max_hedged_attempts(4)
        .build();
    let callback = ResilienceCallback::new(move |_| {
        counted.fetch_add(1, Ordering::SeqCst);
        async { Outcome::<u32>::from_error(TestError::new("down")) }
    });

    for _ in 0..3 {
        let outcome = hedge.execute(callback.clone(), ResilienceContext::new()).await;
        assert!(outcome.is_error::<TestError>());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 12);
}

#[tokio::test]
async fn winner_properties_flow_back_to_the_caller() {
    use strata_core::ResiliencePropertyKey;
    const SERVED_BY: ResiliencePropertyKey<String> = ResiliencePropertyKey::new("served-by");
    const REQUEST: ResiliencePropertyKey<&'static str> = ResiliencePropertyKey::new("request");

    let hedge = HedgeConfig::builder::<u32>()
        .no_delay()
        .max_hedged_attempts(2)
        .build();
    let callback = ResilienceCallback::new(|context: ResilienceContext| async move {
        // Every attempt sees the caller's properties in its own copy.
        assert_eq!(context.properties().get(&REQUEST).as_deref(), Some(&"lookup"));
        context.properties().set(&SERVED_BY, "replica".to_string());
        Outcome::Success(1)
    });

    let context = ResilienceContext::new();
    context.properties().set(&REQUEST, "lookup");
    let outcome = hedge.execute(callback, context.clone()).await;

    assert!(outcome.is_success());
    assert_eq!(
        context.properties().get(&SERVED_BY).as_deref().map(String::as_str),
        Some("replica")
    );
}

#[tokio::test]
async fn pooled_contexts_are_reused_across_calls() {
    let hedge = HedgeConfig::builder::<u32>()
        .no_delay()
        .max_hedged_attempts(3)
        .build();
    let callback = ResilienceCallback::new(|_| async { Outcome::Success(1) });

    let controller = Arc::clone(hedge.controller());
    for _ in 0..5 {
        let outcome = hedge.execute(callback.clone(), ResilienceContext::new()).await;
        assert!(outcome.is_success());
        // Losers may still be draining; the context comes back once they stop.
        eventually(|| controller.idle_contexts() == 1).await;
    }

    assert_eq!(controller.idle_executions(), 3);
}

#[tokio::test]
async fn hedge_composes_in_a_pipeline() {
    let calls = Arc::new(AtomicU32::new(0));
    let counted = Arc::clone(&calls);
    let pipeline = ResiliencePipeline::builder()
        .add_strategy(
            HedgeConfig::builder::<u32>()
                .infinite_delay()
                .max_hedged_attempts(3)
                .build(),
        )
        .build();

    let value = pipeline
        .execute(move |_| {
            let attempt = counted.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(TestError::new("flaky"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
