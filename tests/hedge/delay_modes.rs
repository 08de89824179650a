//! Latency, parallel, fallback and dynamic delays.

use super::{eventually, TestError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strata_core::{FakeTimeProvider, Outcome, ResilienceCallback, ResilienceContext};
use strata_hedge::HedgeConfig;

/// The primary hangs until canceled; every later attempt answers at once.
fn slow_primary(calls: &Arc<AtomicU32>) -> ResilienceCallback<u32> {
    let calls = Arc::clone(calls);
    ResilienceCallback::new(move |context: ResilienceContext| {
        let attempt = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt == 0 {
                context.cancellation_token().cancelled().await;
                Outcome::from_error(strata_core::OperationCanceledError)
            } else {
                Outcome::Success(attempt)
            }
        }
    })
}

#[tokio::test]
async fn latency_mode_hedges_once_the_delay_elapses() {
    let time = FakeTimeProvider::new();
    let calls = Arc::new(AtomicU32::new(0));
    let hedge = HedgeConfig::builder::<u32>()
        .delay(Duration::from_millis(100))
        .time_provider(time.shared())
        .build();

    let call = {
        let hedge = hedge.clone();
        let callback = slow_primary(&calls);
        tokio::spawn(async move { hedge.execute(callback, ResilienceContext::new()).await })
    };

    eventually(|| time.pending_timers() == 1).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    time.advance(Duration::from_millis(99));
    tokio::task::yield_now().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    time.advance(Duration::from_millis(1));
    let outcome = call.await.unwrap();

    assert_eq!(outcome.into_result().unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn parallel_mode_starts_everything_at_once() {
    let calls = Arc::new(AtomicU32::new(0));
    let counted = Arc::clone(&calls);
    let hedge = HedgeConfig::builder::<u32>()
        .no_delay()
        .max_hedged_attempts(3)
        .build();
    let callback = ResilienceCallback::new(move |context: ResilienceContext| {
        let attempt = counted.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt == 2 {
                Outcome::Success(attempt)
            } else {
                context.cancellation_token().cancelled().await;
                Outcome::from_error(strata_core::OperationCanceledError)
            }
        }
    });

    let outcome = hedge.execute(callback, ResilienceContext::new()).await;

    assert_eq!(outcome.into_result().unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn fallback_mode_only_hedges_after_a_failure() {
    let time = FakeTimeProvider::new();
    let calls = Arc::new(AtomicU32::new(0));
    let hedge = HedgeConfig::builder::<u32>()
        .infinite_delay()
        .max_hedged_attempts(3)
        .time_provider(time.shared())
        .build();

    // A hanging primary is never hedged on a timer.
    let call = {
        let hedge = hedge.clone();
        let callback = slow_primary(&calls);
        let context = ResilienceContext::new();
        let token = context.cancellation_token().clone();
        let handle = tokio::spawn(async move { hedge.execute(callback, context).await });
        (handle, token)
    };
    for _ in 0..100 {
        tokio::task::yield_now().await;
    }
    time.advance(Duration::from_secs(3600));
    assert_eq!(time.pending_timers(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    call.1.cancel();
    assert!(call.0.await.unwrap().is_error::<strata_core::OperationCanceledError>());

    // A failing primary is.
    let calls = Arc::new(AtomicU32::new(0));
    let counted = Arc::clone(&calls);
    let callback = ResilienceCallback::new(move |_| {
        let attempt = counted.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt == 0 {
                Outcome::from_error(TestError::new("primary"))
            } else {
                Outcome::Success(attempt)
            }
        }
    });
    let outcome = hedge.execute(callback, ResilienceContext::new()).await;
    assert_eq!(outcome.into_result().unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn dynamic_delay_sees_each_attempt_number() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&seen);
    let hedge = HedgeConfig::builder::<u32>()
        .max_hedged_attempts(3)
        .delay_fn(move |args| {
            recorded.lock().unwrap().push(args.attempt_number);
            Duration::ZERO
        })
        .build();
    let callback = ResilienceCallback::new(|_| async { Outcome::Success(1) });

    let outcome = hedge.execute(callback, ResilienceContext::new()).await;

    assert!(outcome.is_success());
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}
