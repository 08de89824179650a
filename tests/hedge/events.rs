//! Event emission, `on_hedging` and the action generator.

use super::{EventLog, TestError};
use futures::FutureExt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strata_core::{
    BoxError, FnListener, Outcome, ResilienceCallback, ResilienceContext, ResilienceEvent,
    ResiliencePropertyKey, Severity,
};
use strata_hedge::{HedgeConfig, HedgeError, HedgeEvent};

fn always_failing() -> ResilienceCallback<u32> {
    ResilienceCallback::new(|_| async { Outcome::from_error(TestError::new("down")) })
}

#[tokio::test]
async fn events_describe_every_attempt() {
    let log = EventLog::default();
    let hedge = HedgeConfig::builder::<u32>()
        .name("lookup")
        .infinite_delay()
        .max_hedged_attempts(3)
        .on_event(FnListener::new(log.listener()))
        .build();

    let outcome = hedge.execute(always_failing(), ResilienceContext::new()).await;

    assert!(outcome.is_error::<TestError>());
    assert_eq!(log.hedges(), vec![1, 2]);
    assert_eq!(log.attempts(), vec![(0, true), (1, true), (2, true)]);
}

#[tokio::test]
async fn event_metadata() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&events);
    let hedge = HedgeConfig::builder::<u32>()
        .name("search")
        .infinite_delay()
        .on_event(FnListener::new(move |event: &HedgeEvent| {
            seen.lock().unwrap().push((
                event.event_type(),
                event.pattern_name().to_string(),
                event.severity(),
            ));
        }))
        .build();

    let _ = hedge.execute(always_failing(), ResilienceContext::new()).await;

    let events = events.lock().unwrap();
    assert!(events.iter().all(|(_, name, _)| name == "search"));
    assert!(events.contains(&("hedging", "search".to_string(), Severity::Warning)));
    assert!(events.contains(&("execution_attempt", "search".to_string(), Severity::Warning)));
}

#[tokio::test]
async fn on_attempt_reports_execution_time() {
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&attempts);
    let hedge = HedgeConfig::builder::<u32>()
        .no_delay()
        .max_hedged_attempts(2)
        .on_attempt(move |attempt, execution_time, handled| {
            seen.lock().unwrap().push((attempt, execution_time, handled));
        })
        .build();
    let callback = ResilienceCallback::new(|_| async { Outcome::Success(3) });

    let _ = hedge.execute(callback, ResilienceContext::new()).await;
    super::eventually(|| attempts.lock().unwrap().len() == 2).await;

    let attempts = attempts.lock().unwrap();
    for (_, execution_time, handled) in attempts.iter() {
        assert!(*execution_time < Duration::from_secs(5));
        assert!(!handled);
    }
}

#[tokio::test]
async fn on_hedging_runs_before_each_secondary() {
    let hedged = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&hedged);
    let hedge = HedgeConfig::builder::<u32>()
        .infinite_delay()
        .max_hedged_attempts(3)
        .on_hedging(move |args| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push(args.attempt_number);
                Ok(())
            }
        })
        .build();

    let _ = hedge.execute(always_failing(), ResilienceContext::new()).await;

    assert_eq!(*hedged.lock().unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn failing_on_hedging_becomes_the_attempt_outcome() {
    let calls = Arc::new(AtomicU32::new(0));
    let counted = Arc::clone(&calls);
    let hedge = HedgeConfig::builder::<u32>()
        .infinite_delay()
        .max_hedged_attempts(2)
        .on_hedging(|_| async { Err::<(), BoxError>(Box::new(TestError::new("hook"))) })
        .build();
    let callback = ResilienceCallback::new(move |_| {
        counted.fetch_add(1, Ordering::SeqCst);
        async { Outcome::<u32>::from_error(TestError::new("primary")) }
    });

    let outcome = hedge.execute(callback, ResilienceContext::new()).await;

    // Both attempts failed; the primary's outcome is the one returned.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let error = outcome.error().unwrap().downcast_ref::<TestError>().unwrap();
    assert_eq!(error.message, "primary");
}

#[tokio::test]
async fn action_generator_can_decline_or_replace_attempts() {
    let hedge = HedgeConfig::builder::<u32>()
        .infinite_delay()
        .max_hedged_attempts(4)
        .action_generator(|args| match args.attempt_number {
            1 => None,
            n => Some(async move { Outcome::Success(n * 100) }.boxed()),
        })
        .build();

    // Declining attempt 1 ends hedging; the primary's failure is returned.
    let outcome = hedge.execute(always_failing(), ResilienceContext::new()).await;
    assert!(outcome.is_error::<TestError>());

    const HEDGED: ResiliencePropertyKey<bool> = ResiliencePropertyKey::new("hedged");
    let hedge = HedgeConfig::builder::<u32>()
        .infinite_delay()
        .max_hedged_attempts(2)
        .action_generator(|args| {
            args.action_context.properties().set(&HEDGED, true);
            let attempt = args.callback.invoke(args.action_context);
            Some(async move { attempt.await.map(|n| n + 1000) }.boxed())
        })
        .build();
    let callback = ResilienceCallback::new(|context: ResilienceContext| async move {
        if context.properties().contains(&HEDGED) {
            Outcome::Success(1)
        } else {
            Outcome::from_error(TestError::new("cold"))
        }
    });

    let outcome = hedge.execute(callback, ResilienceContext::new()).await;
    assert_eq!(outcome.into_result().unwrap(), 1001);
}

#[tokio::test]
async fn panicking_generator_fails_only_that_attempt() {
    let hedge = HedgeConfig::builder::<u32>()
        .infinite_delay()
        .max_hedged_attempts(2)
        .action_generator(|_| panic!("generator bug"))
        .build();

    let outcome = hedge.execute(always_failing(), ResilienceContext::new()).await;

    // The secondary's panic is captured; the primary's failure wins the tie.
    assert!(outcome.is_error::<TestError>());

    let hedge = HedgeConfig::builder::<u32>()
        .infinite_delay()
        .max_hedged_attempts(2)
        .should_handle(|outcome| outcome.is_error::<TestError>())
        .action_generator(|_| panic!("generator bug"))
        .build();
    let outcome = hedge.execute(always_failing(), ResilienceContext::new()).await;
    let error = outcome.error().unwrap().downcast_ref::<HedgeError>().unwrap();
    assert!(error.is_panic());
}
