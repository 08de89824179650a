//! Property tests for hedging.
//!
//! Invariants tested:
//! - Never starts more attempts than configured
//! - The first unhandled outcome wins
//! - Every started attempt is reported exactly once

use super::TestError;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strata_core::{FnListener, ResiliencePipeline};
use strata_hedge::{HedgeConfig, HedgeEvent};
use tokio::runtime::Runtime;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// Property: an always failing operation is attempted exactly max times
    #[test]
    fn attempts_are_capped(max_attempts in 1usize..=10, parallel in any::<bool>()) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let calls = Arc::new(AtomicUsize::new(0));
            let reported = Arc::new(AtomicUsize::new(0));
            let seen = Arc::clone(&reported);
            let builder = HedgeConfig::builder::<u32>()
                .max_hedged_attempts(max_attempts)
                .on_event(FnListener::new(move |event: &HedgeEvent| {
                    if matches!(event, HedgeEvent::ExecutionAttempt { .. }) {
                        seen.fetch_add(1, Ordering::SeqCst);
                    }
                }));
            let builder = if parallel { builder.no_delay() } else { builder.infinite_delay() };
            let hedge = builder.build();
            let pipeline = ResiliencePipeline::builder().add_strategy(hedge.clone()).build();

            let counted = Arc::clone(&calls);
            let result = pipeline
                .execute(move |_| {
                    counted.fetch_add(1, Ordering::SeqCst);
                    async { Err::<u32, _>(TestError) }
                })
                .await;

            prop_assert!(result.is_err());
            prop_assert_eq!(calls.load(Ordering::SeqCst), max_attempts);

            // Attempts report from their own tasks; give them a moment.
            for _ in 0..1_000 {
                if reported.load(Ordering::SeqCst) == max_attempts {
                    break;
                }
                tokio::task::yield_now().await;
            }
            prop_assert_eq!(reported.load(Ordering::SeqCst), max_attempts);
            Ok(())
        })?;
    }

    /// Property: in fallback mode the first succeeding attempt's value is returned
    #[test]
    fn first_success_wins(max_attempts in 1usize..=10, succeed_at in 0usize..10) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let calls = Arc::new(AtomicUsize::new(0));
            let pipeline = ResiliencePipeline::builder()
                .add_strategy(
                    HedgeConfig::builder::<u32>()
                        .max_hedged_attempts(max_attempts)
                        .infinite_delay()
                        .build(),
                )
                .build();

            let counted = Arc::clone(&calls);
            let result = pipeline
                .execute(move |_| {
                    let attempt = counted.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt == succeed_at {
                            Ok(attempt as u32)
                        } else {
                            Err(TestError)
                        }
                    }
                })
                .await;

            if succeed_at < max_attempts {
                prop_assert_eq!(result.unwrap(), succeed_at as u32);
                prop_assert_eq!(calls.load(Ordering::SeqCst), succeed_at + 1);
            } else {
                prop_assert!(result.unwrap_err().is::<TestError>());
                prop_assert_eq!(calls.load(Ordering::SeqCst), max_attempts);
            }
            Ok(())
        })?;
    }
}
