//! The tower layer.

use super::TestError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strata_circuitbreaker::{
    BrokenCircuitError, CircuitBreakerLayer, CircuitBreakerStateProvider, CircuitState,
};
use strata_core::FakeTimeProvider;
use tower::{service_fn, Layer, Service, ServiceExt};

#[tokio::test]
async fn layer_opens_and_recovers() {
    let time = FakeTimeProvider::new();
    let provider = CircuitBreakerStateProvider::new();
    let healthy = Arc::new(AtomicUsize::new(0));
    let calls = Arc::new(AtomicUsize::new(0));

    let (flag, counter) = (Arc::clone(&healthy), Arc::clone(&calls));
    let service = service_fn(move |req: u32| {
        counter.fetch_add(1, Ordering::SeqCst);
        let healthy = flag.load(Ordering::SeqCst) == 1;
        async move {
            if healthy {
                Ok(req * 2)
            } else {
                Err(TestError)
            }
        }
    });

    let layer = CircuitBreakerLayer::<u32>::fast_fail()
        .break_duration(Duration::from_secs(1))
        .state_provider(&provider)
        .time_provider(time.shared())
        .build_layer();
    let mut service = layer.layer(service);

    for _ in 0..5 {
        let error = service.ready().await.unwrap().call(1).await.unwrap_err();
        assert!(error.is::<TestError>());
    }
    assert_eq!(provider.circuit_state(), CircuitState::Open);

    let error = service.ready().await.unwrap().call(1).await.unwrap_err();
    assert!(error.is::<BrokenCircuitError>());
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    healthy.store(1, Ordering::SeqCst);
    time.advance(Duration::from_secs(1));
    let response = service.ready().await.unwrap().call(21).await.unwrap();
    assert_eq!(response, 42);
    assert_eq!(provider.circuit_state(), CircuitState::Closed);
}

#[tokio::test]
async fn services_from_one_layer_share_the_circuit() {
    let layer = CircuitBreakerLayer::<u32>::builder()
        .consecutive_failures(2)
        .build_layer();
    let failing = layer.layer(service_fn(|_: u32| async { Err::<u32, _>(TestError) }));
    let healthy = layer.layer(service_fn(|req: u32| async move { Ok::<_, TestError>(req) }));

    for _ in 0..2 {
        let _ = failing.clone().oneshot(1).await;
    }

    let error = healthy.clone().oneshot(1).await.unwrap_err();
    assert!(error.is::<BrokenCircuitError>());
    assert_eq!(healthy.circuit_state(), CircuitState::Open);
}
