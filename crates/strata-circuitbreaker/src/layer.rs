use crate::config::CircuitBreakerConfigBuilder;
use crate::state::CircuitState;
use crate::strategy::CircuitBreakerStrategy;
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use std::time::Duration;
use strata_core::{BoxError, Outcome, OutcomeError, ResilienceContext};
use tower_layer::Layer;
use tower_service::Service;

/// A Tower Layer that puts a circuit breaker in front of an inner service.
///
/// `T` is the response type of the wrapped service. Every service produced
/// by one layer shares the same circuit.
///
/// ```rust
/// use tower::{ServiceBuilder, service_fn};
/// use strata_circuitbreaker::CircuitBreakerLayer;
///
/// let layer = CircuitBreakerLayer::<String>::builder()
///     .consecutive_failures(5)
///     .build_layer();
///
/// let service = ServiceBuilder::new()
///     .layer(layer)
///     .service(service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) }));
/// ```
pub struct CircuitBreakerLayer<T> {
    strategy: CircuitBreakerStrategy<T>,
}

impl<T> Clone for CircuitBreakerLayer<T> {
    fn clone(&self) -> Self {
        Self {
            strategy: self.strategy.clone(),
        }
    }
}

impl<T: Send + 'static> CircuitBreakerLayer<T> {
    pub fn new(strategy: CircuitBreakerStrategy<T>) -> Self {
        Self { strategy }
    }

    pub fn builder() -> CircuitBreakerConfigBuilder<T> {
        CircuitBreakerConfigBuilder::new()
    }

    /// Preset: the default sampling breaker.
    ///
    /// - 10% failure ratio over 30 seconds
    /// - at least 100 calls sampled
    /// - 5 second break
    pub fn standard() -> CircuitBreakerConfigBuilder<T> {
        Self::builder()
    }

    /// Preset: opens quickly for latency-sensitive callers.
    ///
    /// - 5 consecutive failures
    /// - 10 second break
    pub fn fast_fail() -> CircuitBreakerConfigBuilder<T> {
        Self::builder()
            .consecutive_failures(5)
            .break_duration(Duration::from_secs(10))
    }

    /// Preset: tolerates bursts of errors from flaky dependencies.
    ///
    /// - 50% failure ratio over 60 seconds
    /// - at least 200 calls sampled
    /// - 60 second break
    pub fn tolerant() -> CircuitBreakerConfigBuilder<T> {
        Self::builder()
            .failure_ratio(0.5)
            .minimum_throughput(200)
            .sampling_duration(Duration::from_secs(60))
            .break_duration(Duration::from_secs(60))
    }

    /// The strategy shared by every service this layer produces.
    pub fn strategy(&self) -> &CircuitBreakerStrategy<T> {
        &self.strategy
    }
}

impl<T: Send + 'static> CircuitBreakerConfigBuilder<T> {
    /// Builds the breaker and wraps it in a [`CircuitBreakerLayer`].
    ///
    /// # Panics
    ///
    /// Panics on invalid options, like [`build`](Self::build).
    pub fn build_layer(self) -> CircuitBreakerLayer<T> {
        CircuitBreakerLayer::new(self.build())
    }
}

impl<S, T> Layer<S> for CircuitBreakerLayer<T> {
    type Service = CircuitBreaker<S, T>;

    fn layer(&self, inner: S) -> Self::Service {
        CircuitBreaker {
            inner,
            strategy: CircuitBreakerStrategy::clone(&self.strategy),
        }
    }
}

/// A Tower Service guarded by a circuit breaker.
///
/// Rejections surface as an [`OutcomeError`] wrapping
/// [`BrokenCircuitError`](crate::BrokenCircuitError) or
/// [`IsolatedCircuitError`](crate::IsolatedCircuitError); inner errors are
/// wrapped unchanged.
pub struct CircuitBreaker<S, T> {
    inner: S,
    strategy: CircuitBreakerStrategy<T>,
}

impl<S: Clone, T> Clone for CircuitBreaker<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            strategy: self.strategy.clone(),
        }
    }
}

impl<S, T> CircuitBreaker<S, T> {
    pub fn circuit_state(&self) -> CircuitState {
        self.strategy.controller().circuit_state()
    }

    pub fn strategy(&self) -> &CircuitBreakerStrategy<T> {
        &self.strategy
    }
}

impl<S, Req> Service<Req> for CircuitBreaker<S, S::Response>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = OutcomeError;
    type Future = BoxFuture<'static, Result<S::Response, OutcomeError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(|error| OutcomeError::from_boxed(error.into()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let strategy = self.strategy.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            strategy
                .execute_guarded(ResilienceContext::new(), move |_context| {
                    let response = inner.call(req);
                    async move { Outcome::from(response.await.map_err(Into::<BoxError>::into)) }
                })
                .await
                .into_result()
        })
    }
}
