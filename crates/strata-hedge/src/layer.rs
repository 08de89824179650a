//! Tower Layer implementation for hedging.

use crate::config::HedgeConfigBuilder;
use crate::strategy::HedgingStrategy;
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use std::time::Duration;
use strata_core::{BoxError, Outcome, OutcomeError, ResilienceCallback, ResilienceContext};
use tower::ServiceExt;
use tower_layer::Layer;
use tower_service::Service;

/// A Tower [`Layer`] that applies hedging to a service.
///
/// Every attempt calls a clone of the inner service with a clone of the
/// request, so both must be `Clone`.
pub struct HedgeLayer<T> {
    strategy: HedgingStrategy<T>,
}

impl<T> Clone for HedgeLayer<T> {
    fn clone(&self) -> Self {
        Self {
            strategy: self.strategy.clone(),
        }
    }
}

impl<T: Send + 'static> HedgeLayer<T> {
    /// Wraps an already built strategy.
    pub fn new(strategy: HedgingStrategy<T>) -> Self {
        Self { strategy }
    }

    /// Create a layer that fires a single hedge after `delay`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use strata_hedge::HedgeLayer;
    /// use std::time::Duration;
    ///
    /// let layer = HedgeLayer::<String>::with_delay(Duration::from_millis(100));
    /// ```
    pub fn with_delay(delay: Duration) -> Self {
        Self::builder().delay(delay).build_layer()
    }

    /// Create a builder for configuring the hedge layer.
    pub fn builder() -> HedgeConfigBuilder<T> {
        HedgeConfigBuilder::new()
    }

    /// The strategy shared by every service this layer produces.
    pub fn strategy(&self) -> &HedgingStrategy<T> {
        &self.strategy
    }
}

impl<S, T> Layer<S> for HedgeLayer<T> {
    type Service = Hedge<S, T>;

    fn layer(&self, inner: S) -> Self::Service {
        Hedge {
            inner,
            strategy: HedgingStrategy::clone(&self.strategy),
        }
    }
}

/// A Tower Service that hedges calls to its inner service.
pub struct Hedge<S, T> {
    inner: S,
    strategy: HedgingStrategy<T>,
}

impl<S: Clone, T> Clone for Hedge<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            strategy: self.strategy.clone(),
        }
    }
}

impl<S, T> Hedge<S, T> {
    pub fn strategy(&self) -> &HedgingStrategy<T> {
        &self.strategy
    }
}

impl<S, Req> Service<Req> for Hedge<S, S::Response>
where
    S: Service<Req> + Clone + Send + Sync + 'static,
    S::Response: Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    Req: Clone + Send + Sync + 'static,
{
    type Response = S::Response;
    type Error = OutcomeError;
    type Future = BoxFuture<'static, Result<S::Response, OutcomeError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Each attempt drives its own clone to readiness.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let strategy = self.strategy.clone();
        let inner = self.inner.clone();
        let callback = ResilienceCallback::new(move |_context| {
            let attempt = inner.clone().oneshot(req.clone());
            async move { Outcome::from(attempt.await.map_err(Into::<BoxError>::into)) }
        });

        Box::pin(async move {
            strategy
                .execute(callback, ResilienceContext::new())
                .await
                .into_result()
        })
    }
}
