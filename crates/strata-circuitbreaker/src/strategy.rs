//! The circuit breaker as a composable strategy.

use crate::behavior::{AdvancedBehavior, CircuitBehavior, ConsecutiveFailuresBehavior};
use crate::config::{already_bound, BehaviorOptions, CircuitBreakerConfig};
use crate::controller::{CircuitStateController, ControllerOptions};
use crate::layer::CircuitBreakerLayer;
use crate::state::CircuitState;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use strata_core::{
    ConfigError, Outcome, ResilienceCallback, ResilienceContext, ResilienceStrategy,
    SharedClassifier,
};

/// A built circuit breaker.
///
/// Cheap to clone; clones share the same circuit.
pub struct CircuitBreakerStrategy<T> {
    controller: Arc<CircuitStateController>,
    classifier: SharedClassifier<T>,
}

impl<T> Clone for CircuitBreakerStrategy<T> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
            classifier: Arc::clone(&self.classifier),
        }
    }
}

impl<T> CircuitBreakerStrategy<T> {
    /// The state controller behind this breaker.
    pub fn controller(&self) -> &Arc<CircuitStateController> {
        &self.controller
    }

    pub fn name(&self) -> &str {
        self.controller.name()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.controller.circuit_state()
    }
}

impl<T: Send + 'static> CircuitBreakerStrategy<T> {
    pub(crate) fn from_config(config: CircuitBreakerConfig<T>) -> Result<Self, ConfigError> {
        let behavior = match config.behavior {
            BehaviorOptions::ConsecutiveFailures { threshold } => {
                CircuitBehavior::ConsecutiveFailures(ConsecutiveFailuresBehavior::new(threshold))
            }
            BehaviorOptions::Advanced {
                failure_ratio,
                minimum_throughput,
                sampling_duration,
            } => CircuitBehavior::Advanced(AdvancedBehavior::new(
                failure_ratio,
                minimum_throughput,
                sampling_duration,
                Arc::clone(&config.time),
            )),
        };

        let controller = Arc::new(CircuitStateController::new(ControllerOptions {
            name: config.name,
            behavior,
            break_duration: config.break_duration,
            break_duration_generator: config.break_duration_generator,
            on_opened: config.on_opened,
            on_closed: config.on_closed,
            on_half_opened: config.on_half_opened,
            listeners: config.event_listeners,
            time: config.time,
        }));

        if let Some(provider) = &config.state_provider {
            provider
                .bind(&controller)
                .map_err(|_| already_bound("state_provider"))?;
        }
        if let Some(control) = &config.manual_control {
            let isolated = control
                .bind(&controller)
                .map_err(|_| already_bound("manual_control"))?;
            if isolated {
                controller.isolate_detached();
            }
        }

        Ok(Self {
            controller,
            classifier: config.classifier,
        })
    }

    /// Wraps this breaker as a tower layer sharing the same circuit.
    pub fn layer(&self) -> CircuitBreakerLayer<T> {
        CircuitBreakerLayer::new(self.clone())
    }

    /// Disposes the controller; later calls fail with
    /// [`CircuitBreakerError::Disposed`](crate::CircuitBreakerError::Disposed).
    pub fn dispose(&self) {
        self.controller.dispose();
    }

    /// Runs `operation` through the breaker.
    ///
    /// `operation` is only called when the breaker admits the call.
    pub(crate) async fn execute_guarded<F, Fut>(
        &self,
        context: ResilienceContext,
        operation: F,
    ) -> Outcome<T>
    where
        F: FnOnce(ResilienceContext) -> Fut,
        Fut: Future<Output = Outcome<T>>,
    {
        match self.controller.on_action_pre_execute::<T>(&context).await {
            Ok(Some(rejected)) => return rejected,
            Ok(None) => {}
            Err(error) => return Outcome::from_error(error),
        }

        let outcome = operation(context.clone()).await;

        let recorded = if self.classifier.should_handle(&outcome) {
            self.controller.on_action_failure(&outcome, &context).await
        } else {
            self.controller.on_action_success(&outcome, &context).await
        };

        match recorded {
            Ok(()) => outcome,
            Err(error) => Outcome::from_error(error),
        }
    }
}

impl<T: Send + 'static> ResilienceStrategy<T> for CircuitBreakerStrategy<T> {
    fn execute_core<'a>(
        &'a self,
        callback: ResilienceCallback<T>,
        context: ResilienceContext,
    ) -> BoxFuture<'a, Outcome<T>> {
        self.execute_guarded(context, move |context| callback.invoke(context))
            .boxed()
    }
}

impl<T> std::fmt::Debug for CircuitBreakerStrategy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerStrategy")
            .field("controller", &self.controller)
            .finish()
    }
}
