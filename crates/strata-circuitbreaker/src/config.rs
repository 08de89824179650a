use crate::args::{
    BreakDurationGenerator, BreakDurationGeneratorArguments, CircuitCallback,
    OnCircuitClosedArguments, OnCircuitHalfOpenedArguments, OnCircuitOpenedArguments,
};
use crate::events::CircuitBreakerEvent;
use crate::manual_control::CircuitBreakerManualControl;
use crate::state::CircuitState;
use crate::state_provider::CircuitBreakerStateProvider;
use crate::strategy::CircuitBreakerStrategy;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use strata_core::{
    BoxError, ConfigError, DefaultClassifier, EventListeners, FnClassifier, FnListener, Outcome,
    OutcomeClassifier, SharedClassifier, SharedTimeProvider, SystemTimeProvider,
};

const MIN_BREAK_DURATION: Duration = Duration::from_millis(500);
const MIN_SAMPLING_DURATION: Duration = Duration::from_millis(500);
const MIN_THROUGHPUT: u32 = 2;

/// How handled failures are turned into a decision to open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BehaviorOptions {
    /// Open after `threshold` consecutive failures while closed.
    ConsecutiveFailures { threshold: u32 },
    /// Open once at least `minimum_throughput` calls were sampled within
    /// `sampling_duration` and at least `failure_ratio` of them failed.
    Advanced {
        failure_ratio: f64,
        minimum_throughput: u32,
        sampling_duration: Duration,
    },
}

impl Default for BehaviorOptions {
    fn default() -> Self {
        BehaviorOptions::Advanced {
            failure_ratio: 0.1,
            minimum_throughput: 100,
            sampling_duration: Duration::from_secs(30),
        }
    }
}

/// Validated configuration of a circuit breaker.
pub struct CircuitBreakerConfig<T> {
    pub(crate) name: String,
    pub(crate) behavior: BehaviorOptions,
    pub(crate) break_duration: Duration,
    pub(crate) break_duration_generator: Option<BreakDurationGenerator>,
    pub(crate) classifier: SharedClassifier<T>,
    pub(crate) on_opened: Option<CircuitCallback<OnCircuitOpenedArguments>>,
    pub(crate) on_closed: Option<CircuitCallback<OnCircuitClosedArguments>>,
    pub(crate) on_half_opened: Option<CircuitCallback<OnCircuitHalfOpenedArguments>>,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) time: SharedTimeProvider,
    pub(crate) manual_control: Option<CircuitBreakerManualControl>,
    pub(crate) state_provider: Option<CircuitBreakerStateProvider>,
}

impl<T: Send + 'static> CircuitBreakerConfig<T> {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder<T> {
        CircuitBreakerConfigBuilder::new()
    }
}

/// Builder for a circuit breaker.
pub struct CircuitBreakerConfigBuilder<T> {
    name: String,
    consecutive_threshold: Option<u32>,
    failure_ratio: f64,
    minimum_throughput: u32,
    sampling_duration: Duration,
    break_duration: Duration,
    break_duration_generator: Option<BreakDurationGenerator>,
    classifier: SharedClassifier<T>,
    on_opened: Option<CircuitCallback<OnCircuitOpenedArguments>>,
    on_closed: Option<CircuitCallback<OnCircuitClosedArguments>>,
    on_half_opened: Option<CircuitCallback<OnCircuitHalfOpenedArguments>>,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    time: SharedTimeProvider,
    manual_control: Option<CircuitBreakerManualControl>,
    state_provider: Option<CircuitBreakerStateProvider>,
}

impl<T: Send + 'static> CircuitBreakerConfigBuilder<T> {
    /// Creates a builder with the advanced behavior and its defaults.
    pub fn new() -> Self {
        Self {
            name: String::from("circuitbreaker"),
            consecutive_threshold: None,
            failure_ratio: 0.1,
            minimum_throughput: 100,
            sampling_duration: Duration::from_secs(30),
            break_duration: Duration::from_secs(5),
            break_duration_generator: None,
            classifier: Arc::new(DefaultClassifier),
            on_opened: None,
            on_closed: None,
            on_half_opened: None,
            event_listeners: EventListeners::new(),
            time: SystemTimeProvider::shared(),
            manual_control: None,
            state_provider: None,
        }
    }

    /// Give this circuit breaker a name for observability.
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Switches to the consecutive-failures behavior with the given threshold.
    pub fn consecutive_failures(mut self, threshold: u32) -> Self {
        self.consecutive_threshold = Some(threshold);
        self
    }

    /// Failure ratio at which the advanced behavior opens the circuit.
    ///
    /// Default: 0.1
    pub fn failure_ratio(mut self, ratio: f64) -> Self {
        self.failure_ratio = ratio;
        self
    }

    /// Calls that must be sampled before the advanced behavior may open.
    ///
    /// Default: 100, minimum 2
    pub fn minimum_throughput(mut self, calls: u32) -> Self {
        self.minimum_throughput = calls;
        self
    }

    /// Window over which the advanced behavior samples calls.
    ///
    /// Default: 30 seconds, minimum 500ms
    pub fn sampling_duration(mut self, duration: Duration) -> Self {
        self.sampling_duration = duration;
        self
    }

    /// How long the circuit stays open before admitting a test call.
    ///
    /// Default: 5 seconds, minimum 500ms
    pub fn break_duration(mut self, duration: Duration) -> Self {
        self.break_duration = duration;
        self
    }

    /// Computes the break duration each time the circuit opens automatically.
    ///
    /// Half-open re-arming still uses the static break duration.
    pub fn break_duration_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(BreakDurationGeneratorArguments) -> Duration + Send + Sync + 'static,
    {
        self.break_duration_generator = Some(Arc::new(generator));
        self
    }

    /// Decides which outcomes count as failures.
    ///
    /// By default every error except cancellation is a failure.
    pub fn should_handle<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Outcome<T>) -> bool + Send + Sync + 'static,
    {
        self.classifier = Arc::new(FnClassifier::new(predicate));
        self
    }

    /// Uses a custom [`OutcomeClassifier`].
    pub fn classifier<C>(mut self, classifier: C) -> Self
    where
        C: OutcomeClassifier<T> + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Called, in order with the other callbacks, after the circuit opens.
    ///
    /// The call that opened the circuit waits for the callback; an error it
    /// returns replaces that call's outcome.
    pub fn on_opened<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(OnCircuitOpenedArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_opened = Some(Arc::new(move |args| f(args).boxed()));
        self
    }

    /// Called after the circuit closes.
    pub fn on_closed<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(OnCircuitClosedArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_closed = Some(Arc::new(move |args| f(args).boxed()));
        self
    }

    /// Called after the circuit moves to half-open, before the test call runs.
    pub fn on_half_opened<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(OnCircuitHalfOpenedArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_half_opened = Some(Arc::new(move |args| f(args).boxed()));
        self
    }

    /// Registers a synchronous listener for state transitions.
    ///
    /// # Example
    /// ```rust
    /// use strata_circuitbreaker::{CircuitBreakerConfig, CircuitState};
    ///
    /// let breaker = CircuitBreakerConfig::<()>::builder()
    ///     .on_state_transition(|from, to| {
    ///         if to == CircuitState::Open {
    ///             println!("circuit opened (was {from})");
    ///         }
    ///     })
    ///     .build();
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Registers a listener for rejected calls.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallRejected { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a listener for every event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Overrides the clock, for tests.
    pub fn time_provider(mut self, time: SharedTimeProvider) -> Self {
        self.time = time;
        self
    }

    /// Binds a manual control to the breaker being built.
    pub fn manual_control(mut self, control: &CircuitBreakerManualControl) -> Self {
        self.manual_control = Some(control.clone());
        self
    }

    /// Binds a state provider to the breaker being built.
    pub fn state_provider(mut self, provider: &CircuitBreakerStateProvider) -> Self {
        self.state_provider = Some(provider.clone());
        self
    }

    /// Validates the options and builds the breaker.
    pub fn try_build(self) -> Result<CircuitBreakerStrategy<T>, ConfigError> {
        if self.break_duration < MIN_BREAK_DURATION {
            return Err(ConfigError::new("break_duration", "must be at least 500ms"));
        }

        let behavior = match self.consecutive_threshold {
            Some(0) => {
                return Err(ConfigError::new("consecutive_failures", "must be at least 1"));
            }
            Some(threshold) => BehaviorOptions::ConsecutiveFailures { threshold },
            None => {
                if !(0.0..=1.0).contains(&self.failure_ratio) {
                    return Err(ConfigError::new(
                        "failure_ratio",
                        "must be between 0.0 and 1.0",
                    ));
                }
                if self.minimum_throughput < MIN_THROUGHPUT {
                    return Err(ConfigError::new("minimum_throughput", "must be at least 2"));
                }
                if self.sampling_duration < MIN_SAMPLING_DURATION {
                    return Err(ConfigError::new(
                        "sampling_duration",
                        "must be at least 500ms",
                    ));
                }
                BehaviorOptions::Advanced {
                    failure_ratio: self.failure_ratio,
                    minimum_throughput: self.minimum_throughput,
                    sampling_duration: self.sampling_duration,
                }
            }
        };

        if self.manual_control.as_ref().is_some_and(|c| c.is_bound()) {
            return Err(already_bound("manual_control"));
        }
        if self.state_provider.as_ref().is_some_and(|p| p.is_bound()) {
            return Err(already_bound("state_provider"));
        }

        CircuitBreakerStrategy::from_config(CircuitBreakerConfig {
            name: self.name,
            behavior,
            break_duration: self.break_duration,
            break_duration_generator: self.break_duration_generator,
            classifier: self.classifier,
            on_opened: self.on_opened,
            on_closed: self.on_closed,
            on_half_opened: self.on_half_opened,
            event_listeners: self.event_listeners,
            time: self.time,
            manual_control: self.manual_control,
            state_provider: self.state_provider,
        })
    }

    /// Builds the breaker.
    ///
    /// # Panics
    ///
    /// Panics if an option is out of range or a manual control / state
    /// provider is already bound to another breaker. Use
    /// [`try_build`](Self::try_build) to handle these as errors.
    pub fn build(self) -> CircuitBreakerStrategy<T> {
        match self.try_build() {
            Ok(strategy) => strategy,
            Err(error) => panic!("{error}"),
        }
    }
}

impl<T: Send + 'static> Default for CircuitBreakerConfigBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn already_bound(option: &'static str) -> ConfigError {
    ConfigError::new(option, "already bound to a circuit breaker")
}
