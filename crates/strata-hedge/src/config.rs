//! Configuration for the hedging strategy.

use crate::args::{
    default_action_generator, HedgingAction, HedgingActionGenerator,
    HedgingActionGeneratorArguments, HedgingDelayGenerator, HedgingDelayGeneratorArguments,
    OnHedgingArguments, OnHedgingCallback,
};
use crate::controller::HedgingController;
use crate::events::HedgeEvent;
use crate::handler::HedgingHandler;
use crate::layer::HedgeLayer;
use crate::strategy::HedgingStrategy;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use strata_core::{
    BoxError, CancellationTokenPool, ConfigError, DefaultClassifier, EventListener,
    EventListeners, FnClassifier, FnListener, Outcome, OutcomeClassifier, SharedClassifier,
    SharedTimeProvider, SystemTimeProvider,
};

const MAX_HEDGED_ATTEMPTS: usize = 10;

/// Delay strategy for hedged attempts.
#[derive(Clone)]
pub enum HedgeDelay {
    /// Fixed delay before each hedged attempt.
    Fixed(Duration),
    /// No delay: launch every attempt at once (parallel mode).
    Immediate,
    /// Never launch a hedge on a timer; hedge only after a handled outcome.
    Infinite,
    /// Delay computed per attempt.
    Dynamic(HedgingDelayGenerator),
}

impl HedgeDelay {
    /// The delay before the given attempt; `Duration::MAX` means never.
    pub fn get_delay(&self, args: HedgingDelayGeneratorArguments) -> Duration {
        match self {
            HedgeDelay::Fixed(delay) => *delay,
            HedgeDelay::Immediate => Duration::ZERO,
            HedgeDelay::Infinite => Duration::MAX,
            HedgeDelay::Dynamic(f) => f(args),
        }
    }
}

impl Default for HedgeDelay {
    fn default() -> Self {
        HedgeDelay::Fixed(Duration::from_secs(2))
    }
}

impl std::fmt::Debug for HedgeDelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HedgeDelay::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
            HedgeDelay::Immediate => f.write_str("Immediate"),
            HedgeDelay::Infinite => f.write_str("Infinite"),
            HedgeDelay::Dynamic(_) => f.write_str("Dynamic"),
        }
    }
}

/// Entry point for configuring a hedging strategy.
pub struct HedgeConfig;

impl HedgeConfig {
    /// Creates a new configuration builder.
    pub fn builder<T: Send + 'static>() -> HedgeConfigBuilder<T> {
        HedgeConfigBuilder::new()
    }
}

/// Builder for a hedging strategy.
///
/// # Example
///
/// ```rust
/// use strata_hedge::HedgeConfig;
/// use std::time::Duration;
///
/// let hedge = HedgeConfig::builder::<String>()
///     .delay(Duration::from_millis(100))
///     .max_hedged_attempts(3)
///     .build();
/// ```
pub struct HedgeConfigBuilder<T> {
    name: String,
    max_hedged_attempts: usize,
    delay: HedgeDelay,
    classifier: SharedClassifier<T>,
    action_generator: HedgingActionGenerator<T>,
    on_hedging: Option<OnHedgingCallback>,
    listeners: EventListeners<HedgeEvent>,
    time: SharedTimeProvider,
}

impl<T: Send + 'static> HedgeConfigBuilder<T> {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            name: String::from("hedge"),
            max_hedged_attempts: 2,
            delay: HedgeDelay::default(),
            classifier: Arc::new(DefaultClassifier),
            action_generator: default_action_generator(),
            on_hedging: None,
            listeners: EventListeners::new(),
            time: SystemTimeProvider::shared(),
        }
    }

    /// Set the name for this hedge instance (used in metrics/tracing).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the maximum number of attempts, the primary included.
    ///
    /// Default is 2 (the primary and one hedge); allowed range is 1 to 10.
    pub fn max_hedged_attempts(mut self, n: usize) -> Self {
        self.max_hedged_attempts = n;
        self
    }

    /// Set a fixed delay before each hedged attempt.
    ///
    /// Default is 2 seconds.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = HedgeDelay::Fixed(delay);
        self
    }

    /// Launch every attempt at once (parallel mode).
    pub fn no_delay(mut self) -> Self {
        self.delay = HedgeDelay::Immediate;
        self
    }

    /// Only hedge once an attempt produced a handled outcome (fallback mode).
    pub fn infinite_delay(mut self) -> Self {
        self.delay = HedgeDelay::Infinite;
        self
    }

    /// Compute the delay per attempt.
    ///
    /// # Example
    ///
    /// ```rust
    /// use strata_hedge::HedgeConfig;
    /// use std::time::Duration;
    ///
    /// // 50ms, 100ms, 150ms...
    /// let hedge = HedgeConfig::builder::<u32>()
    ///     .delay_fn(|args| Duration::from_millis(50 * u64::from(args.attempt_number)))
    ///     .max_hedged_attempts(4)
    ///     .build();
    /// ```
    pub fn delay_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(HedgingDelayGeneratorArguments) -> Duration + Send + Sync + 'static,
    {
        self.delay = HedgeDelay::Dynamic(Arc::new(f));
        self
    }

    /// Decides which outcomes are worth hedging.
    ///
    /// By default every error except cancellation is.
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

    /// Produces the action run by each secondary attempt.
    ///
    /// Returning `None` skips the attempt. By default the hedged operation
    /// is invoked again with the attempt's own context.
    pub fn action_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(HedgingActionGeneratorArguments<T>) -> Option<HedgingAction<T>>
            + Send
            + Sync
            + 'static,
    {
        self.action_generator = Arc::new(generator);
        self
    }

    /// Called right before each secondary attempt starts.
    ///
    /// An error it returns becomes that attempt's outcome.
    pub fn on_hedging<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(OnHedgingArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_hedging = Some(Arc::new(move |args| f(args).boxed()));
        self
    }

    /// Add an event listener for hedge events.
    pub fn on_event<L>(mut self, listener: L) -> Self
    where
        L: EventListener<HedgeEvent> + 'static,
    {
        self.listeners.add(listener);
        self
    }

    /// Register a callback for every finished attempt.
    ///
    /// The callback receives the attempt number, its execution time and
    /// whether its outcome was handled.
    pub fn on_attempt<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration, bool) + Send + Sync + 'static,
    {
        self.listeners.add(FnListener::new(move |event: &HedgeEvent| {
            if let HedgeEvent::ExecutionAttempt {
                attempt,
                execution_time,
                handled,
                ..
            } = event
            {
                f(*attempt, *execution_time, *handled);
            }
        }));
        self
    }

    /// Overrides the clock, for tests.
    pub fn time_provider(mut self, time: SharedTimeProvider) -> Self {
        self.time = time;
        self
    }

    /// Validates the options and builds the strategy.
    pub fn try_build(self) -> Result<HedgingStrategy<T>, ConfigError> {
        if !(1..=MAX_HEDGED_ATTEMPTS).contains(&self.max_hedged_attempts) {
            return Err(ConfigError::new(
                "max_hedged_attempts",
                format!("must be between 1 and {MAX_HEDGED_ATTEMPTS}"),
            ));
        }

        let handler = HedgingHandler {
            name: self.name,
            classifier: self.classifier,
            action_generator: self.action_generator,
            on_hedging: self.on_hedging,
            listeners: self.listeners,
            time: self.time,
            tokens: CancellationTokenPool::new(),
        };
        let controller = HedgingController::new(handler, self.max_hedged_attempts);
        Ok(HedgingStrategy::new(controller, self.delay))
    }

    /// Builds the strategy.
    ///
    /// # Panics
    ///
    /// Panics if an option is out of range; see [`try_build`](Self::try_build).
    pub fn build(self) -> HedgingStrategy<T> {
        match self.try_build() {
            Ok(strategy) => strategy,
            Err(error) => panic!("{error}"),
        }
    }

    /// Builds the strategy wrapped in a [`HedgeLayer`].
    pub fn build_layer(self) -> HedgeLayer<T> {
        HedgeLayer::new(self.build())
    }
}

impl<T: Send + 'static> Default for HedgeConfigBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
