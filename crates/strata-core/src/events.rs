//! Event system for strategies.
//!
//! Every strategy reports what it does through a typed event enum. Listeners
//! are plain callbacks; a panicking listener never affects the strategy or
//! the other listeners.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// How noteworthy an event is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Not reported anywhere.
    None,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Lowercase name, used as a metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Debug => "debug",
            Severity::Information => "information",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

/// Trait for events emitted by strategies.
pub trait ResilienceEvent: Send + Sync + fmt::Debug {
    /// Returns the type of event (e.g., "state_transition", "execution_attempt").
    fn event_type(&self) -> &'static str;

    /// Returns when this event occurred, as seen by the strategy's time provider.
    fn timestamp(&self) -> Instant;

    /// Returns the name of the strategy instance that emitted this event.
    fn pattern_name(&self) -> &str;

    /// Returns how noteworthy the event is.
    fn severity(&self) -> Severity {
        Severity::Information
    }
}

/// Trait for listening to events.
pub trait EventListener<E: ResilienceEvent>: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &E);
}

/// Type alias for shared event listeners.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// A collection of event listeners.
#[derive(Clone)]
pub struct EventListeners<E: ResilienceEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: ResilienceEvent> EventListeners<E> {
    /// Creates a new empty collection.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Adds a listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Adds a closure as a listener.
    pub fn add_fn<F>(&mut self, f: F)
    where
        E: 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.add(FnListener::new(f));
    }

    /// Delivers an event to every listener.
    ///
    /// Events with [`Severity::None`] are dropped. A panicking listener is
    /// isolated; the remaining listeners still receive the event.
    pub fn emit(&self, event: &E) {
        if event.severity() == Severity::None {
            return;
        }

        for listener in &self.listeners {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));

            #[cfg(feature = "tracing")]
            if let Err(panic) = &result {
                tracing::warn!(
                    pattern = event.pattern_name(),
                    event_type = event.event_type(),
                    panic = %crate::error::panic_message(panic.as_ref()),
                    "Event listener panicked"
                );
            }
            #[cfg(not(feature = "tracing"))]
            let _ = result;
        }
    }

    /// Returns true if there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns the number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ResilienceEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// A closure-based event listener.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: ResilienceEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
