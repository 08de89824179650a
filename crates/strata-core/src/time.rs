//! Injectable time.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of the current instant and of delays.
///
/// Strategies never read the clock directly, which lets tests drive time
/// with [`FakeTimeProvider`].
pub trait TimeProvider: Send + Sync + fmt::Debug {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Returns a future that completes after `duration`.
    ///
    /// `Duration::MAX` means forever.
    fn delay(&self, duration: Duration) -> BoxFuture<'static, ()>;

    /// Time elapsed since `earlier`, saturating at zero.
    fn elapsed(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }
}

/// Shared time provider, as stored by strategies.
pub type SharedTimeProvider = Arc<dyn TimeProvider>;

/// The tokio clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl SystemTimeProvider {
    /// Returns the system provider as a shared handle.
    pub fn shared() -> SharedTimeProvider {
        Arc::new(SystemTimeProvider)
    }
}

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn delay(&self, duration: Duration) -> BoxFuture<'static, ()> {
        if duration == Duration::MAX {
            return futures::future::pending().boxed();
        }
        tokio::time::sleep(duration).boxed()
    }
}

/// A point in time that may never arrive.
///
/// Adding a duration to an instant can overflow; such deadlines saturate to
/// [`Deadline::Never`] instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Already in the past.
    Elapsed,
    At(Instant),
    Never,
}

impl Deadline {
    /// The deadline `duration` after `now`.
    pub fn after(now: Instant, duration: Duration) -> Self {
        now.checked_add(duration).map_or(Deadline::Never, Deadline::At)
    }

    /// Returns true once `now` has reached the deadline.
    pub fn has_passed(&self, now: Instant) -> bool {
        match self {
            Deadline::Elapsed => true,
            Deadline::At(at) => now >= *at,
            Deadline::Never => false,
        }
    }

    /// Time left until the deadline; `None` for a deadline that never arrives.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        match self {
            Deadline::Elapsed => Some(Duration::ZERO),
            Deadline::At(at) => Some(at.saturating_duration_since(now)),
            Deadline::Never => None,
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use tokio::sync::oneshot;

    /// A manually driven clock for tests.
    ///
    /// Time only moves on [`FakeTimeProvider::advance`], which also fires every
    /// delay whose deadline has been reached, earliest first.
    #[derive(Debug, Clone)]
    pub struct FakeTimeProvider {
        clock: Arc<Mutex<FakeClock>>,
    }

    #[derive(Debug)]
    struct FakeClock {
        now: Instant,
        timers: Vec<(Instant, oneshot::Sender<()>)>,
    }

    impl FakeTimeProvider {
        pub fn new() -> Self {
            Self {
                clock: Arc::new(Mutex::new(FakeClock {
                    now: Instant::now(),
                    timers: Vec::new(),
                })),
            }
        }

        /// Moves time forward and fires due delays.
        pub fn advance(&self, by: Duration) {
            let mut due = {
                let mut clock = self.clock.lock();
                clock.now += by;
                let now = clock.now;
                let (due, pending): (Vec<_>, Vec<_>) =
                    clock.timers.drain(..).partition(|(at, _)| *at <= now);
                clock.timers = pending;
                due
            };

            due.sort_by_key(|(at, _)| *at);
            for (_, timer) in due {
                let _ = timer.send(());
            }
        }

        /// Number of delays that have not fired yet.
        pub fn pending_timers(&self) -> usize {
            self.clock.lock().timers.len()
        }

        pub fn shared(&self) -> SharedTimeProvider {
            Arc::new(self.clone())
        }
    }

    impl Default for FakeTimeProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TimeProvider for FakeTimeProvider {
        fn now(&self) -> Instant {
            self.clock.lock().now
        }

        fn delay(&self, duration: Duration) -> BoxFuture<'static, ()> {
            if duration.is_zero() {
                return futures::future::ready(()).boxed();
            }

            let mut clock = self.clock.lock();
            let Some(at) = clock.now.checked_add(duration) else {
                return futures::future::pending().boxed();
            };
            let (tx, rx) = oneshot::channel();
            clock.timers.push((at, tx));

            async move {
                let _ = rx.await;
            }
            .boxed()
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use fake::FakeTimeProvider;
