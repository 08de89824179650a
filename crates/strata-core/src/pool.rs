//! A small bounded object pool.

use parking_lot::Mutex;
use std::fmt;

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;
type ResetPolicy<T> = Box<dyn Fn(&mut T) -> bool + Send + Sync>;

/// A thread-safe pool of reusable objects.
///
/// `get` hands out a pooled instance or creates a fresh one. `put` runs the
/// reset policy first; an object the policy rejects is dropped instead of
/// being retained. At most `max_retained` idle objects are kept.
pub struct ObjectPool<T> {
    items: Mutex<Vec<T>>,
    create: Factory<T>,
    reset: ResetPolicy<T>,
    max_retained: usize,
}

impl<T> ObjectPool<T> {
    /// Creates a pool with the given factory and reset policy.
    pub fn new<C, R>(create: C, reset: R) -> Self
    where
        C: Fn() -> T + Send + Sync + 'static,
        R: Fn(&mut T) -> bool + Send + Sync + 'static,
    {
        Self {
            items: Mutex::new(Vec::new()),
            create: Box::new(create),
            reset: Box::new(reset),
            max_retained: default_max_retained(),
        }
    }

    /// Sets the maximum number of idle objects kept by the pool.
    pub fn with_max_retained(mut self, max_retained: usize) -> Self {
        self.max_retained = max_retained;
        self
    }

    /// Maximum number of idle objects kept by the pool.
    pub fn max_retained(&self) -> usize {
        self.max_retained
    }

    /// Takes an object from the pool or creates a new one.
    pub fn get(&self) -> T {
        let pooled = self.items.lock().pop();
        pooled.unwrap_or_else(|| (self.create)())
    }

    /// Returns an object to the pool.
    pub fn put(&self, mut item: T) {
        if !(self.reset)(&mut item) {
            return;
        }

        let mut items = self.items.lock();
        if items.len() < self.max_retained {
            items.push(item);
        }
    }

    /// Number of idle objects currently retained.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("idle", &self.len())
            .field("max_retained", &self.max_retained)
            .finish()
    }
}

fn default_max_retained() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(8)
}
