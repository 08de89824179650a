//! Per-execution context and its property bag.

use crate::pool::ObjectPool;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

type PropertyValue = Arc<dyn Any + Send + Sync>;

/// A typed key into [`ResilienceProperties`].
///
/// ```rust
/// use strata_core::{ResilienceContext, ResiliencePropertyKey};
///
/// const TENANT: ResiliencePropertyKey<String> = ResiliencePropertyKey::new("tenant");
///
/// let context = ResilienceContext::new();
/// context.properties().set(&TENANT, "acme".to_string());
/// assert_eq!(context.properties().get(&TENANT).as_deref().map(String::as_str), Some("acme"));
/// ```
pub struct ResiliencePropertyKey<V> {
    key: &'static str,
    _value: PhantomData<fn() -> V>,
}

impl<V> ResiliencePropertyKey<V> {
    pub const fn new(key: &'static str) -> Self {
        Self {
            key,
            _value: PhantomData,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }
}

impl<V> Clone for ResiliencePropertyKey<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for ResiliencePropertyKey<V> {}

impl<V> fmt::Debug for ResiliencePropertyKey<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResiliencePropertyKey").field(&self.key).finish()
    }
}

/// A shared, heterogeneous property bag.
///
/// Clones share the same storage. Use [`ResilienceProperties::deep_copy`] to
/// obtain an independent bag.
#[derive(Clone, Default)]
pub struct ResilienceProperties {
    entries: Arc<RwLock<HashMap<&'static str, PropertyValue>>>,
}

impl ResilienceProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value, replacing any previous value under the same key.
    pub fn set<V>(&self, key: &ResiliencePropertyKey<V>, value: V)
    where
        V: Any + Send + Sync,
    {
        self.entries.write().insert(key.key, Arc::new(value));
    }

    /// Returns the value stored under `key`, if present and of type `V`.
    pub fn get<V>(&self, key: &ResiliencePropertyKey<V>) -> Option<Arc<V>>
    where
        V: Any + Send + Sync,
    {
        let value = self.entries.read().get(key.key).cloned()?;
        value.downcast::<V>().ok()
    }

    /// Removes the value under `key`, returning true if one was present.
    pub fn remove<V>(&self, key: &ResiliencePropertyKey<V>) -> bool {
        self.entries.write().remove(key.key).is_some()
    }

    pub fn contains<V>(&self, key: &ResiliencePropertyKey<V>) -> bool {
        self.entries.read().contains_key(key.key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Returns an independent bag holding the same entries.
    pub fn deep_copy(&self) -> Self {
        let entries = self.entries.read().clone();
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Adds or replaces every entry of `other` into this bag.
    pub fn merge_from(&self, other: &ResilienceProperties) {
        if Arc::ptr_eq(&self.entries, &other.entries) {
            return;
        }

        let source = other.entries.read().clone();
        self.entries.write().extend(source);
    }

    fn is_shared(&self) -> bool {
        Arc::strong_count(&self.entries) > 1
    }
}

impl fmt::Debug for ResilienceProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();
        f.debug_set().entries(entries.keys()).finish()
    }
}

/// Per-execution state handed to every strategy and to the user callback.
///
/// Cloning a context is cheap and the clone shares its property bag.
#[derive(Clone, Debug, Default)]
pub struct ResilienceContext {
    operation_key: Option<Arc<str>>,
    cancellation_token: CancellationToken,
    properties: ResilienceProperties,
    is_synchronous: bool,
}

impl ResilienceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the operation key used to label telemetry.
    pub fn with_operation_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.operation_key = Some(key.into());
        self
    }

    /// Sets the caller's cancellation token.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    pub fn operation_key(&self) -> Option<&str> {
        self.operation_key.as_deref()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    pub fn properties(&self) -> &ResilienceProperties {
        &self.properties
    }

    /// True when the execution was started from a blocking entry point.
    pub fn is_synchronous(&self) -> bool {
        self.is_synchronous
    }

    pub fn set_synchronous(&mut self, is_synchronous: bool) {
        self.is_synchronous = is_synchronous;
    }

    /// Creates a private copy of this context that observes `token`.
    ///
    /// The copy carries the same operation key and a deep copy of the
    /// properties, so writes to it never leak back to this context.
    pub fn snapshot_with_token(&self, token: CancellationToken) -> Self {
        Self {
            operation_key: self.operation_key.clone(),
            cancellation_token: token,
            properties: self.properties.deep_copy(),
            is_synchronous: self.is_synchronous,
        }
    }

    fn reset(&mut self) {
        self.operation_key = None;
        self.cancellation_token = CancellationToken::new();
        self.properties.clear();
        self.is_synchronous = false;
    }
}

/// A pool of [`ResilienceContext`] instances.
///
/// A context whose properties are still referenced elsewhere is not reused.
#[derive(Debug)]
pub struct ResilienceContextPool {
    pool: ObjectPool<ResilienceContext>,
}

impl ResilienceContextPool {
    pub fn new() -> Self {
        Self {
            pool: ObjectPool::new(ResilienceContext::new, |context: &mut ResilienceContext| {
                if context.properties.is_shared() {
                    return false;
                }
                context.reset();
                true
            }),
        }
    }

    /// Takes a clean context.
    pub fn get(&self) -> ResilienceContext {
        self.pool.get()
    }

    /// Takes a clean context bound to the given key and token.
    pub fn get_with(
        &self,
        operation_key: Option<&str>,
        cancellation_token: CancellationToken,
    ) -> ResilienceContext {
        let mut context = self.pool.get();
        context.operation_key = operation_key.map(Arc::from);
        context.cancellation_token = cancellation_token;
        context
    }

    /// Returns a context to the pool.
    pub fn put(&self, context: ResilienceContext) {
        self.pool.put(context);
    }

    pub fn idle(&self) -> usize {
        self.pool.len()
    }
}

impl Default for ResilienceContextPool {
    fn default() -> Self {
        Self::new()
    }
}
