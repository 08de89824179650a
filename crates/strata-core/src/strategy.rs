//! The strategy seam.

use crate::context::ResilienceContext;
use crate::outcome::Outcome;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type CallbackFn<T> = dyn Fn(ResilienceContext) -> BoxFuture<'static, Outcome<T>> + Send + Sync;

/// The user operation, as seen by strategies.
///
/// A callback may be invoked more than once (hedging starts several
/// attempts), each time with the context of that attempt.
pub struct ResilienceCallback<T> {
    f: Arc<CallbackFn<T>>,
}

impl<T> Clone for ResilienceCallback<T> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<T> fmt::Debug for ResilienceCallback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResilienceCallback")
    }
}

impl<T: Send + 'static> ResilienceCallback<T> {
    /// Wraps an async closure producing an [`Outcome`].
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ResilienceContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |context| f(context).boxed()),
        }
    }

    /// Wraps an async closure that receives a clone of `state` on every call.
    pub fn with_state<S, F, Fut>(f: F, state: S) -> Self
    where
        S: Clone + Send + Sync + 'static,
        F: Fn(ResilienceContext, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        Self::new(move |context| f(context, state.clone()))
    }

    /// Starts one invocation of the operation.
    pub fn invoke(&self, context: ResilienceContext) -> BoxFuture<'static, Outcome<T>> {
        (self.f)(context)
    }
}

/// A resilience strategy.
///
/// `execute_core` receives the next callback in the chain and decides when,
/// whether and how often to invoke it.
pub trait ResilienceStrategy<T>: Send + Sync {
    fn execute_core<'a>(
        &'a self,
        callback: ResilienceCallback<T>,
        context: ResilienceContext,
    ) -> BoxFuture<'a, Outcome<T>>;
}

impl<T, S> ResilienceStrategy<T> for Arc<S>
where
    S: ResilienceStrategy<T> + ?Sized,
{
    fn execute_core<'a>(
        &'a self,
        callback: ResilienceCallback<T>,
        context: ResilienceContext,
    ) -> BoxFuture<'a, Outcome<T>> {
        (**self).execute_core(callback, context)
    }
}
