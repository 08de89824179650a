//! Composition of strategies into a pipeline.

use crate::context::{ResilienceContext, ResilienceContextPool};
use crate::outcome::{BoxError, Outcome, OutcomeError};
use crate::strategy::{ResilienceCallback, ResilienceStrategy};
use std::future::Future;
use std::sync::Arc;

/// An ordered chain of strategies wrapped around a user operation.
///
/// The first strategy added is the outermost one.
///
/// ```rust
/// use strata_core::{Outcome, ResiliencePipeline};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pipeline = ResiliencePipeline::<u32>::empty();
/// let value = pipeline
///     .execute(|_context| async { Ok::<_, std::io::Error>(42) })
///     .await
///     .unwrap();
/// assert_eq!(value, 42);
/// # }
/// ```
pub struct ResiliencePipeline<T> {
    strategies: Vec<Arc<dyn ResilienceStrategy<T>>>,
    contexts: Arc<ResilienceContextPool>,
}

impl<T> Clone for ResiliencePipeline<T> {
    fn clone(&self) -> Self {
        Self {
            strategies: self.strategies.clone(),
            contexts: Arc::clone(&self.contexts),
        }
    }
}

impl<T: Send + 'static> ResiliencePipeline<T> {
    pub fn builder() -> ResiliencePipelineBuilder<T> {
        ResiliencePipelineBuilder::new()
    }

    /// A pipeline without strategies; it only adapts the callback.
    pub fn empty() -> Self {
        Self::builder().build()
    }

    /// Number of strategies in the pipeline.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Runs `callback` through every strategy using the given context.
    pub async fn execute_outcome(
        &self,
        callback: ResilienceCallback<T>,
        context: ResilienceContext,
    ) -> Outcome<T> {
        self.compose(callback).invoke(context).await
    }

    /// Runs a fallible async operation with a pooled context.
    pub async fn execute<F, Fut, E>(&self, operation: F) -> Result<T, OutcomeError>
    where
        F: Fn(ResilienceContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let context = self.contexts.get();
        let outcome = self
            .execute_outcome(adapt(operation), context.clone())
            .await;
        self.contexts.put(context);
        outcome.into_result()
    }

    /// Like [`execute`](Self::execute), passing a clone of `state` to each invocation.
    pub async fn execute_with_state<S, F, Fut, E>(
        &self,
        operation: F,
        state: S,
    ) -> Result<T, OutcomeError>
    where
        S: Clone + Send + Sync + 'static,
        F: Fn(ResilienceContext, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        self.execute(move |context| operation(context, state.clone()))
            .await
    }

    /// Runs the operation to completion from synchronous code.
    ///
    /// Inside a multi-threaded runtime the current worker is handed over with
    /// `block_in_place`; outside of any runtime a current-thread runtime is
    /// built for the call. Calling this from a current-thread runtime panics,
    /// as blocking would deadlock it.
    pub fn execute_blocking<F, Fut, E>(&self, operation: F) -> Result<T, OutcomeError>
    where
        F: Fn(ResilienceContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let mut context = self.contexts.get();
        context.set_synchronous(true);
        let execution = self.execute_outcome(adapt(operation), context.clone());

        let outcome = match tokio::runtime::Handle::try_current() {
            Ok(handle) => tokio::task::block_in_place(|| handle.block_on(execution)),
            Err(_) => match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime.block_on(execution),
                Err(error) => Outcome::from_error(error),
            },
        };

        self.contexts.put(context);
        outcome.into_result()
    }

    fn compose(&self, callback: ResilienceCallback<T>) -> ResilienceCallback<T> {
        self.strategies.iter().rev().fold(callback, |next, strategy| {
            let strategy = Arc::clone(strategy);
            ResilienceCallback::new(move |context| {
                let strategy = Arc::clone(&strategy);
                let next = next.clone();
                async move { strategy.execute_core(next, context).await }
            })
        })
    }
}

fn adapt<T, F, Fut, E>(operation: F) -> ResilienceCallback<T>
where
    T: Send + 'static,
    F: Fn(ResilienceContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    ResilienceCallback::new(move |context| {
        let execution = operation(context);
        async move { Outcome::from(execution.await) }
    })
}

/// Builder for [`ResiliencePipeline`].
pub struct ResiliencePipelineBuilder<T> {
    strategies: Vec<Arc<dyn ResilienceStrategy<T>>>,
    contexts: Option<Arc<ResilienceContextPool>>,
}

impl<T: Send + 'static> ResiliencePipelineBuilder<T> {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
            contexts: None,
        }
    }

    /// Appends a strategy; earlier strategies wrap later ones.
    pub fn add_strategy<S>(mut self, strategy: S) -> Self
    where
        S: ResilienceStrategy<T> + 'static,
    {
        self.strategies.push(Arc::new(strategy));
        self
    }

    /// Shares a context pool with other pipelines.
    pub fn context_pool(mut self, contexts: Arc<ResilienceContextPool>) -> Self {
        self.contexts = Some(contexts);
        self
    }

    pub fn build(self) -> ResiliencePipeline<T> {
        ResiliencePipeline {
            strategies: self.strategies,
            contexts: self.contexts.unwrap_or_default(),
        }
    }
}

impl<T: Send + 'static> Default for ResiliencePipelineBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
