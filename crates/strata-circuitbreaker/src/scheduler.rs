//! Ordered, off-lock execution of user callbacks.

use crate::error::{CallbackPanicked, ScheduledTaskError};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use pin_project_lite::pin_project;
use std::future::Future;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread;
use strata_core::{panic_message, BoxError, ObjectDisposedError, OutcomeError};
use tokio::sync::{mpsc, oneshot};

type TaskFactory = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;
type Completion = oneshot::Sender<Result<(), ScheduledTaskError>>;

struct QueuedTask {
    factory: TaskFactory,
    completion: Completion,
}

#[derive(Default)]
struct ExecutorInner {
    queue: Option<mpsc::UnboundedSender<QueuedTask>>,
    worker: Option<thread::JoinHandle<()>>,
    disposed: bool,
}

/// Runs scheduled tasks one at a time, in the order they were scheduled.
///
/// Tasks run on a dedicated worker thread, started on first use, that hosts
/// its own current-thread runtime. Scheduling never blocks, so it is safe to
/// schedule while holding a lock; awaiting the returned [`ScheduledTask`]
/// must happen after the lock is released.
pub struct ScheduledTaskExecutor {
    thread_name: String,
    inner: Mutex<ExecutorInner>,
    disposed: Arc<AtomicBool>,
}

impl ScheduledTaskExecutor {
    pub fn new() -> Self {
        Self::with_thread_name("strata-scheduled-tasks")
    }

    pub fn with_thread_name(thread_name: impl Into<String>) -> Self {
        Self {
            thread_name: thread_name.into(),
            inner: Mutex::new(ExecutorInner::default()),
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Queues a task behind every previously scheduled task.
    ///
    /// The returned handle completes when the task finishes. A task that
    /// returns an error or panics completes its handle as faulted; the
    /// following tasks still run.
    pub fn schedule<F, Fut>(&self, task: F) -> Result<ScheduledTask, ScheduledTaskError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let (completion, receiver) = oneshot::channel();
        let queued = QueuedTask {
            factory: Box::new(move || task().boxed()),
            completion,
        };

        let mut inner = self.inner.lock();
        if inner.disposed {
            return Err(ObjectDisposedError::new("ScheduledTaskExecutor").into());
        }

        if inner.queue.is_none() {
            let (sender, receiver) = mpsc::unbounded_channel();
            let worker = self
                .spawn_worker(receiver)
                .map_err(|error| ScheduledTaskError::Faulted(OutcomeError::new(error)))?;
            inner.queue = Some(sender);
            inner.worker = Some(worker);
        }

        if let Some(queue) = &inner.queue {
            // A send only fails once the worker is gone; the dropped task then
            // reports as canceled through its handle.
            let _ = queue.send(queued);
        }

        Ok(ScheduledTask { receiver })
    }

    /// Stops the executor.
    ///
    /// A task that is already running finishes; tasks that have not started
    /// complete as [`ScheduledTaskError::Canceled`]. Later calls to
    /// [`schedule`](Self::schedule) fail with [`ScheduledTaskError::Disposed`].
    pub fn dispose(&self) {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return;
        }
        inner.disposed = true;
        self.disposed.store(true, Ordering::Release);
        // Closing the queue lets the worker drain and exit; it is not joined.
        inner.queue = None;
        let _detached = inner.worker.take();
    }

    /// True once the worker thread has been started.
    pub fn is_started(&self) -> bool {
        self.inner.lock().worker.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn spawn_worker(
        &self,
        mut queue: mpsc::UnboundedReceiver<QueuedTask>,
    ) -> io::Result<thread::JoinHandle<()>> {
        let disposed = Arc::clone(&self.disposed);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || {
                runtime.block_on(async move {
                    while let Some(task) = queue.recv().await {
                        if disposed.load(Ordering::Acquire) {
                            // Dropping the completion cancels the handle.
                            continue;
                        }
                        let result = run_task(task.factory).await;
                        let _ = task.completion.send(result);
                    }
                });
            })
    }
}

impl Default for ScheduledTaskExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ScheduledTaskExecutor {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ScheduledTaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTaskExecutor")
            .field("thread_name", &self.thread_name)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

async fn run_task(factory: TaskFactory) -> Result<(), ScheduledTaskError> {
    let future = panic::catch_unwind(AssertUnwindSafe(factory)).map_err(panicked)?;

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(ScheduledTaskError::Faulted(OutcomeError::from_boxed(error))),
        Err(payload) => Err(panicked(payload)),
    }
}

fn panicked(payload: Box<dyn std::any::Any + Send>) -> ScheduledTaskError {
    ScheduledTaskError::Faulted(OutcomeError::new(CallbackPanicked {
        message: panic_message(&*payload),
    }))
}

pin_project! {
    /// Completion handle of a task queued on a [`ScheduledTaskExecutor`].
    ///
    /// Dropping the handle does not cancel the task.
    pub struct ScheduledTask {
        #[pin]
        receiver: oneshot::Receiver<Result<(), ScheduledTaskError>>,
    }
}

impl Future for ScheduledTask {
    type Output = Result<(), ScheduledTaskError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match this.receiver.poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ScheduledTaskError::Canceled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
