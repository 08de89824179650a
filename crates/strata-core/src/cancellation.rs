//! Cancellation helpers.

use crate::pool::ObjectPool;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// A pool of cancellation tokens.
///
/// Cancellation is one-way, so a token that was canceled is never returned
/// to the pool.
#[derive(Debug)]
pub struct CancellationTokenPool {
    pool: ObjectPool<CancellationToken>,
}

impl CancellationTokenPool {
    pub fn new() -> Self {
        Self {
            pool: ObjectPool::new(CancellationToken::new, |token: &mut CancellationToken| {
                !token.is_cancelled()
            }),
        }
    }

    /// Takes a fresh, uncanceled token.
    pub fn get(&self) -> CancellationToken {
        self.pool.get()
    }

    /// Returns a token; canceled tokens are discarded.
    pub fn put(&self, token: CancellationToken) {
        self.pool.put(token);
    }

    /// Number of idle tokens in the pool.
    pub fn idle(&self) -> usize {
        self.pool.len()
    }
}

impl Default for CancellationTokenPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives `future` to completion, cancelling `target` as soon as `source` is
/// canceled.
///
/// The future is still awaited after the cancellation is forwarded, so the
/// caller always observes its real output.
pub async fn propagate_cancellation<F>(
    future: F,
    source: &CancellationToken,
    target: &CancellationToken,
) -> F::Output
where
    F: Future,
{
    tokio::pin!(future);

    tokio::select! {
        output = &mut future => output,
        _ = source.cancelled() => {
            target.cancel();
            future.await
        }
    }
}
