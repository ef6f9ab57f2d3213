//! Keep-alive side task run while a job is streaming.
//!
//! The task invokes a caller-supplied callback on a fixed interval. It is
//! scoped to one transfer: the connection manager stops and joins it before
//! tearing down the link.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::Result;

/// Default interval between keep-alive callbacks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(8);

/// Shortest interval accepted.
const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Callback invoked on every keep-alive tick.
pub type KeepAliveFn = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Keep-alive configuration: an interval and a callback.
#[derive(Clone)]
pub struct KeepAlive {
    interval: Duration,
    callback: KeepAliveFn,
}

impl fmt::Debug for KeepAlive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeepAlive")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl KeepAlive {
    /// Create a keep-alive. Intervals below 100ms are raised to 100ms.
    pub fn new(interval: Duration, callback: KeepAliveFn) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            callback,
        }
    }

    /// Create a keep-alive from an async closure.
    pub fn from_fn<F, Fut>(interval: Duration, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self::new(interval, Arc::new(move || f().boxed()))
    }

    /// Get the callback interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking. The first callback fires one full interval from now.
    pub fn spawn(&self) -> KeepAliveTask {
        let token = CancellationToken::new();
        let handle = tokio::spawn(run(self.interval, self.callback.clone(), token.clone()));
        KeepAliveTask {
            token,
            handle: Some(handle),
        }
    }
}

async fn run(interval: Duration, callback: KeepAliveFn, token: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        tracing::debug!("KeepAlive tick");
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = callback() => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "KeepAlive callback failed, continuing");
                }
            }
        }
    }
}

/// A running keep-alive task.
///
/// Call [`KeepAliveTask::stop`] to cancel and join it. Dropping the handle
/// cancels the task without waiting.
pub struct KeepAliveTask {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl KeepAliveTask {
    /// Cancel the task and wait until it has finished.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::warn!("KeepAlive task panicked: {e}");
                }
            }
        }
    }
}

impl Drop for KeepAliveTask {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
