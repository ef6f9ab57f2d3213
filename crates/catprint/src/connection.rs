//! Connection manager: one exclusive BLE session per print job.
//!
//! A session runs `Idle -> LockAcquired -> Connected -> Streaming ->
//! Disconnected`. Transient connect failures back off and retry while the
//! lock stays held; everything else ends the session.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::ble::{BleAdapter, BleLink};
use crate::discovery::Device;
use crate::keepalive::{KeepAlive, KeepAliveTask};
use crate::options::TransferOptions;
use crate::print::PrintTransport;
use crate::{CatPrintError, Result};

/// Session lifecycle states, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    LockAcquired,
    Connected,
    Streaming,
    Disconnected,
    FailedTransient,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::LockAcquired => "lock_acquired",
            SessionState::Connected => "connected",
            SessionState::Streaming => "streaming",
            SessionState::Disconnected => "disconnected",
            SessionState::FailedTransient => "failed_transient",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Streams encoded jobs to printers, one connection at a time.
pub struct ConnectionManager {
    adapter: Arc<dyn BleAdapter>,
    lock: Arc<Mutex<()>>,
    options: TransferOptions,
}

impl ConnectionManager {
    /// Create a manager with its own connect lock.
    ///
    /// Create one manager per adapter for the life of the process, or share
    /// a lock between managers with [`ConnectionManager::with_lock`].
    pub fn new(adapter: Arc<dyn BleAdapter>, options: TransferOptions) -> Self {
        Self {
            adapter,
            lock: Arc::new(Mutex::new(())),
            options,
        }
    }

    /// Builder: serialize connects through an existing lock.
    pub fn with_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.lock = lock;
        self
    }

    /// The connect lock, for sharing with other managers.
    pub fn lock(&self) -> Arc<Mutex<()>> {
        self.lock.clone()
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Run one connect + stream + disconnect cycle.
    ///
    /// The link is always disconnected and the keep-alive task always joined
    /// before this returns, including on error and cancellation. If the
    /// future is dropped instead, teardown finishes in the background and
    /// the connect lock is held until it has.
    pub async fn transfer(
        &self,
        device: &Device,
        data: &[u8],
        keep_alive: Option<&KeepAlive>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        log_state(device, SessionState::Idle);
        let lock = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CatPrintError::Cancelled),
            guard = self.lock.clone().lock_owned() => guard,
        };
        log_state(device, SessionState::LockAcquired);

        let link = self.connect_with_retry(device, cancel).await.inspect_err(|e| {
            tracing::error!(address = %device.address, error = %e, "Connect failed");
            log_state(device, SessionState::Failed);
        })?;
        log_state(device, SessionState::Connected);

        let mut session = LinkGuard::new(link, lock, keep_alive.map(KeepAlive::spawn));

        log_state(device, SessionState::Streaming);
        let send_result = stream(&mut session, data, &self.options, cancel).await;

        let disconnect_result = session.close().await;
        log_state(device, SessionState::Disconnected);

        finalize(send_result, disconnect_result)
    }

    async fn connect_with_retry(
        &self,
        device: &Device,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn BleLink>> {
        let policy = self.options.retry;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            tracing::debug!(address = %device.address, attempt, "Connect attempt");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CatPrintError::Cancelled),
                result = self.adapter.connect(device) => result,
            };

            let err = match result {
                Ok(link) => return Ok(link),
                Err(e) => e,
            };

            if matches!(err, CatPrintError::DeviceNotFound(_)) {
                return Err(err);
            }
            if !self.options.classifier.is_transient(&err) {
                return Err(CatPrintError::ConnectionFailed {
                    attempts: attempt,
                    reason: err.to_string(),
                });
            }

            log_state(device, SessionState::FailedTransient);
            if attempt >= policy.attempts {
                return Err(CatPrintError::ConnectionFailed {
                    attempts: attempt,
                    reason: err.to_string(),
                });
            }

            let delay = policy.delay_after(attempt);
            tracing::warn!(
                attempt,
                max_attempts = policy.attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient connect failure, retrying"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CatPrintError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[async_trait]
impl PrintTransport for ConnectionManager {
    async fn send(
        &self,
        device: &Device,
        data: &[u8],
        keep_alive: Option<&KeepAlive>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.transfer(device, data, keep_alive, cancel).await
    }
}

fn log_state(device: &Device, state: SessionState) {
    tracing::debug!(address = %device.address, state = %state, "Session state");
}

/// Write `data` in paced chunks.
async fn stream(
    link: &mut LinkGuard,
    data: &[u8],
    options: &TransferOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let total = data.len();
    tracing::debug!(
        chunk_count = total.div_ceil(options.chunk_size),
        chunk_size = options.chunk_size,
        total_bytes = total,
        "Writing data in chunks"
    );

    let mut sent = 0usize;
    for chunk in data.chunks(options.chunk_size) {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CatPrintError::Cancelled),
            result = link.write(chunk) => result,
        };
        result.map_err(|e| CatPrintError::TransferInterrupted {
            sent,
            total,
            reason: e.to_string(),
        })?;
        sent += chunk.len();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CatPrintError::Cancelled),
            _ = tokio::time::sleep(options.chunk_delay) => {}
        }
    }

    tracing::info!(total_bytes = total, "Print job sent");
    Ok(())
}

/// Combine stream and disconnect outcomes.
///
/// A disconnect failure after a complete stream does not fail the job:
/// every byte already reached the printer.
fn finalize(send_result: Result<()>, disconnect_result: Result<()>) -> Result<()> {
    match (send_result, disconnect_result) {
        (Ok(()), Ok(())) => Ok(()),
        (Ok(()), Err(disconnect_err)) => {
            tracing::warn!(error = %disconnect_err, "Disconnect failed after complete transfer");
            Ok(())
        }
        (Err(send_err), Ok(())) => Err(send_err),
        (Err(send_err), Err(disconnect_err)) => {
            tracing::warn!(error = %disconnect_err, "Disconnect also failed");
            Err(send_err)
        }
    }
}

/// Owns a connected link for one session and guarantees one teardown.
///
/// The guard also holds the connect lock and the session's keep-alive task.
/// [`LinkGuard::close`] stops the keep-alive, disconnects, then releases the
/// lock. If the guard is dropped without closing (the transfer future was
/// dropped), the same teardown is spawned onto the current runtime, so the
/// lock stays held until the link is actually down.
struct LinkGuard {
    link: Option<Box<dyn BleLink>>,
    keep_alive: Option<KeepAliveTask>,
    lock: Option<OwnedMutexGuard<()>>,
}

impl LinkGuard {
    fn new(
        link: Box<dyn BleLink>,
        lock: OwnedMutexGuard<()>,
        keep_alive: Option<KeepAliveTask>,
    ) -> Self {
        Self {
            link: Some(link),
            keep_alive,
            lock: Some(lock),
        }
    }

    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        match self.link.as_mut() {
            Some(link) => link.write(chunk).await,
            None => Err(CatPrintError::BleWrite("link already closed".into())),
        }
    }

    async fn close(mut self) -> Result<()> {
        teardown(self.link.take(), self.keep_alive.take(), self.lock.take()).await
    }
}

async fn teardown(
    link: Option<Box<dyn BleLink>>,
    keep_alive: Option<KeepAliveTask>,
    lock: Option<OwnedMutexGuard<()>>,
) -> Result<()> {
    if let Some(task) = keep_alive {
        task.stop().await;
    }
    let result = match link {
        Some(mut link) => link.disconnect().await,
        None => Ok(()),
    };
    drop(lock);
    result
}

impl Drop for LinkGuard {
    fn drop(&mut self) {
        if self.link.is_none() {
            return;
        }
        let (link, keep_alive, lock) = (self.link.take(), self.keep_alive.take(), self.lock.take());
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!("Transfer abandoned mid-stream, disconnecting in background");
                handle.spawn(async move {
                    if let Err(e) = teardown(link, keep_alive, lock).await {
                        tracing::warn!(error = %e, "Background disconnect failed");
                    }
                });
            }
            Err(_) => tracing::error!("Transfer abandoned outside a runtime, link not disconnected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_success() {
        assert!(finalize(Ok(()), Ok(())).is_ok());
    }

    #[test]
    fn test_finalize_ignores_disconnect_error_after_success() {
        let result = finalize(Ok(()), Err(CatPrintError::BleConnection("gone".into())));
        assert!(result.is_ok());
    }

    #[test]
    fn test_finalize_prefers_send_error() {
        let result = finalize(
            Err(CatPrintError::Cancelled),
            Err(CatPrintError::BleConnection("gone".into())),
        );
        assert!(matches!(result, Err(CatPrintError::Cancelled)));
    }

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::FailedTransient.to_string(), "failed_transient");
    }
}
