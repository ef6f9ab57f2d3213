//! Hardware-free stand-in for the BLE transport.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::discovery::Device;
use crate::keepalive::KeepAlive;
use crate::print::PrintTransport;
use crate::{CatPrintError, Result};

/// Simulated print time.
pub const MOCK_PRINT_DELAY: Duration = Duration::from_millis(500);

/// A job accepted by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockJob {
    pub address: String,
    pub data: Vec<u8>,
}

/// Accepts every job after a fixed delay and remembers what it was sent.
#[derive(Debug)]
pub struct MockTransport {
    delay: Duration,
    jobs: Mutex<Vec<MockJob>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::with_delay(MOCK_PRINT_DELAY)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            jobs: Mutex::new(Vec::new()),
        }
    }

    /// Jobs accepted so far, oldest first.
    pub async fn jobs(&self) -> Vec<MockJob> {
        self.jobs.lock().await.clone()
    }
}

#[async_trait]
impl PrintTransport for MockTransport {
    async fn send(
        &self,
        device: &Device,
        data: &[u8],
        _keep_alive: Option<&KeepAlive>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CatPrintError::Cancelled),
            _ = tokio::time::sleep(self.delay) => {}
        }

        self.jobs.lock().await.push(MockJob {
            address: device.address.clone(),
            data: data.to_vec(),
        });
        tracing::info!(address = %device.address, bytes = data.len(), "[MOCK] Printed");
        Ok(())
    }
}
