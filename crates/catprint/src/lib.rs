//! Driver for MX06-family BLE thermal printers.
//!
//! Encodes 1-bit raster images into the printer's framed command stream,
//! discovers printers over BLE, and streams jobs through a serialized,
//! retrying connection manager.

pub mod ble;
pub mod connection;
pub mod discovery;
pub mod keepalive;
pub mod mock;
pub mod options;
pub mod print;
pub mod protocol;
pub mod raster;
pub mod retry;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use ble::{BleAdapter, BleLink, BtleplugAdapter};
pub use connection::ConnectionManager;
pub use discovery::{Device, DeviceSelector, Discovery, FirstDevice};
pub use keepalive::{KeepAlive, KeepAliveFn};
pub use mock::MockTransport;
pub use options::{PrinterOptions, TransferOptions};
pub use print::{PrintTransport, Printer, encode_job};
pub use protocol::{Command, Payload};
pub use retry::{RetryPolicy, TransientClassifier};

/// Print head width in pixels.
pub const PRINT_WIDTH: u32 = 384;

/// Bytes per packed raster line.
pub const LINE_BYTES: usize = (PRINT_WIDTH / 8) as usize;

/// Errors that can occur during printer operations.
#[derive(Debug, thiserror::Error)]
pub enum CatPrintError {
    #[error("Invalid image: {reason}")]
    InvalidImageKind { reason: String },

    #[error("Printer not found: {0}")]
    DeviceNotFound(String),

    #[error("Transient BLE connection error: {0}")]
    TransientConnection(String),

    #[error("Connection failed after {attempts} attempt(s): {reason}")]
    ConnectionFailed { attempts: u32, reason: String },

    #[error("Transfer interrupted after {sent}/{total} bytes: {reason}")]
    TransferInterrupted {
        sent: usize,
        total: usize,
        reason: String,
    },

    #[error("Print job cancelled")]
    Cancelled,

    #[error("Missing write characteristic on connected device")]
    MissingCharacteristic,

    #[error("BLE connection error: {0}")]
    BleConnection(String),

    #[error("BLE write error: {0}")]
    BleWrite(String),

    #[error("BLE scan error: {0}")]
    BleScan(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl CatPrintError {
    pub(crate) fn invalid_image(reason: impl Into<String>) -> Self {
        Self::InvalidImageKind {
            reason: reason.into(),
        }
    }
}

/// Result type alias for catprint operations.
pub type Result<T> = std::result::Result<T, CatPrintError>;
