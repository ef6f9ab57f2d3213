//! Printer discovery over BLE.
//!
//! Scans are serialized through a per-[`Discovery`] lock; callers that
//! arrive during a scan wait and then run their own scan.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::ble::BleAdapter;
use crate::{CatPrintError, Result};

/// Advertised name token of supported printers.
pub const DEFAULT_MODEL_TOKEN: &str = "MX06";

/// Default scan window.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// A BLE device as seen during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    /// Advertised local name, if any.
    pub name: Option<String>,
    /// Transport identifier (MAC address on Linux/Windows, UUID on macOS).
    pub address: String,
}

impl Device {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: address.into(),
        }
    }

    /// Case-insensitive substring match of the advertised name.
    pub fn matches_model(&self, token: &str) -> bool {
        let token = token.to_ascii_lowercase();
        self.name
            .as_deref()
            .is_some_and(|name| name.to_ascii_lowercase().contains(&token))
    }

    /// Display name, or `"<unnamed>"`.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

/// Devices returned by mock discovery.
pub fn mock_devices() -> Vec<Device> {
    vec![
        Device::new(DEFAULT_MODEL_TOKEN, "AA:BB:CC:DD:EE:01"),
        Device::new(DEFAULT_MODEL_TOKEN, "AA:BB:CC:DD:EE:02"),
    ]
}

enum Source {
    Adapter(Arc<dyn BleAdapter>),
    Mock,
}

/// Finds nearby printers.
pub struct Discovery {
    source: Source,
    model_token: String,
    scan_lock: Mutex<()>,
}

impl Discovery {
    /// Discovery through a real (or stub) BLE adapter.
    pub fn new(adapter: Arc<dyn BleAdapter>) -> Self {
        Self {
            source: Source::Adapter(adapter),
            model_token: DEFAULT_MODEL_TOKEN.to_string(),
            scan_lock: Mutex::new(()),
        }
    }

    /// Discovery that returns [`mock_devices`] without touching hardware.
    pub fn mock() -> Self {
        Self {
            source: Source::Mock,
            model_token: DEFAULT_MODEL_TOKEN.to_string(),
            scan_lock: Mutex::new(()),
        }
    }

    /// Builder: match a different advertised name token.
    pub fn with_model_token(mut self, token: impl Into<String>) -> Self {
        self.model_token = token.into();
        self
    }

    pub fn is_mock(&self) -> bool {
        matches!(self.source, Source::Mock)
    }

    /// Scan for printers.
    ///
    /// Adapter failures are logged and yield an empty list.
    pub async fn scan(&self, timeout: Duration) -> Vec<Device> {
        let _guard = self.scan_lock.lock().await;

        let devices = match &self.source {
            Source::Mock => mock_devices(),
            Source::Adapter(adapter) => match adapter.discover(timeout).await {
                Ok(devices) => devices,
                Err(e) => {
                    tracing::warn!(error = %e, "BLE scan failed, reporting no printers");
                    return Vec::new();
                }
            },
        };

        let printers: Vec<Device> = devices
            .into_iter()
            .filter(|d| d.matches_model(&self.model_token))
            .collect();
        tracing::info!(count = printers.len(), token = %self.model_token, "Printers found");
        printers
    }

    /// Scan and return the printer with `address`.
    pub async fn resolve(&self, address: &str, timeout: Duration) -> Result<Device> {
        let printers = self.scan(timeout).await;
        find_by_address(&printers, address)
            .cloned()
            .ok_or_else(|| CatPrintError::DeviceNotFound(address.to_string()))
    }
}

/// Find a device by address, ignoring case and separators.
pub fn find_by_address<'a>(devices: &'a [Device], address: &str) -> Option<&'a Device> {
    let target = normalize_device_id(address);
    devices
        .iter()
        .find(|d| d.address.eq_ignore_ascii_case(address) || normalize_device_id(&d.address) == target)
}

/// Lower-case alphanumerics only: `AA:BB:..` and `aabb..` compare equal.
pub fn normalize_device_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Picks a printer when a job arrives without one.
#[async_trait]
pub trait DeviceSelector: Send + Sync {
    /// Choose one of `devices` (never empty).
    async fn select(&self, devices: &[Device]) -> Result<Device>;
}

/// Selects the first printer found.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstDevice;

#[async_trait]
impl DeviceSelector for FirstDevice {
    async fn select(&self, devices: &[Device]) -> Result<Device> {
        devices
            .first()
            .cloned()
            .ok_or_else(|| CatPrintError::DeviceNotFound("no printers found".into()))
    }
}
