//! BLE adapter seam and its btleplug implementation.
//!
//! The rest of the crate talks to [`BleAdapter`] / [`BleLink`] only, so
//! connection and discovery logic can run against stub adapters.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    BDAddr, Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::discovery::{Device, normalize_device_id};
use crate::protocol::WRITE_CHARACTERISTIC;
use crate::{CatPrintError, Result};

/// Scan window used when connecting to a peripheral the adapter has not cached.
const CONNECT_SCAN_TIMEOUT: Duration = Duration::from_secs(5);

/// Host BLE capability: enumerate nearby devices and open connections.
#[async_trait]
pub trait BleAdapter: Send + Sync {
    /// Scan for `timeout` and return every device seen, named or not.
    async fn discover(&self, timeout: Duration) -> Result<Vec<Device>>;

    /// Open a connection to `device` ready for characteristic writes.
    async fn connect(&self, device: &Device) -> Result<Box<dyn BleLink>>;
}

/// An open connection to a printer.
#[async_trait]
pub trait BleLink: Send {
    /// Write one chunk to the printer's command characteristic.
    async fn write(&mut self, chunk: &[u8]) -> Result<()>;

    /// Tear down the connection.
    async fn disconnect(&mut self) -> Result<()>;
}

/// [`BleAdapter`] backed by the first platform adapter btleplug finds.
pub struct BtleplugAdapter {
    adapter: OnceCell<Adapter>,
    write_uuid: Uuid,
}

impl Default for BtleplugAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl BtleplugAdapter {
    /// Create the adapter handle. The platform adapter is opened on first use.
    pub fn new() -> Self {
        Self {
            adapter: OnceCell::new(),
            write_uuid: WRITE_CHARACTERISTIC,
        }
    }

    /// Override the characteristic that receives command frames.
    pub fn with_write_characteristic(mut self, uuid: Uuid) -> Self {
        self.write_uuid = uuid;
        self
    }

    async fn adapter(&self) -> Result<&Adapter> {
        self.adapter
            .get_or_try_init(|| async {
                let manager = Manager::new()
                    .await
                    .map_err(|e| CatPrintError::BleConnection(e.to_string()))?;
                let adapters = manager
                    .adapters()
                    .await
                    .map_err(|e| CatPrintError::BleConnection(e.to_string()))?;
                let adapter = adapters
                    .into_iter()
                    .next()
                    .ok_or_else(|| CatPrintError::BleConnection("No BLE adapter found".into()))?;
                tracing::debug!("BLE adapter initialized");
                Ok(adapter)
            })
            .await
    }

    /// Scan for `timeout` and return the ids that advertised during the window.
    async fn scan_window(&self, adapter: &Adapter, timeout: Duration) -> Result<HashSet<PeripheralId>> {
        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| CatPrintError::BleScan(e.to_string()))?;

        let mut events = adapter
            .events()
            .await
            .map_err(|e| CatPrintError::BleScan(e.to_string()))?;

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut seen = HashSet::new();
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                event = events.next() => match event {
                    Some(CentralEvent::DeviceDiscovered(id)) => {
                        tracing::trace!(id = %id, "BLE device discovered");
                        seen.insert(id);
                    }
                    Some(CentralEvent::DeviceUpdated(id)) => {
                        seen.insert(id);
                    }
                    Some(_) => {}
                    None => break,
                },
            }
        }

        adapter
            .stop_scan()
            .await
            .map_err(|e| CatPrintError::BleScan(e.to_string()))?;
        Ok(seen)
    }

    async fn find_peripheral(&self, adapter: &Adapter, address: &str) -> Result<Option<Peripheral>> {
        let target = normalize_device_id(address);
        let peripherals = adapter
            .peripherals()
            .await
            .map_err(|e| CatPrintError::BleScan(e.to_string()))?;

        for peripheral in peripherals {
            let (device, _) = describe(&peripheral).await;
            if normalize_device_id(&device.address) == target
                || normalize_device_id(&peripheral.id().to_string()) == target
            {
                return Ok(Some(peripheral));
            }
        }
        Ok(None)
    }
}

/// Build a [`Device`] for a peripheral. The bool reports whether properties were readable.
async fn describe(peripheral: &Peripheral) -> (Device, bool) {
    match peripheral.properties().await {
        Ok(Some(props)) => {
            // macOS hides the MAC address; fall back to the platform id.
            let address = if props.address == BDAddr::default() {
                peripheral.id().to_string()
            } else {
                props.address.to_string()
            };
            (
                Device {
                    name: props.local_name,
                    address,
                },
                true,
            )
        }
        _ => (
            Device {
                name: None,
                address: peripheral.id().to_string(),
            },
            false,
        ),
    }
}

#[async_trait]
impl BleAdapter for BtleplugAdapter {
    async fn discover(&self, timeout: Duration) -> Result<Vec<Device>> {
        let adapter = self.adapter().await?;
        tracing::info!("Starting BLE scan ({}s timeout)", timeout.as_secs_f32());

        // The adapter cache also holds devices from earlier scans.
        let seen = self.scan_window(adapter, timeout).await?;

        let peripherals = adapter
            .peripherals()
            .await
            .map_err(|e| CatPrintError::BleScan(e.to_string()))?;

        let mut found = Vec::with_capacity(seen.len());
        for peripheral in peripherals.iter().filter(|p| seen.contains(&p.id())) {
            let (device, ok) = describe(peripheral).await;
            if ok {
                found.push(device);
            }
        }

        tracing::info!(count = found.len(), "BLE scan complete");
        Ok(found)
    }

    async fn connect(&self, device: &Device) -> Result<Box<dyn BleLink>> {
        let adapter = self.adapter().await?;

        let peripheral = match self.find_peripheral(adapter, &device.address).await? {
            Some(p) => p,
            None => {
                tracing::debug!(address = %device.address, "Peripheral not cached, scanning");
                self.scan_window(adapter, CONNECT_SCAN_TIMEOUT).await?;
                self.find_peripheral(adapter, &device.address)
                    .await?
                    .ok_or_else(|| CatPrintError::DeviceNotFound(device.address.clone()))?
            }
        };

        tracing::info!(address = %device.address, name = ?device.name, "Connecting to device");
        peripheral
            .connect()
            .await
            .map_err(|e| map_connect_error(e, &device.address))?;

        let characteristic = match resolve_characteristic(&peripheral, self.write_uuid).await {
            Ok(c) => c,
            Err(e) => {
                if let Err(disc) = peripheral.disconnect().await {
                    tracing::warn!(error = %disc, "Disconnect after failed setup also failed");
                }
                return Err(e);
            }
        };

        tracing::info!("Connected and discovered characteristic");
        Ok(Box::new(BtleplugLink {
            peripheral,
            characteristic,
        }))
    }
}

/// Classify a btleplug connect failure.
fn map_connect_error(err: btleplug::Error, address: &str) -> CatPrintError {
    match err {
        btleplug::Error::TimedOut(_) => CatPrintError::TransientConnection(err.to_string()),
        btleplug::Error::DeviceNotFound => CatPrintError::DeviceNotFound(address.to_string()),
        other => CatPrintError::BleConnection(other.to_string()),
    }
}

async fn resolve_characteristic(peripheral: &Peripheral, uuid: Uuid) -> Result<Characteristic> {
    peripheral
        .discover_services()
        .await
        .map_err(|e| CatPrintError::BleConnection(e.to_string()))?;

    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == uuid)
        .ok_or(CatPrintError::MissingCharacteristic)
}

/// A connected btleplug peripheral and its write characteristic.
struct BtleplugLink {
    peripheral: Peripheral,
    characteristic: Characteristic,
}

#[async_trait]
impl BleLink for BtleplugLink {
    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.peripheral
            .write(&self.characteristic, chunk, WriteType::WithoutResponse)
            .await
            .map_err(|e| CatPrintError::BleWrite(e.to_string()))
    }

    async fn disconnect(&mut self) -> Result<()> {
        tracing::info!("Disconnecting BLE device");
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| CatPrintError::BleConnection(e.to_string()))
    }
}
