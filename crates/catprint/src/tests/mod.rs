use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{GrayImage, Luma};
use tokio::time::Instant;

use crate::ble::{BleAdapter, BleLink};
use crate::discovery::Device;
use crate::{CatPrintError, PRINT_WIDTH, Result};

mod printer;

const BUSY: &str = "[org.bluez.Error.Failed] Operation already in progress";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Connected {
        link: usize,
        address: String,
        at: Instant,
    },
    Write { link: usize, len: usize },
    Disconnected { link: usize, at: Instant },
}

/// Scriptable in-memory BLE adapter.
#[derive(Default)]
struct StubAdapter {
    devices: Vec<Device>,
    fail_discover: bool,
    discover_delay: Duration,
    connect_failures: Mutex<VecDeque<String>>,
    always_fail: Option<String>,
    missing: bool,
    fail_write_at: Option<usize>,
    disconnect_delay: Duration,
    connect_calls: AtomicUsize,
    active_scans: AtomicUsize,
    max_active_scans: AtomicUsize,
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    events: Mutex<Vec<Event>>,
    written: Mutex<Vec<u8>>,
    links: AtomicUsize,
}

impl StubAdapter {
    fn new() -> Self {
        Self::default()
    }

    fn with_devices(mut self, devices: Vec<Device>) -> Self {
        self.devices = devices;
        self
    }

    fn failing_discover(mut self) -> Self {
        self.fail_discover = true;
        self
    }

    fn with_discover_delay(mut self, delay: Duration) -> Self {
        self.discover_delay = delay;
        self
    }

    /// Fail the next `n` connects with `msg`, then succeed.
    fn failing_connects(self, n: usize, msg: &str) -> Self {
        self.connect_failures
            .lock()
            .unwrap()
            .extend(std::iter::repeat_n(msg.to_string(), n));
        self
    }

    fn always_failing(mut self, msg: &str) -> Self {
        self.always_fail = Some(msg.to_string());
        self
    }

    /// Report every device as gone when connecting.
    fn missing_on_connect(mut self) -> Self {
        self.missing = true;
        self
    }

    /// Make each disconnect take `delay` before it completes.
    fn with_disconnect_delay(mut self, delay: Duration) -> Self {
        self.disconnect_delay = delay;
        self
    }

    /// Fail the write call with this zero-based index.
    fn failing_write_at(mut self, index: usize) -> Self {
        self.fail_write_at = Some(index);
        self
    }

    fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    fn events(&self) -> Vec<Event> {
        self.shared.events.lock().unwrap().clone()
    }

    fn written(&self) -> Vec<u8> {
        self.shared.written.lock().unwrap().clone()
    }

    fn write_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Write { .. }))
            .count()
    }

    /// Addresses of successful connects, in order.
    fn connected_addresses(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Connected { address, .. } => Some(address),
                _ => None,
            })
            .collect()
    }

    fn disconnects(&self) -> Vec<Instant> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                Event::Disconnected { at, .. } => Some(*at),
                _ => None,
            })
            .collect()
    }

    /// Connected intervals per link, ordered by connect time.
    fn intervals(&self) -> Vec<(Instant, Instant)> {
        let events = self.events();
        let mut out: Vec<(Instant, Instant)> = events
            .iter()
            .filter_map(|e| match e {
                Event::Connected { link, at, .. } => {
                    let end = events.iter().find_map(|d| match d {
                        Event::Disconnected { link: l, at } if l == link => Some(*at),
                        _ => None,
                    })?;
                    Some((*at, end))
                }
                _ => None,
            })
            .collect();
        out.sort();
        out
    }
}

#[async_trait]
impl BleAdapter for StubAdapter {
    async fn discover(&self, _timeout: Duration) -> Result<Vec<Device>> {
        let active = self.active_scans.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_scans.fetch_max(active, Ordering::SeqCst);
        tokio::time::sleep(self.discover_delay).await;
        self.active_scans.fetch_sub(1, Ordering::SeqCst);

        if self.fail_discover {
            return Err(CatPrintError::BleScan("adapter powered off".into()));
        }
        Ok(self.devices.clone())
    }

    async fn connect(&self, device: &Device) -> Result<Box<dyn BleLink>> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.missing {
            return Err(CatPrintError::DeviceNotFound(device.address.clone()));
        }
        if let Some(msg) = &self.always_fail {
            return Err(CatPrintError::BleConnection(msg.clone()));
        }
        if let Some(msg) = self.connect_failures.lock().unwrap().pop_front() {
            return Err(CatPrintError::BleConnection(msg));
        }

        let link = self.shared.links.fetch_add(1, Ordering::SeqCst);
        self.shared.events.lock().unwrap().push(Event::Connected {
            link,
            address: device.address.clone(),
            at: Instant::now(),
        });
        Ok(Box::new(StubLink {
            id: link,
            writes: 0,
            fail_write_at: self.fail_write_at,
            disconnect_delay: self.disconnect_delay,
            shared: self.shared.clone(),
        }))
    }
}

struct StubLink {
    id: usize,
    writes: usize,
    fail_write_at: Option<usize>,
    disconnect_delay: Duration,
    shared: Arc<Shared>,
}

#[async_trait]
impl BleLink for StubLink {
    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        let index = self.writes;
        self.writes += 1;
        if self.fail_write_at == Some(index) {
            return Err(CatPrintError::BleWrite("link lost".into()));
        }
        self.shared.written.lock().unwrap().extend_from_slice(chunk);
        self.shared.events.lock().unwrap().push(Event::Write {
            link: self.id,
            len: chunk.len(),
        });
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        tokio::time::sleep(self.disconnect_delay).await;
        self.shared.events.lock().unwrap().push(Event::Disconnected {
            link: self.id,
            at: Instant::now(),
        });
        Ok(())
    }
}

fn printer_device() -> Device {
    Device::new("MX06", "AA:BB:CC:DD:EE:01")
}

fn white_image(height: u32) -> GrayImage {
    GrayImage::from_pixel(PRINT_WIDTH, height, Luma([255]))
}
