//! Print orchestration: validate, encode, pick a device, transfer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::GrayImage;
use tokio_util::sync::CancellationToken;

use crate::ble::BleAdapter;
use crate::connection::ConnectionManager;
use crate::discovery::{DEFAULT_SCAN_TIMEOUT, Device, DeviceSelector, Discovery, FirstDevice};
use crate::keepalive::KeepAlive;
use crate::mock::MockTransport;
use crate::options::{PrinterOptions, TransferOptions};
use crate::protocol::{self, Command, DrawingMode, Lattice};
use crate::raster;
use crate::{CatPrintError, LINE_BYTES, Result};

/// Delivers an encoded job to a device.
#[async_trait]
pub trait PrintTransport: Send + Sync {
    async fn send(
        &self,
        device: &Device,
        data: &[u8],
        keep_alive: Option<&KeepAlive>,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Build the full command stream for one image.
///
/// Order: quality, print lattice, energy, drawing mode, speed, one bitmap
/// frame per row (top to bottom), finish lattice, paper feed.
pub fn encode_job(image: &GrayImage, options: &PrinterOptions) -> Result<Vec<u8>> {
    raster::validate(image)?;

    let rotated;
    let image = if options.rotate_180 {
        rotated = raster::rotate_180(image);
        &rotated
    } else {
        image
    };
    let lines = raster::packetize(image)?;

    let mut data = Vec::with_capacity((lines.len() + 8) * (LINE_BYTES + protocol::frame::FRAME_OVERHEAD));
    data.extend(protocol::encode(Command::SetQuality, &[options.quality]));
    data.extend(protocol::encode(Command::ControlLattice, Lattice::Print.bytes()));
    data.extend(protocol::encode(Command::SetEnergy, options.energy));
    data.extend(protocol::encode(Command::DrawingMode, &[DrawingMode::Image.byte()]));
    data.extend(protocol::encode(Command::OtherFeedPaper, &[options.speed.byte()]));
    for line in lines {
        data.extend(line);
    }
    data.extend(protocol::encode(Command::ControlLattice, Lattice::Finish.bytes()));
    data.extend(protocol::encode(Command::FeedPaper, options.feed_steps));
    Ok(data)
}

/// Public entry point for printing images.
pub struct Printer {
    transport: Arc<dyn PrintTransport>,
    discovery: Arc<Discovery>,
    selector: Arc<dyn DeviceSelector>,
    options: PrinterOptions,
    keep_alive: Option<KeepAlive>,
    scan_timeout: Duration,
}

impl Printer {
    pub fn new(transport: Arc<dyn PrintTransport>, discovery: Arc<Discovery>) -> Self {
        Self {
            transport,
            discovery,
            selector: Arc::new(FirstDevice),
            options: PrinterOptions::default(),
            keep_alive: None,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }

    /// Printer that discovers and prints through `adapter`.
    pub fn bluetooth(adapter: Arc<dyn BleAdapter>, transfer: TransferOptions) -> Self {
        let manager = ConnectionManager::new(adapter.clone(), transfer);
        Self::new(Arc::new(manager), Arc::new(Discovery::new(adapter)))
    }

    /// Printer with mock discovery and a simulated transport.
    pub fn mock() -> Self {
        Self::new(Arc::new(MockTransport::new()), Arc::new(Discovery::mock()))
    }

    /// Builder: choose how a device is picked when none is given.
    pub fn with_selector(mut self, selector: Arc<dyn DeviceSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Builder: set job options.
    pub fn with_options(mut self, options: PrinterOptions) -> Self {
        self.options = options;
        self
    }

    /// Builder: run a keep-alive callback while streaming.
    pub fn with_keep_alive(mut self, keep_alive: KeepAlive) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    /// Builder: scan window for device selection.
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn options(&self) -> &PrinterOptions {
        &self.options
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    /// Scan for printers using the configured timeout.
    pub async fn scan(&self) -> Vec<Device> {
        self.discovery.scan(self.scan_timeout).await
    }

    /// Print `image` on `device`, or on a selected printer if `None`.
    pub async fn print(&self, image: &GrayImage, device: Option<&Device>) -> Result<()> {
        self.print_with_cancel(image, device, &CancellationToken::new())
            .await
    }

    /// Like [`Printer::print`], stopping early when `cancel` fires.
    ///
    /// A job either sends its whole stream or fails; nothing is resumed.
    pub async fn print_with_cancel(
        &self,
        image: &GrayImage,
        device: Option<&Device>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let data = encode_job(image, &self.options)?;

        let device = match device {
            Some(d) => d.clone(),
            None => self.choose_device().await?,
        };

        tracing::info!(
            address = %device.address,
            name = %device.display_name(),
            rows = image.height(),
            bytes = data.len(),
            "Printing"
        );
        self.transport
            .send(&device, &data, self.keep_alive.as_ref(), cancel)
            .await
    }

    async fn choose_device(&self) -> Result<Device> {
        let printers = self.discovery.scan(self.scan_timeout).await;
        if printers.is_empty() {
            return Err(CatPrintError::DeviceNotFound(
                "no printers found during scan".into(),
            ));
        }
        self.selector.select(&printers).await
    }
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;
    use crate::PRINT_WIDTH;
    use crate::protocol::{PrintSpeed, decode_stream};

    #[test]
    fn test_encode_job_frame_order() {
        let image = GrayImage::from_pixel(PRINT_WIDTH, 3, Luma([255]));
        let data = encode_job(&image, &PrinterOptions::default()).unwrap();
        let frames = decode_stream(&data).unwrap();

        let commands: Vec<Command> = frames.iter().map(|f| f.command).collect();
        assert_eq!(
            commands,
            vec![
                Command::SetQuality,
                Command::ControlLattice,
                Command::SetEnergy,
                Command::DrawingMode,
                Command::OtherFeedPaper,
                Command::DrawBitmap,
                Command::DrawBitmap,
                Command::DrawBitmap,
                Command::ControlLattice,
                Command::FeedPaper,
            ]
        );
        assert_eq!(frames[0].payload, vec![0x33]);
        assert_eq!(frames[1].payload, Lattice::Print.bytes().to_vec());
        assert_eq!(frames[2].payload, 17500u16.to_le_bytes().to_vec());
        assert_eq!(frames[3].payload, vec![0x00]);
        assert_eq!(frames[4].payload, vec![PrintSpeed::Image.byte()]);
        assert_eq!(frames[8].payload, Lattice::Finish.bytes().to_vec());
        assert_eq!(frames[9].payload, vec![50, 0]);
    }

    #[test]
    fn test_encode_job_rows_top_to_bottom() {
        let mut image = GrayImage::from_pixel(PRINT_WIDTH, 2, Luma([255]));
        image.put_pixel(0, 1, Luma([0]));
        let frames = decode_stream(&encode_job(&image, &PrinterOptions::default()).unwrap()).unwrap();
        assert!(frames[5].payload.iter().all(|&b| b == 0));
        assert_eq!(frames[6].payload[0], 0x01);
    }

    #[test]
    fn test_encode_job_rotated() {
        let mut image = GrayImage::from_pixel(PRINT_WIDTH, 2, Luma([255]));
        image.put_pixel(0, 0, Luma([0]));
        let options = PrinterOptions::new().with_rotate_180(true);
        let frames = decode_stream(&encode_job(&image, &options).unwrap()).unwrap();
        assert!(frames[5].payload.iter().all(|&b| b == 0));
        assert_eq!(frames[6].payload[LINE_BYTES - 1], 0x80);
    }

    #[test]
    fn test_encode_job_rejects_wrong_width() {
        let image = GrayImage::from_pixel(400, 2, Luma([255]));
        assert!(matches!(
            encode_job(&image, &PrinterOptions::default()),
            Err(CatPrintError::InvalidImageKind { .. })
        ));
    }
}
