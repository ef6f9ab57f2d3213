use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::Luma;

use super::{StubAdapter, printer_device, white_image};
use crate::discovery::{Device, DeviceSelector};
use crate::options::{PrinterOptions, TransferOptions};
use crate::print::Printer;
use crate::protocol::{Command, decode_stream};
use crate::{CatPrintError, LINE_BYTES, Result};

/// Picks the last printer, to tell selection apart from scan order.
struct LastDevice;

#[async_trait]
impl DeviceSelector for LastDevice {
    async fn select(&self, devices: &[Device]) -> Result<Device> {
        devices
            .last()
            .cloned()
            .ok_or_else(|| CatPrintError::DeviceNotFound("empty".into()))
    }
}

fn two_printers() -> Vec<Device> {
    vec![
        Device::new("MX06", "AA:BB:CC:DD:EE:01"),
        Device::new("MX06", "AA:BB:CC:DD:EE:02"),
    ]
}

#[tokio::test(start_paused = true)]
async fn test_print_white_page_end_to_end() {
    let adapter = Arc::new(StubAdapter::new());
    let printer = Printer::bluetooth(adapter.clone(), TransferOptions::default());

    printer
        .print(&white_image(50), Some(&printer_device()))
        .await
        .unwrap();

    let frames = decode_stream(&adapter.written()).unwrap();
    let rows: Vec<_> = frames
        .iter()
        .filter(|f| f.command == Command::DrawBitmap)
        .collect();
    assert_eq!(rows.len(), 50);
    assert!(rows.iter().all(|f| f.payload == vec![0u8; LINE_BYTES]));
    assert_eq!(frames.last().map(|f| f.command), Some(Command::FeedPaper));
    assert_eq!(adapter.connect_calls(), 1);
    assert_eq!(adapter.disconnects().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_print_without_device_uses_selector() {
    let adapter = Arc::new(StubAdapter::new().with_devices(two_printers()));
    let printer = Printer::bluetooth(adapter.clone(), TransferOptions::default());
    printer.print(&white_image(1), None).await.unwrap();
    assert_eq!(adapter.connected_addresses(), vec!["AA:BB:CC:DD:EE:01"]);

    let adapter = Arc::new(StubAdapter::new().with_devices(two_printers()));
    let printer = Printer::bluetooth(adapter.clone(), TransferOptions::default())
        .with_selector(Arc::new(LastDevice));
    printer.print(&white_image(1), None).await.unwrap();
    assert_eq!(adapter.connected_addresses(), vec!["AA:BB:CC:DD:EE:02"]);
}

#[tokio::test(start_paused = true)]
async fn test_print_with_no_printers_nearby() {
    let adapter = Arc::new(StubAdapter::new());
    let printer = Printer::bluetooth(adapter.clone(), TransferOptions::default())
        .with_scan_timeout(Duration::from_secs(1));

    let err = printer.print(&white_image(1), None).await.unwrap_err();
    assert!(matches!(err, CatPrintError::DeviceNotFound(_)));
    assert_eq!(adapter.connect_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_image_never_connects() {
    let adapter = Arc::new(StubAdapter::new().with_devices(two_printers()));
    let printer = Printer::bluetooth(adapter.clone(), TransferOptions::default());

    let mut image = white_image(4);
    image.put_pixel(10, 2, Luma([128]));
    let err = printer.print(&image, None).await.unwrap_err();

    assert!(matches!(err, CatPrintError::InvalidImageKind { .. }));
    assert_eq!(adapter.connect_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_print_options_reach_the_wire() {
    let adapter = Arc::new(StubAdapter::new());
    let options = PrinterOptions::new()
        .with_quality(0x35)
        .with_energy(12000)
        .with_feed_steps(80);
    let printer =
        Printer::bluetooth(adapter.clone(), TransferOptions::default()).with_options(options);

    printer
        .print(&white_image(2), Some(&printer_device()))
        .await
        .unwrap();

    let frames = decode_stream(&adapter.written()).unwrap();
    assert_eq!(frames[0].payload, vec![0x35u8]);
    assert_eq!(frames[2].payload, 12000u16.to_le_bytes().to_vec());
    assert_eq!(frames.last().map(|f| f.payload.clone()), Some(vec![80u8, 0]));
}

#[tokio::test(start_paused = true)]
async fn test_mock_printer() {
    let printer = Printer::mock();
    assert!(printer.discovery().is_mock());
    printer.print(&white_image(8), None).await.unwrap();
}
