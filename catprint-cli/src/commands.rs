//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::Context;
use image::GrayImage;
use image::imageops::FilterType;
use tokio_util::sync::CancellationToken;

use catprint::protocol::{Command, decode_stream};
use catprint::{
    BleAdapter, BtleplugAdapter, ConnectionManager, Device, Discovery, KeepAlive, MockTransport,
    PRINT_WIDTH, Printer, encode_job, raster,
};

use crate::config::AppConfig;
use crate::config::defaults::{self, DEFAULT_SETTINGS};
use crate::selector::PromptSelector;

/// Build a printer from configuration, real or simulated.
pub fn build_printer(config: &AppConfig) -> Printer {
    let printer = if config.mock_mode {
        tracing::info!("Mock mode: no Bluetooth hardware will be used");
        let discovery = Discovery::mock().with_model_token(&config.model_token);
        Printer::new(Arc::new(MockTransport::new()), Arc::new(discovery))
    } else {
        let adapter: Arc<dyn BleAdapter> = Arc::new(BtleplugAdapter::new());
        let manager = ConnectionManager::new(adapter.clone(), config.transfer_options());
        let discovery = Discovery::new(adapter).with_model_token(&config.model_token);
        Printer::new(Arc::new(manager), Arc::new(discovery))
    };

    let printer = printer
        .with_options(config.printer_options())
        .with_selector(Arc::new(PromptSelector))
        .with_scan_timeout(config.scan_timeout());

    if config.keep_alive_enabled {
        printer.with_keep_alive(progress_keep_alive(config.keep_alive_interval()))
    } else {
        printer
    }
}

/// Streaming time as counted by keep-alive ticks.
///
/// Ticks only fire while a job streams, so the count excludes scanning and
/// connecting. The CLI prints one job per run.
#[derive(Debug)]
struct JobProgress {
    interval: Duration,
    ticks: AtomicU32,
}

impl JobProgress {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            ticks: AtomicU32::new(0),
        }
    }

    /// Record a tick and return the streaming time so far.
    fn tick(&self) -> Duration {
        let ticks = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        self.interval * ticks
    }
}

/// Keep-alive that reports how long the current job has been streaming.
fn progress_keep_alive(interval: Duration) -> KeepAlive {
    let progress = Arc::new(JobProgress::new(interval));
    KeepAlive::from_fn(interval, move || {
        let streamed = progress.tick();
        async move {
            tracing::info!(streamed_secs = streamed.as_secs(), "Still printing...");
            Ok(())
        }
    })
}

/// Open an image, fit it to the print head width and threshold it.
pub fn load_image(path: &Path, black_point: f32) -> anyhow::Result<GrayImage> {
    let img = image::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let img = if img.width() == PRINT_WIDTH {
        img
    } else {
        tracing::debug!(
            from_width = img.width(),
            to_width = PRINT_WIDTH,
            "Resizing image to print width"
        );
        img.resize(PRINT_WIDTH, u32::MAX, FilterType::Triangle)
    };
    Ok(raster::to_mono(&img, black_point))
}

pub async fn scan(config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let printer = build_printer(config);
    let devices = printer.scan().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }
    if devices.is_empty() {
        println!("No printers found.");
    }
    for d in &devices {
        println!("{}\t{}", d.address, d.display_name());
    }
    Ok(())
}

pub async fn print(config: &AppConfig, image_path: &Path) -> anyhow::Result<()> {
    let image = load_image(image_path, config.black_point)?;
    let printer = build_printer(config);

    let device = (!config.printer_address.is_empty()).then(|| Device {
        name: None,
        address: config.printer_address.clone(),
    });

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling print job");
            trigger.cancel();
        }
    });

    let result = printer
        .print_with_cancel(&image, device.as_ref(), &cancel)
        .await;
    ctrl_c.abort();

    result.context("print failed")?;
    tracing::info!(path = %image_path.display(), "Print completed");
    Ok(())
}

pub fn encode(
    config: &AppConfig,
    image_path: &Path,
    output: &Path,
    verify: bool,
) -> anyhow::Result<()> {
    let image = load_image(image_path, config.black_point)?;
    let data = encode_job(&image, &config.printer_options())?;
    std::fs::write(output, &data)
        .with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!(bytes = data.len(), rows = image.height(), output = %output.display(), "Job encoded");

    if verify {
        let frames = decode_stream(&data)?;
        let rows = frames
            .iter()
            .filter(|f| f.command == Command::DrawBitmap)
            .count();
        anyhow::ensure!(
            rows == image.height() as usize,
            "expected {} bitmap rows, decoded {rows}",
            image.height()
        );
        println!("{} frames, {rows} bitmap rows, all checksums valid", frames.len());
    }
    Ok(())
}

/// Print every setting key with its default and description.
pub fn settings() {
    for key in defaults::keys() {
        if let Some(def) = DEFAULT_SETTINGS.get(key) {
            println!("{:<20} {:<24} {}", def.key, format!("[{}]", def.default), def.description);
        }
    }
}
