//! Interactive printer selection on the terminal.

use std::io::{self, BufRead, IsTerminal, Write};

use async_trait::async_trait;
use catprint::{CatPrintError, Device, DeviceSelector};

/// Asks on stdin which printer to use when more than one is found.
///
/// Falls back to the first printer when stdin is not a terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptSelector;

#[async_trait]
impl DeviceSelector for PromptSelector {
    async fn select(&self, devices: &[Device]) -> catprint::Result<Device> {
        if devices.len() == 1 || !io::stdin().is_terminal() {
            return devices
                .first()
                .cloned()
                .ok_or_else(|| CatPrintError::DeviceNotFound("no printers found".into()));
        }

        let owned = devices.to_vec();
        blocking_select(move || prompt(&owned, io::stdin().lock(), io::stderr())).await
    }
}

/// Run a blocking selection off the async runtime. A panicked or aborted
/// selection counts as cancelled.
async fn blocking_select<F>(f: F) -> catprint::Result<Device>
where
    F: FnOnce() -> catprint::Result<Device> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::warn!(error = %e, "Printer selection did not finish");
        CatPrintError::Cancelled
    })?
}

/// Print a numbered menu to `out` and read a choice from `input`.
fn prompt<R: BufRead, W: Write>(
    devices: &[Device],
    mut input: R,
    mut out: W,
) -> catprint::Result<Device> {
    let io_err = |e: io::Error| CatPrintError::DeviceNotFound(format!("selection aborted: {e}"));

    for (i, d) in devices.iter().enumerate() {
        writeln!(out, "  [{}] {} ({})", i + 1, d.display_name(), d.address).map_err(io_err)?;
    }

    let mut line = String::new();
    loop {
        write!(out, "Select printer [1-{}]: ", devices.len()).map_err(io_err)?;
        out.flush().map_err(io_err)?;

        line.clear();
        if input.read_line(&mut line).map_err(io_err)? == 0 {
            return Err(CatPrintError::Cancelled);
        }
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=devices.len()).contains(&n) => return Ok(devices[n - 1].clone()),
            _ => writeln!(out, "Invalid choice: {}", line.trim()).map_err(io_err)?,
        }
    }
}
