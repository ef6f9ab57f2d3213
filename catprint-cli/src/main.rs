//! `catprint`: scan for and print to MX06 BLE thermal printers.
//!
//! Settings come from the environment and `.env` files; command-line flags
//! override them.

mod bootstrap;
mod commands;
mod config;
mod selector;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use config::validation::is_device_address;

#[derive(Parser, Debug)]
#[command(name = "catprint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use simulated discovery and printing
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan for nearby printers
    Scan {
        /// Scan window in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print an image
    Print {
        /// Image file (PNG, BMP or JPEG)
        image: PathBuf,

        /// Printer address; scans and selects one if omitted
        #[arg(long)]
        address: Option<String>,

        /// Luma threshold below which pixels print black (0.0-1.0)
        #[arg(long)]
        black_point: Option<f32>,

        /// Rotate the image 180 degrees
        #[arg(long)]
        rotate: bool,

        /// Disable progress keep-alive messages
        #[arg(long)]
        no_keep_alive: bool,
    },

    /// Encode an image to the printer command stream without printing
    Encode {
        /// Image file (PNG, BMP or JPEG)
        image: PathBuf,

        /// Output file for the raw command stream
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Luma threshold below which pixels print black (0.0-1.0)
        #[arg(long)]
        black_point: Option<f32>,

        /// Decode the stream again and check every frame
        #[arg(long)]
        verify: bool,
    },

    /// List the supported settings with their defaults
    Settings,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    bootstrap::init_tracing(cli.verbose);

    let mut config = bootstrap::init_config()?;
    config.mock_mode |= cli.mock;

    match cli.command {
        Commands::Scan { timeout, json } => {
            if let Some(t) = timeout {
                config.scan_timeout = t.max(1);
            }
            commands::scan(&config, json).await
        }
        Commands::Print {
            image,
            address,
            black_point,
            rotate,
            no_keep_alive,
        } => {
            if let Some(address) = address {
                anyhow::ensure!(
                    is_device_address(&address),
                    "invalid address format (expected MAC or UUID): {address}"
                );
                config.printer_address = address;
            }
            if let Some(bp) = black_point {
                config.black_point = bp.clamp(0.0, 1.0);
            }
            config.rotate_print |= rotate;
            config.keep_alive_enabled &= !no_keep_alive;
            commands::print(&config, &image).await
        }
        Commands::Encode {
            image,
            output,
            black_point,
            verify,
        } => {
            if let Some(bp) = black_point {
                config.black_point = bp.clamp(0.0, 1.0);
            }
            commands::encode(&config, &image, &output, verify)
        }
        Commands::Settings => {
            commands::settings();
            Ok(())
        }
    }
}
