use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

/// Install the tracing subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load `.env` and build the runtime configuration (fatal on error).
pub fn init_config() -> Result<AppConfig, anyhow::Error> {
    load_dotenv();
    let config = AppConfig::load()?;
    tracing::debug!(?config, "Settings loaded");
    Ok(config)
}

fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("CATPRINT_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join("catprint"))
}

/// Load .env from multiple candidate paths.
fn load_dotenv() {
    let mut candidates = vec![PathBuf::from(".env"), PathBuf::from("../.env")];
    if let Some(dir) = config_dir() {
        candidates.push(dir.join(".env"));
    }
    for path in &candidates {
        if dotenvy::from_path(path).is_ok() {
            tracing::info!("Loaded .env from: {}", path.display());
            return;
        }
    }
    tracing::debug!("No .env file found, using system environment variables");
}
