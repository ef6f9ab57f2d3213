//! Runtime application configuration loaded from the environment.

use std::time::Duration;

use anyhow::bail;
use catprint::{PrinterOptions, RetryPolicy, TransferOptions, TransientClassifier};

use super::defaults::{self, get_default};
use super::validation::{split_list, validate_setting};

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub printer_address: String,
    pub mock_mode: bool,
    pub model_token: String,
    pub scan_timeout: u64,
    pub black_point: f32,
    pub rotate_print: bool,
    pub quality: u8,
    pub energy: u16,
    pub feed_steps: u16,
    pub chunk_size: usize,
    pub chunk_delay_ms: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub transient_patterns: Vec<String>,
    pub keep_alive_enabled: bool,
    pub keep_alive_interval: u64,
}

impl AppConfig {
    /// Load configuration from environment variables (after `.env` loading).
    pub fn load() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from `lookup`, falling back to defaults.
    ///
    /// Every value is validated; all problems are reported together.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut errors = Vec::new();
        for key in defaults::keys() {
            if let Some(value) = lookup(key) {
                if let Err(e) = validate_setting(key, &value) {
                    errors.push(format!("{key}={value:?}: {e}"));
                }
            }
        }
        if !errors.is_empty() {
            bail!("invalid settings: {}", errors.join("; "));
        }

        let g = |key: &str| -> String {
            lookup(key)
                .or_else(|| get_default(key).map(str::to_string))
                .unwrap_or_default()
        };

        Ok(Self {
            printer_address: g("PRINTER_ADDRESS"),
            mock_mode: g("MOCK_MODE") == "true",
            model_token: g("MODEL_TOKEN").trim().to_string(),
            scan_timeout: parse(&g("SCAN_TIMEOUT"), 10),
            black_point: parse(&g("BLACK_POINT"), 0.5),
            rotate_print: g("ROTATE_PRINT") == "true",
            quality: parse(&g("QUALITY"), 0x33),
            energy: parse(&g("ENERGY"), 17500),
            feed_steps: parse(&g("FEED_STEPS"), 50),
            chunk_size: parse(&g("CHUNK_SIZE"), 64),
            chunk_delay_ms: parse(&g("CHUNK_DELAY_MS"), 25),
            retry_attempts: parse(&g("RETRY_ATTEMPTS"), 3),
            retry_backoff_ms: parse(&g("RETRY_BACKOFF_MS"), 500),
            transient_patterns: split_list(&g("TRANSIENT_PATTERNS"))
                .map(str::to_string)
                .collect(),
            keep_alive_enabled: g("KEEP_ALIVE_ENABLED") == "true",
            keep_alive_interval: parse(&g("KEEP_ALIVE_INTERVAL"), 8),
        })
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout)
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_interval)
    }

    /// Job options for the printer.
    pub fn printer_options(&self) -> PrinterOptions {
        PrinterOptions::new()
            .with_quality(self.quality)
            .with_energy(self.energy)
            .with_feed_steps(self.feed_steps)
            .with_rotate_180(self.rotate_print)
    }

    /// Chunking, retry and classification settings for the transport.
    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions::new()
            .with_chunk_size(self.chunk_size)
            .with_chunk_delay(Duration::from_millis(self.chunk_delay_ms))
            .with_retry(RetryPolicy::new(
                self.retry_attempts,
                Duration::from_millis(self.retry_backoff_ms),
            ))
            .with_classifier(TransientClassifier::new(&self.transient_patterns))
    }
}

fn parse<T: std::str::FromStr>(s: &str, default: T) -> T {
    if s.is_empty() {
        return default;
    }
    s.parse().unwrap_or(default)
}
