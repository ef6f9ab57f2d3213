//! All setting definitions with their default values.

use std::collections::HashMap;
use std::sync::LazyLock;

type DefTuple = (&'static str, &'static str, &'static str);

const DEFS: &[DefTuple] = &[
    // Printer selection
    ("PRINTER_ADDRESS", "", "MAC address (or UUID on macOS) of the printer to use"),
    ("MOCK_MODE", "false", "Use simulated discovery and printing"),
    ("MODEL_TOKEN", "MX06", "Advertised name token that identifies a printer"),
    ("SCAN_TIMEOUT", "10", "BLE scan window in seconds"),
    // Image
    ("BLACK_POINT", "0.5", "Luma threshold below which pixels print black (0.0-1.0)"),
    ("ROTATE_PRINT", "false", "Rotate images 180 degrees before printing"),
    // Job
    ("QUALITY", "51", "Print quality byte (49-53)"),
    ("ENERGY", "17500", "Heating energy"),
    ("FEED_STEPS", "50", "Paper feed after the image, in steps"),
    // Transport
    ("CHUNK_SIZE", "64", "Bytes per BLE write"),
    ("CHUNK_DELAY_MS", "25", "Pause after each BLE write in milliseconds"),
    ("RETRY_ATTEMPTS", "3", "Connect attempts for transient failures"),
    ("RETRY_BACKOFF_MS", "500", "Backoff step between connect attempts in milliseconds"),
    (
        "TRANSIENT_PATTERNS",
        "operation already in progress,inprogress,in progress,busy,not ready",
        "Comma-separated error substrings that trigger a connect retry",
    ),
    // Keep-alive
    ("KEEP_ALIVE_ENABLED", "true", "Report progress while a job streams"),
    ("KEEP_ALIVE_INTERVAL", "8", "Seconds between keep-alive callbacks"),
];

/// A single setting definition.
#[derive(Debug, Clone)]
pub struct SettingDef {
    pub key: &'static str,
    pub default: &'static str,
    pub description: &'static str,
}

/// Global setting definitions indexed by key.
pub static DEFAULT_SETTINGS: LazyLock<HashMap<&'static str, SettingDef>> = LazyLock::new(|| {
    DEFS.iter()
        .map(|&(key, default, description)| {
            (
                key,
                SettingDef {
                    key,
                    default,
                    description,
                },
            )
        })
        .collect()
});

/// Setting keys in declaration order.
pub fn keys() -> impl Iterator<Item = &'static str> {
    DEFS.iter().map(|&(key, _, _)| key)
}

/// Get the default value for a setting key, or `None` if not defined.
pub fn get_default(key: &str) -> Option<&'static str> {
    DEFAULT_SETTINGS.get(key).map(|d| d.default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validation::validate_setting;

    #[test]
    fn test_defaults_are_valid() {
        for def in DEFAULT_SETTINGS.values() {
            assert!(
                validate_setting(def.key, def.default).is_ok(),
                "default for {} is invalid",
                def.key
            );
        }
    }

    #[test]
    fn test_keys_are_unique() {
        assert_eq!(keys().count(), DEFAULT_SETTINGS.len());
        assert_eq!(get_default("CHUNK_SIZE"), Some("64"));
        assert_eq!(get_default("UNKNOWN"), None);
    }
}
