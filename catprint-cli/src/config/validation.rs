//! Setting value validation.

use regex::Regex;
use std::sync::LazyLock;

static RE_MAC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9A-Fa-f]{2}[:\-]){5}([0-9A-Fa-f]{2})$").unwrap());
static RE_UUID_NO_HYPHEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Fa-f]{32}$").unwrap());
static RE_UUID_HYPHEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}$")
        .unwrap()
});

/// Validate a setting value. Returns `Ok(())` if valid, or an error message.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    match key {
        "PRINTER_ADDRESS" => {
            if !value.is_empty() && !is_device_address(value) {
                return Err("invalid address format (expected MAC or UUID)".into());
            }
        }
        "MODEL_TOKEN" => {
            if value.trim().is_empty() {
                return Err("must not be empty".into());
            }
        }
        "BLACK_POINT" => {
            let v: f64 = value.parse().map_err(|_| "must be a float")?;
            if !(0.0..=1.0).contains(&v) {
                return Err("must be between 0.0 and 1.0".into());
            }
        }
        "SCAN_TIMEOUT" => validate_int_range(value, 1, 120)?,
        "QUALITY" => validate_int_range(value, 0x31, 0x35)?,
        "ENERGY" => validate_int_range(value, 1, u16::MAX as i64)?,
        "FEED_STEPS" => validate_int_range(value, 0, u16::MAX as i64)?,
        "CHUNK_SIZE" => validate_int_range(value, 1, 512)?,
        "CHUNK_DELAY_MS" => validate_int_range(value, 0, 1000)?,
        "RETRY_ATTEMPTS" => validate_int_range(value, 1, 10)?,
        "RETRY_BACKOFF_MS" => validate_int_range(value, 0, 10_000)?,
        "KEEP_ALIVE_INTERVAL" => validate_int_range(value, 1, 3600)?,
        "TRANSIENT_PATTERNS" => {
            if split_list(value).next().is_none() {
                return Err("must list at least one pattern".into());
            }
        }
        // Boolean settings
        k if is_boolean_setting(k) => {
            if value != "true" && value != "false" {
                return Err("must be 'true' or 'false'".into());
            }
        }
        _ => {}
    }
    Ok(())
}

/// MAC address or platform UUID, with or without hyphens.
pub fn is_device_address(value: &str) -> bool {
    RE_MAC.is_match(value) || RE_UUID_NO_HYPHEN.is_match(value) || RE_UUID_HYPHEN.is_match(value)
}

/// Non-empty, trimmed items of a comma-separated list.
pub fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn validate_int_range(value: &str, min: i64, max: i64) -> Result<(), String> {
    let v: i64 = value.parse().map_err(|_| "must be an integer")?;
    if v < min || v > max {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(())
}

fn is_boolean_setting(key: &str) -> bool {
    matches!(key, "MOCK_MODE" | "ROTATE_PRINT" | "KEEP_ALIVE_ENABLED")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_boolean() {
        assert!(validate_setting("MOCK_MODE", "true").is_ok());
        assert!(validate_setting("MOCK_MODE", "false").is_ok());
        assert!(validate_setting("MOCK_MODE", "yes").is_err());
    }

    #[test]
    fn test_valid_printer_address() {
        assert!(validate_setting("PRINTER_ADDRESS", "AA:BB:CC:DD:EE:FF").is_ok());
        assert!(validate_setting("PRINTER_ADDRESS", "aa-bb-cc-dd-ee-ff").is_ok());
        assert!(validate_setting("PRINTER_ADDRESS", "aabbccddeeff00112233445566778899").is_ok());
        assert!(validate_setting("PRINTER_ADDRESS", "12345678-1234-1234-1234-123456789abc").is_ok());
        assert!(validate_setting("PRINTER_ADDRESS", "invalid").is_err());
        assert!(validate_setting("PRINTER_ADDRESS", "").is_ok()); // empty is ok
    }

    #[test]
    fn test_valid_black_point() {
        assert!(validate_setting("BLACK_POINT", "0.5").is_ok());
        assert!(validate_setting("BLACK_POINT", "1.0").is_ok());
        assert!(validate_setting("BLACK_POINT", "1.1").is_err());
        assert!(validate_setting("BLACK_POINT", "-0.1").is_err());
    }

    #[test]
    fn test_int_ranges() {
        assert!(validate_setting("QUALITY", "51").is_ok());
        assert!(validate_setting("QUALITY", "54").is_err());
        assert!(validate_setting("CHUNK_SIZE", "0").is_err());
        assert!(validate_setting("ENERGY", "65535").is_ok());
        assert!(validate_setting("ENERGY", "65536").is_err());
        assert!(validate_setting("RETRY_ATTEMPTS", "three").is_err());
    }

    #[test]
    fn test_transient_patterns() {
        assert!(validate_setting("TRANSIENT_PATTERNS", "busy, not ready").is_ok());
        assert!(validate_setting("TRANSIENT_PATTERNS", " , ,").is_err());
        assert_eq!(split_list(" busy ,, not ready").collect::<Vec<_>>(), vec!["busy", "not ready"]);
    }
}
