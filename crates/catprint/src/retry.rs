//! Connect retry policy and transient error classification.

use std::time::Duration;

use crate::CatPrintError;

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(500);

/// Error substrings that mark a connect failure as worth retrying.
///
/// BlueZ reports overlapping connection setups as
/// `org.bluez.Error.InProgress` / "Operation already in progress".
const DEFAULT_TRANSIENT_PATTERNS: &[&str] = &[
    "operation already in progress",
    "inprogress",
    "in progress",
    "busy",
    "not ready",
];

/// How many connect attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total connect attempts, including the first.
    pub attempts: u32,
    /// Backoff unit; the wait after attempt `n` is `n * backoff_step`.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            backoff_step: DEFAULT_BACKOFF_STEP,
        }
    }
}

impl RetryPolicy {
    /// Build a policy. At least one attempt is always made.
    pub fn new(attempts: u32, backoff_step: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff_step,
        }
    }

    /// Delay before retrying after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Classifies BLE connect errors as transient (retry) or fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientClassifier {
    patterns: Vec<String>,
}

impl Default for TransientClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSIENT_PATTERNS.iter().copied())
    }
}

impl TransientClassifier {
    /// Build a classifier from case-insensitive substrings.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_ascii_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether `err` is an adapter-busy class of failure.
    ///
    /// Only raw connection errors qualify; a missing device or
    /// characteristic never goes away by retrying.
    pub fn is_transient(&self, err: &CatPrintError) -> bool {
        match err {
            CatPrintError::TransientConnection(_) => true,
            CatPrintError::BleConnection(msg) => {
                let msg = msg.to_ascii_lowercase();
                self.patterns.iter().any(|p| msg.contains(p.as_str()))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
    }

    #[test]
    fn test_policy_makes_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
    }

    #[test]
    fn test_default_classifier_known_errors() {
        let classifier = TransientClassifier::default();
        let cases = vec![
            ("[org.bluez.Error.Failed] Operation already in progress", true),
            ("org.bluez.Error.InProgress", true),
            ("Device or resource busy", true),
            ("le-connection-abort-by-local", false),
            ("Authentication Failed", false),
        ];

        for (msg, expected) in cases {
            let err = CatPrintError::BleConnection(msg.to_string());
            assert_eq!(
                classifier.is_transient(&err),
                expected,
                "'{}' should{} be transient",
                msg,
                if expected { "" } else { " not" }
            );
        }
    }

    #[test]
    fn test_non_connection_errors_are_fatal() {
        let classifier = TransientClassifier::new(["not found"]);
        assert!(!classifier.is_transient(&CatPrintError::DeviceNotFound("not found".into())));
        assert!(!classifier.is_transient(&CatPrintError::MissingCharacteristic));
    }

    #[test]
    fn test_custom_patterns_are_normalized() {
        let classifier = TransientClassifier::new(["  Timed Out ", ""]);
        assert_eq!(classifier.patterns(), &["timed out".to_string()]);
        assert!(classifier.is_transient(&CatPrintError::BleConnection("connect TIMED OUT".into())));
    }
}
