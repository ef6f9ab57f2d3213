//! Print job and transfer configuration.

use std::time::Duration;

use crate::protocol::PrintSpeed;
use crate::retry::{RetryPolicy, TransientClassifier};

/// Settings that shape the command stream of a print job.
#[derive(Debug, Clone)]
pub struct PrinterOptions {
    /// `SET_QUALITY` value (0x31..=0x35).
    pub quality: u8,

    /// `SET_ENERGY` value. Higher is darker and slower.
    pub energy: u16,

    /// Speed byte sent before the bitmap lines.
    pub speed: PrintSpeed,

    /// Paper steps fed after the image.
    pub feed_steps: u16,

    /// Rotate the image 180 degrees before printing (for upside-down printers).
    pub rotate_180: bool,
}

impl Default for PrinterOptions {
    fn default() -> Self {
        Self {
            quality: 0x33,
            energy: 17500,
            speed: PrintSpeed::Image,
            feed_steps: 50,
            rotate_180: false,
        }
    }
}

impl PrinterOptions {
    /// Create options with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set print quality.
    ///
    /// # Panics
    /// Panics if value is not in 0x31..=0x35 range.
    pub fn with_quality(mut self, val: u8) -> Self {
        assert!(
            (0x31..=0x35).contains(&val),
            "Quality must be between 0x31 and 0x35, got {val:#04x}"
        );
        self.quality = val;
        self
    }

    /// Builder: set heat energy.
    ///
    /// # Panics
    /// Panics if value is zero.
    pub fn with_energy(mut self, val: u16) -> Self {
        assert!(val > 0, "Energy must be at least 1");
        self.energy = val;
        self
    }

    /// Builder: set the speed byte.
    pub fn with_speed(mut self, val: PrintSpeed) -> Self {
        self.speed = val;
        self
    }

    /// Builder: set trailing paper feed.
    pub fn with_feed_steps(mut self, val: u16) -> Self {
        self.feed_steps = val;
        self
    }

    /// Builder: set rotate flag.
    pub fn with_rotate_180(mut self, val: bool) -> Self {
        self.rotate_180 = val;
        self
    }
}

/// Settings for streaming bytes to the printer.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Bytes per characteristic write.
    pub chunk_size: usize,

    /// Pause between consecutive writes so the device buffer can drain.
    pub chunk_delay: Duration,

    /// Connect retry budget and backoff.
    pub retry: RetryPolicy,

    /// Decides which connect errors are worth retrying.
    pub classifier: TransientClassifier,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            chunk_size: 64,
            chunk_delay: Duration::from_millis(25),
            retry: RetryPolicy::default(),
            classifier: TransientClassifier::default(),
        }
    }
}

impl TransferOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set chunk size.
    ///
    /// # Panics
    /// Panics if value is zero.
    pub fn with_chunk_size(mut self, val: usize) -> Self {
        assert!(val > 0, "Chunk size must be at least 1 byte");
        self.chunk_size = val;
        self
    }

    /// Builder: set delay between chunks.
    pub fn with_chunk_delay(mut self, val: Duration) -> Self {
        self.chunk_delay = val;
        self
    }

    /// Builder: set retry policy.
    pub fn with_retry(mut self, val: RetryPolicy) -> Self {
        self.retry = val;
        self
    }

    /// Builder: set transient error classifier.
    pub fn with_classifier(mut self, val: TransientClassifier) -> Self {
        self.classifier = val;
        self
    }
}
