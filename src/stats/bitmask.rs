//! Live bitmask selecting which status classes get an access-log line.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Log requests which have a 1xx response.
pub const LOG_STATUS_1XX: u32 = 1;
/// Log requests which have a 2xx response.
pub const LOG_STATUS_2XX: u32 = 2;
/// Log requests which have a 3xx response.
pub const LOG_STATUS_3XX: u32 = 4;
/// Log requests which have a 4xx response.
pub const LOG_STATUS_4XX: u32 = 8;
/// Log requests which have a 5xx response.
pub const LOG_STATUS_5XX: u32 = 16;
/// Log every request.
pub const LOG_STATUS_ALL: u32 = LOG_STATUS_1XX | LOG_STATUS_2XX | LOG_STATUS_3XX | LOG_STATUS_4XX | LOG_STATUS_5XX;
/// Log requests which have a 4xx or 5xx response.
pub const LOG_STATUS_ERRORS: u32 = LOG_STATUS_4XX | LOG_STATUS_5XX;

/// Shared handle to the bitmask. Clones observe the same value, so an
/// operator can change what gets logged while the server runs.
#[derive(Debug, Clone)]
pub struct LogBitmask(Arc<AtomicU32>);

impl LogBitmask {
    pub fn new(bits: u32) -> Self {
        Self(Arc::new(AtomicU32::new(bits)))
    }

    pub fn load(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn store(&self, bits: u32) {
        self.0.store(bits, Ordering::Relaxed);
    }

    /// True when responses with this status ought to be logged.
    pub fn allows(&self, status: u16) -> bool {
        let class = (status / 100).clamp(1, 5) as u32;
        self.load() & (1 << (class - 1)) != 0
    }

    /// Parse a class name as used in config files (`"4xx"`, `"errors"`, ...).
    pub fn bits_for_name(name: &str) -> Option<u32> {
        match name.to_ascii_lowercase().as_str() {
            "1xx" => Some(LOG_STATUS_1XX),
            "2xx" => Some(LOG_STATUS_2XX),
            "3xx" => Some(LOG_STATUS_3XX),
            "4xx" => Some(LOG_STATUS_4XX),
            "5xx" => Some(LOG_STATUS_5XX),
            "all" => Some(LOG_STATUS_ALL),
            "errors" => Some(LOG_STATUS_ERRORS),
            _ => None,
        }
    }
}

impl Default for LogBitmask {
    fn default() -> Self {
        Self::new(LOG_STATUS_ALL)
    }
}
