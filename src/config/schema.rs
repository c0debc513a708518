//! Configuration schema definitions.
//!
//! Every section has defaults, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::format::DEFAULT_LOG_FORMAT;
use crate::stats::LogBitmask;

/// Root configuration for the supervised server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// How handlers are supervised.
    #[serde(rename = "supervisor")]
    pub supervision: SupervisionConfig,

    /// Access-log line format, filter and destination.
    pub access_log: AccessLogConfig,

    /// Diagnostics logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Supervision behavior.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SupervisionConfig {
    /// Re-raise handler panics instead of answering 500.
    pub allow_panics: bool,

    /// Handler deadline in milliseconds. 0 disables the deadline.
    pub timeout_ms: u64,

    /// Copy consumed request bodies for the completion callback.
    pub escrow_reader: bool,
}

/// Access-log settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessLogConfig {
    pub enabled: bool,

    /// Line template. Empty means the default format.
    pub format: String,

    /// Status classes to log: "1xx" .. "5xx", "errors", "all".
    pub statuses: Vec<String>,

    /// "stderr", "stdout", or a file path opened for append.
    pub destination: String,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: DEFAULT_LOG_FORMAT.to_string(),
            statuses: vec!["all".to_string()],
            destination: "stderr".to_string(),
        }
    }
}

impl AccessLogConfig {
    /// Bitmask for the configured status classes. Unknown names are
    /// skipped here; validation reports them.
    pub fn bitmask(&self) -> u32 {
        self.statuses
            .iter()
            .filter_map(|name| LogBitmask::bits_for_name(name))
            .fold(0, |bits, class| bits | class)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit diagnostics as JSON lines.
    pub json: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
