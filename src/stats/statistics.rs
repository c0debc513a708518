//! Per-request statistics handed to the completion callback.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Facts about one finished request.
#[derive(Debug, Clone)]
pub struct Statistics {
    /// When the supervisor admitted the request.
    pub request_begin: DateTime<Utc>,
    /// Request body bytes the handler consumed. `None` unless the escrow
    /// reader is enabled.
    pub request_body: Option<Bytes>,
    /// Terminal status, after flush normalization and flush failures.
    pub response_status: u16,
    /// When the outcome was resolved and flushed.
    pub response_end: DateTime<Utc>,
    elapsed: Duration,
    emit_log: bool,
}

impl Statistics {
    pub(crate) fn new(
        request_begin: DateTime<Utc>,
        request_body: Option<Bytes>,
        response_status: u16,
        response_end: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        Self {
            request_begin,
            request_body,
            response_status,
            response_end,
            elapsed,
            emit_log: false,
        }
    }

    /// Force the access-log line for this request even when the status
    /// class is masked out.
    pub fn log(&mut self) {
        self.emit_log = true;
    }

    pub(crate) fn log_forced(&self) -> bool {
        self.emit_log
    }

    /// Time from admission to resolution on the monotonic clock. Unlike
    /// `response_end - request_begin`, never negative.
    pub fn duration(&self) -> Duration {
        self.elapsed
    }
}

/// Completion callback type.
pub type Callback = Arc<dyn Fn(&mut Statistics) + Send + Sync>;
