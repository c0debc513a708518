//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Record one sample per supervised request
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `supervisor_requests_total` (counter): requests by status class, outcome
//! - `supervisor_request_duration_seconds` (histogram): admission to flush
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until a
//!   recorder is installed, so library users and tests pay nothing
//! - Labels are static strings; status classes rather than codes keep
//!   cardinality bounded

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

use crate::stats::Bucket;
use crate::supervisor::Resolution;

/// Record a resolved request.
pub fn record_request(class: Bucket, outcome: Resolution, duration: Duration) {
    ::metrics::counter!(
        "supervisor_requests_total",
        "class" => class.label(),
        "outcome" => outcome.label()
    )
    .increment(1);
    ::metrics::histogram!(
        "supervisor_request_duration_seconds",
        "class" => class.label()
    )
    .record(duration.as_secs_f64());
}

/// Install the Prometheus recorder with its own HTTP listener on `addr`.
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}
