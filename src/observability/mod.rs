//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor and server produce:
//!     → logging.rs (structured diagnostic events via tracing)
//!     → metrics.rs (request counter and latency histogram)
//!
//! Consumers:
//!     → stdout/stderr (human or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap (atomic increments)
//! - The access log is separate; see `supervisor::access_log`

pub mod logging;
pub mod metrics;
