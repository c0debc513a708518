//! HTTP request supervision.
//!
//! A [`Supervisor`] wraps a downstream handler and guarantees exactly one
//! outcome per request: the handler's buffered response, a 500 for a panic,
//! or a 503 when the deadline passes or the client goes away. Every outcome
//! is counted, offered to a completion callback and, when the status class
//! is enabled, written to the access log.

pub mod capture;
pub mod config;
pub mod format;
pub mod http;
pub mod observability;
pub mod stats;
pub mod supervisor;

pub use capture::{write_error, ResponseWriter};
pub use config::SupervisorConfig;
pub use http::Handler;
pub use stats::{Counters, LogBitmask, Statistics};
pub use supervisor::{CancelSignal, Cancellation, Resolution, Supervisor, SupervisorBuilder};
