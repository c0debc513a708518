//! Response capture subsystem.
//!
//! # Data Flow
//! ```text
//! handler
//!     → writer.rs (ResponseWriter: headers, status, body buffered in Capture)
//!     → [race resolved by supervisor]
//!     → Capture::flush or Capture::error_through
//!     → sink.rs (ResponseSink, written at most once)
//! ```
//!
//! # Design Decisions
//! - Status follows HTTP rules: first status wins, first write commits 200
//! - Flush and the direct error path share a one-shot flag, so the real sink
//!   can never be written twice for one request

pub mod sink;
pub mod writer;

pub use sink::{ResponseRecorder, ResponseSink};
pub use writer::{error_body, write_error, Capture, ResponseWriter};
