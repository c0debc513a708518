//! Access-log formatting.
//!
//! # Data Flow
//! ```text
//! template string (config)
//!     → compiler.rs (single scan, once at setup)
//!     → CompiledFormat (emitters + referenced header names)
//!     → emitters.rs (per request: capture + request snapshot → bytes)
//! ```
//!
//! # Supported Tokens
//! - `begin`, `begin-epoch`, `begin-iso8601`: time request was admitted
//! - `end`, `end-epoch`, `end-iso8601`: time the outcome was resolved
//! - `duration`: seconds between begin and end, microsecond precision
//! - `bytes`: response body bytes written to the client
//! - `status`, `status-text`: response status code and reason phrase
//! - `client`, `client-ip`, `client-port`: remote address
//! - `method`, `uri`, `proto`: request line
//! - `error`: error message associated with serving the request
//! - `http-<Name>`: first value of a request header, `-` when absent

pub mod compiler;
pub mod emitters;

pub use compiler::CompiledFormat;
pub use emitters::{Emitter, Field};

/// Default access-log line format.
pub const DEFAULT_LOG_FORMAT: &str =
    "{client-ip} [{begin-iso8601}] \"{method} {uri} {proto}\" {status} {bytes} {duration} {error}";

/// Apache Common Log Format. Size excludes headers, as Apache does.
pub const APACHE_COMMON_LOG_FORMAT: &str =
    "{client-ip} - - [{begin}] \"{method} {uri} {proto}\" {status} {bytes}";
