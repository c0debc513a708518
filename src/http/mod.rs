//! HTTP-facing pieces the supervisor is built on.
//!
//! # Data Flow
//! ```text
//! Request<Body> from axum
//!     → request.rs (snapshot for the access log, frozen at admission)
//!     → escrow.rs (optional: tee body frames for the completion callback)
//!     → handler.rs (downstream handler writes through a ResponseWriter)
//! ```
//!
//! server.rs mounts a supervisor behind axum and runs it until shutdown.

pub mod escrow;
pub mod handler;
pub mod request;
pub mod server;

pub use escrow::{Escrow, EscrowBody};
pub use handler::Handler;
pub use request::RequestSnapshot;
pub use server::SupervisedServer;
