//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SupervisorConfig (validated, immutable)
//!     → SupervisorBuilder::with_config, observability init
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the access-log bitmask is the one
//!   setting that can change at runtime, through `LogBitmask`
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{AccessLogConfig, ListenerConfig, ObservabilityConfig, SupervisionConfig, SupervisorConfig};
pub use validation::{validate_config, ValidationError};
