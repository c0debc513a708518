//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, status-class names, log destinations and levels
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: SupervisorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::SupervisorConfig;
use crate::stats::LogBitmask;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("access_log.statuses: unknown status class {0:?}")]
    UnknownStatusClass(String),

    #[error("access_log.statuses: no status class selected")]
    NoStatusClasses,

    #[error("access_log.destination: must not be empty")]
    EmptyDestination,

    #[error("observability.log_level: unknown level {0:?}")]
    UnknownLogLevel(String),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &SupervisorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(
        "listener.bind_address",
        &config.listener.bind_address,
        &mut errors,
    );

    let access_log = &config.access_log;
    if access_log.enabled {
        for name in &access_log.statuses {
            if LogBitmask::bits_for_name(name).is_none() {
                errors.push(ValidationError::UnknownStatusClass(name.clone()));
            }
        }
        if access_log.statuses.is_empty() {
            errors.push(ValidationError::NoStatusClasses);
        }
        if access_log.destination.trim().is_empty() {
            errors.push(ValidationError::EmptyDestination);
        }
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            observability.log_level.clone(),
        ));
    }
    if observability.metrics_enabled {
        check_address(
            "observability.metrics_address",
            &observability.metrics_address,
            &mut errors,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
