//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//! - Detect listeners that would collide
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::config::schema::ServiceConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("http.bind_address and secure.bind_address both use {0}")]
    ConflictingAddresses(SocketAddr),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: usize },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Check a parsed configuration, collecting every problem.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let http = parse_address("http.bind_address", &config.http.bind_address, &mut errors);
    let secure = parse_address("secure.bind_address", &config.secure.bind_address, &mut errors);

    if let (Some(http), Some(secure)) = (http, secure) {
        // Port 0 asks the OS for a free port, so two of them never collide.
        if http == secure && http.port() != 0 {
            errors.push(ValidationError::ConflictingAddresses(http));
        }
    }

    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero("http.request_timeout_secs"));
    }
    if config.secure.max_connections == 0 {
        errors.push(ValidationError::Zero("secure.max_connections"));
    } else if config.secure.max_connections > Semaphore::MAX_PERMITS {
        errors.push(ValidationError::TooLarge {
            field: "secure.max_connections",
            max: Semaphore::MAX_PERMITS,
        });
    }
    if config.secure.read_timeout_secs == 0 {
        errors.push(ValidationError::Zero("secure.read_timeout_secs"));
    }
    if config.secure.max_line_bytes == 0 {
        errors.push(ValidationError::Zero("secure.max_line_bytes"));
    }
    if config.secure.cert_path.trim().is_empty() {
        errors.push(ValidationError::Empty("secure.cert_path"));
    }
    if config.secure.key_path.trim().is_empty() {
        errors.push(ValidationError::Empty("secure.key_path"));
    }
    if config.observability.log_level.trim().is_empty() {
        errors.push(ValidationError::Empty("observability.log_level"));
    }
    if config.observability.metrics_enabled {
        parse_address(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn parse_address(
    field: &'static str,
    value: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<SocketAddr> {
    match value.parse() {
        Ok(addr) => Some(addr),
        Err(_) => {
            errors.push(ValidationError::InvalidAddress {
                field,
                value: value.to_string(),
            });
            None
        }
    }
}
