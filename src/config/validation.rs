//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate allow-list entries (addresses and CIDR ranges)
//! - Validate value ranges (timeouts > 0, windows > 0)
//! - Detect duplicate credentials
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;
use crate::security::admission::AllowEntry;

/// Upper bound for the skew window and nonce TTL, in seconds (one day).
pub const MAX_WINDOW_SECS: u64 = 86_400;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },
    #[error("admission.allow_list: invalid entry '{0}'")]
    InvalidAllowEntry(String),
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },
    #[error("credentials: empty access key")]
    EmptyAccessKey,
    #[error("credentials: duplicate access key '{0}'")]
    DuplicateAccessKey(String),
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_socket_addr(&mut errors, "upstream.address", &config.upstream.address);
    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    for entry in &config.admission.allow_list {
        if entry.parse::<AllowEntry>().is_err() {
            errors.push(ValidationError::InvalidAllowEntry(entry.clone()));
        }
    }

    let positive = [
        ("auth.allowed_skew_secs", config.auth.allowed_skew_secs),
        ("auth.nonce_ttl_secs", config.auth.nonce_ttl_secs),
        ("auth.dependency_timeout_ms", config.auth.dependency_timeout_ms),
        ("upstream.timeout_secs", config.upstream.timeout_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("probe.interval_ms", config.probe.interval_ms),
        ("probe.timeout_ms", config.probe.timeout_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::ZeroValue(field));
        }
    }

    let windows = [
        ("auth.allowed_skew_secs", config.auth.allowed_skew_secs),
        ("auth.nonce_ttl_secs", config.auth.nonce_ttl_secs),
    ];
    for (field, value) in windows {
        if value > MAX_WINDOW_SECS {
            errors.push(ValidationError::TooLarge {
                field,
                max: MAX_WINDOW_SECS,
            });
        }
    }

    let mut seen = HashSet::new();
    for credential in &config.credentials {
        if credential.access_key.is_empty() {
            errors.push(ValidationError::EmptyAccessKey);
        } else if !seen.insert(credential.access_key.as_str()) {
            errors.push(ValidationError::DuplicateAccessKey(credential.access_key.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
