//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, permission bits)
//! - Detect a listening socket that would shadow the upstream socket
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `timeouts.dial_secs`.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listen = &config.listener.socket_path;
    let upstream = &config.upstream.socket_path;

    if !listen.is_absolute() {
        errors.push(ValidationError::new(
            "listener.socket_path",
            format!("must be an absolute path, got {}", listen.display()),
        ));
    }
    if !upstream.is_absolute() {
        errors.push(ValidationError::new(
            "upstream.socket_path",
            format!("must be an absolute path, got {}", upstream.display()),
        ));
    }
    if listen == upstream {
        errors.push(ValidationError::new(
            "listener.socket_path",
            "must differ from upstream.socket_path",
        ));
    }
    if config.listener.socket_mode > 0o777 {
        errors.push(ValidationError::new(
            "listener.socket_mode",
            format!("{:o} is not a valid permission mode", config.listener.socket_mode),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }
    if config.upstream.host.is_empty() {
        errors.push(ValidationError::new("upstream.host", "must not be empty"));
    }

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.dial_secs", timeouts.dial_secs),
        ("timeouts.read_secs", timeouts.read_secs),
        ("timeouts.write_secs", timeouts.write_secs),
        ("timeouts.idle_secs", timeouts.idle_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "observability.metrics_address",
                format!("{addr} is not a socket address"),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
