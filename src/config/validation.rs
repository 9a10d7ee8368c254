//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, attempts >= 1)
//! - Validate addresses and URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HostplaneConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::HostplaneConfig;
use crate::engine::version::EngineVersion;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

pub fn validate_config(config: &HostplaneConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let engine = &config.engine;
    if engine.binary.trim().is_empty() {
        errors.push(ValidationError::new("engine.binary", "must not be empty"));
    }
    if engine.adapter.trim().is_empty() {
        errors.push(ValidationError::new("engine.adapter", "must not be empty"));
    }
    match url::Url::parse(&engine.admin_url) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
        Ok(u) => errors.push(ValidationError::new(
            "engine.admin_url",
            format!("unsupported scheme '{}'", u.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("engine.admin_url", e.to_string())),
    }
    if EngineVersion::parse(&engine.min_version).is_none() {
        errors.push(ValidationError::new("engine.min_version", "expected MAJOR.MINOR.PATCH"));
    }
    for (field, value) in [
        ("engine.request_timeout_secs", engine.request_timeout_secs),
        ("engine.connect_timeout_secs", engine.connect_timeout_secs),
        ("engine.adapt_timeout_secs", engine.adapt_timeout_secs),
        ("api.request_timeout_secs", config.api.request_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    let reconcile = &config.reconcile;
    if reconcile.rollback_attempts == 0 {
        errors.push(ValidationError::new("reconcile.rollback_attempts", "must be at least 1"));
    }
    if reconcile.apply_retry_base_ms > reconcile.apply_retry_max_ms {
        errors.push(ValidationError::new(
            "reconcile.apply_retry_base_ms",
            "must not exceed apply_retry_max_ms",
        ));
    }

    if config.build.server_name.trim().is_empty() {
        errors.push(ValidationError::new("build.server_name", "must not be empty"));
    }
    if config.build.listen.is_empty() {
        errors.push(ValidationError::new("build.listen", "at least one address is required"));
    }

    if config.api.enabled {
        if config.api.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new("api.bind_address", "not a socket address"));
        }
        if config.api.api_key.len() < 16 {
            errors.push(ValidationError::new("api.api_key", "must be at least 16 characters"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new("observability.metrics_address", "not a socket address"));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
