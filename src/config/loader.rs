//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::HostplaneConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Environment variables that override file settings.
const ENV_ADMIN_URL: &str = "HOSTPLANE_ADMIN_URL";
const ENV_ENGINE_BINARY: &str = "HOSTPLANE_ENGINE_BINARY";
const ENV_API_KEY: &str = "HOSTPLANE_API_KEY";
const ENV_STATE_PATH: &str = "HOSTPLANE_STATE_PATH";

/// Load and validate configuration from a TOML file.
///
/// A missing path yields the defaults; environment overrides apply either way.
pub fn load_config(path: Option<&Path>) -> Result<HostplaneConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => HostplaneConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

pub fn parse_config(content: &str) -> Result<HostplaneConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply overrides read through `lookup` (the process environment in production).
pub fn apply_env_overrides<F>(config: &mut HostplaneConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup(ENV_ADMIN_URL) {
        config.engine.admin_url = v;
    }
    if let Some(v) = lookup(ENV_ENGINE_BINARY) {
        config.engine.binary = v;
    }
    if let Some(v) = lookup(ENV_API_KEY) {
        config.api.api_key = v;
    }
    if let Some(v) = lookup(ENV_STATE_PATH) {
        config.state.path = Some(v);
    }
}
