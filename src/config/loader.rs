//! Configuration loading from disk and environment.

use std::env;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{ClientConfig, Environment};
use crate::config::validation::{validate_config, ValidationError};

/// Overrides the API base URL.
pub const ENV_BASE_URL: &str = "MEAL_CLIENT_BASE_URL";
/// Overrides the API key.
pub const ENV_API_KEY: &str = "MEAL_CLIENT_API_KEY";
/// Overrides the environment ("development" or "production").
pub const ENV_ENVIRONMENT: &str = "MEAL_CLIENT_ENV";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, override and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: ClientConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Defaults plus environment overrides, validated. Used when no file is given.
pub fn load_from_env() -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::default();
    apply_env_overrides(&mut config)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply `MEAL_CLIENT_*` environment variables on top of a parsed config.
pub fn apply_env_overrides(config: &mut ClientConfig) -> Result<(), ConfigError> {
    if let Ok(base_url) = env::var(ENV_BASE_URL) {
        config.api.base_url = base_url;
    }
    if let Ok(key) = env::var(ENV_API_KEY) {
        config.api.api_key = if key.is_empty() { None } else { Some(key) };
    }
    if let Ok(raw) = env::var(ENV_ENVIRONMENT) {
        config.api.environment = raw
            .parse::<Environment>()
            .map_err(|message| ConfigError::Env {
                var: ENV_ENVIRONMENT,
                message,
            })?;
    }
    Ok(())
}
