//! Configuration management for the call screening service
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default`, `config/{env}`)
//! - Environment variables (`CALLGUARD__` prefix, `__` separator)
//! - A few plain overrides the deployment tooling sets directly
//!   (`DRY_RUN`, `TELNYX_API_KEY`, `CALLGUARD_ALERT_SENDER`)

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, load_settings_from, AuthConfig, LinesConfig, ObservabilityConfig,
    PromptsConfig, RuntimeEnvironment, ScreeningConfig, ServerConfig, SessionsConfig, Settings,
    TelephonyConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
