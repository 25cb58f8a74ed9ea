//! Configuration for the telephone exchange
//!
//! Supports loading settings from:
//! - TOML files
//! - Environment variables (POTSBOX_ prefix)
//!
//! Also owns the service catalog: the static table mapping dial codes to
//! service descriptors, validated before the exchange starts answering.

pub mod catalog;
pub mod settings;

pub use catalog::{HandlerKind, ServiceCatalog, ServiceDescriptor, ServiceName};
pub use settings::{
    CallerConfig, ExchangeSettings, LlmSettings, ServerConfig, Settings, SpeechSettings,
    load_settings,
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
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
