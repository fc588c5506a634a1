//! Layered configuration for the conversational assistant.
//!
//! Load order, highest precedence first: environment variables
//! (`ASSISTANT__` prefix, `__` as separator) > `config/{env}.yaml` >
//! `config/default.yaml` > struct defaults.

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, LlmProvider, LlmSettings, PersistenceSettings, RagSettings, RuntimeEnvironment,
    ServerSettings, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for assistant_core::Error {
    fn from(err: ConfigError) -> Self {
        assistant_core::Error::Configuration(err.to_string())
    }
}
