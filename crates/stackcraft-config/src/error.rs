//! Configuration loading errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parsing failed: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("top-level configuration must be a mapping")]
    NotAMapping,

    #[error("stack-specific config must be a mapping: {0}")]
    SectionNotAMapping(String),

    #[error("configuration keys must be scalars: {0}")]
    InvalidKey(String),

    #[error("invalid value for {key}: {message}")]
    Convert { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
