//! Error types for stackcraft.

use thiserror::Error;

use crate::provider::{ProviderError, ProviderResponse};

#[derive(Debug, Error)]
pub enum Error {
    #[error("stack definition is missing required attribute: {0}")]
    MissingAttribute(&'static str),

    #[error("not implemented: {0}")]
    Unimplemented(String),

    #[error("no resource provider named {0}")]
    UnknownProvider(String),

    #[error("invalid configuration value for {key}: {message}")]
    InvalidConf { key: String, message: String },

    #[error("no image found for manifest location: {0}")]
    NoImageMatch(String),

    #[error("manifest location {location} matches {count} images")]
    AmbiguousImage { location: String, count: usize },

    #[error("no provider attached for image lookup in region {0}")]
    NoImageLookup(String),

    #[error("stack \"{0}\" not found")]
    StackNotFound(String),

    #[error("{operation} failed! Response:\n{response}")]
    ProviderResponse {
        operation: &'static str,
        response: ProviderResponse,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("failed to render template: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, Error>;
