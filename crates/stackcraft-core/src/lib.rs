//! Core types for declaring CloudFormation-style stacks.
//!
//! This crate contains:
//! - Template documents, resources, outputs and intrinsic helpers
//! - Stack specifications, variants and the compile step
//! - The provider contract consumed by the CLI driver
//! - Image resolution against a provider's image catalog

pub mod conf;
pub mod error;
pub mod image;
pub mod provider;
pub mod stack;
pub mod template;
pub mod variant;

pub use conf::StackConf;
pub use error::{Error, Result};
pub use provider::{Provider, ProviderError};
pub use stack::{IntoDeclarations, Stack, StackSpec, StackSpecBuilder};
pub use template::{Output, Resource, Tag, Template};
pub use variant::Variant;

#[doc(hidden)]
pub use serde_json;
