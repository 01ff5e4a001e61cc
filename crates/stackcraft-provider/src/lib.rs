//! Provisioning API backends for stackcraft.
//!
//! Provides provider implementations:
//! - HTTP (JSON over a provisioning endpoint)
//! - In-memory (simulated provisioning, for local runs and tests)

pub mod http;
pub mod memory;

pub use http::HttpProvider;
pub use memory::MemoryProvider;
pub use stackcraft_core::provider::{
    Provider, ProviderError, ProviderResponse, StackDescription, StackEvent, StackOutput,
    StackRequest, TransientStatus,
};
