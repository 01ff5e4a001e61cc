//! Provider trait and provisioning API types.
//!
//! A provider is the remote provisioning API stacks are deployed against. The
//! CLI driver only ever talks to it through [`Provider`].

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::template::Tag;

/// A stack-level status that resolves without further caller action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TransientStatus {
    #[display("CREATE_IN_PROGRESS")]
    CreateInProgress,
    #[display("UPDATE_IN_PROGRESS")]
    UpdateInProgress,
    #[display("DELETE_IN_PROGRESS")]
    DeleteInProgress,
}

/// Current state of a deployed stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackDescription {
    #[serde(default)]
    pub stack_id: Option<String>,
    pub stack_name: String,
    pub stack_status: String,
    #[serde(default)]
    pub outputs: Vec<StackOutput>,
}

/// An output value reported by the provider for a deployed stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackOutput {
    pub output_key: String,
    pub output_value: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub export_name: Option<String>,
}

/// A single entry in a stack's event history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackEvent {
    pub timestamp: DateTime<Utc>,
    pub resource_type: String,
    pub logical_resource_id: String,
    pub resource_status: String,
    #[serde(default)]
    pub resource_status_reason: Option<String>,
}

/// Request body for create and update calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackRequest {
    pub stack_name: String,
    pub template_body: String,
    pub capabilities: Vec<String>,
    pub tags: Vec<Tag>,
}

/// Raw response of a mutating or validating call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub status: u16,
    #[serde(default)]
    pub body: Value,
}

impl ProviderResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `StackId` field of the response body, if any.
    pub fn stack_id(&self) -> Option<&str> {
        self.body.get("StackId").and_then(Value::as_str)
    }
}

impl std::fmt::Display for ProviderResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "status {}: {}", self.status, self.body)
    }
}

/// Provider call failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Transport(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{code}: {message} (status {status})")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Whether this error is the provider refusing an update that would not
    /// change anything.
    ///
    /// Providers only report this as human-readable text, so detection is a
    /// message match. Every call site goes through here.
    pub fn is_noop_update(&self) -> bool {
        match self {
            ProviderError::Api { message, .. } => message.to_lowercase().contains("no updates"),
            _ => false,
        }
    }
}

/// Trait for provisioning APIs.
pub trait Provider: Send + Sync {
    /// Describe a stack by name.
    fn describe_stack(&self, name: &str) -> Result<StackDescription, ProviderError>;

    /// Full event history of a stack, in provider order.
    fn describe_stack_events(&self, name: &str) -> Result<Vec<StackEvent>, ProviderError>;

    /// Validate a template body.
    fn validate_template(&self, template_body: &str) -> Result<ProviderResponse, ProviderError>;

    /// Start creating a stack.
    fn create_stack(&self, request: &StackRequest) -> Result<ProviderResponse, ProviderError>;

    /// Start updating an existing stack.
    fn update_stack(&self, request: &StackRequest) -> Result<ProviderResponse, ProviderError>;

    /// Start deleting a stack and its resources.
    fn delete_stack(&self, name: &str) -> Result<ProviderResponse, ProviderError>;

    /// Image identifiers whose manifest location matches exactly.
    fn find_images(
        &self,
        region: &str,
        manifest_location: &str,
    ) -> Result<Vec<String>, ProviderError>;
}
