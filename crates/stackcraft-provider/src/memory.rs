//! In-memory provisioning backend.
//!
//! Simulates a provider closely enough to drive the CLI end to end without a
//! network. Stacks move through their lifecycle one phase per event query:
//! the first query reports resources in progress, the next settles them and
//! the stack. Deleted stacks disappear once their delete settles.

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value, json};
use stackcraft_core::provider::{
    Provider, ProviderError, ProviderResponse, StackDescription, StackEvent, StackOutput,
    StackRequest,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const STACK_RESOURCE_TYPE: &str = "AWS::CloudFormation::Stack";

/// Simulated provider state, shared behind a mutex.
pub struct MemoryProvider {
    region: String,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    stacks: HashMap<String, SimStack>,
    images: Vec<(String, String, String)>,
    clock: Option<DateTime<Utc>>,
    next_id: u64,
}

struct SimStack {
    id: String,
    request: StackRequest,
    status: String,
    events: Vec<StackEvent>,
    outputs: Vec<StackOutput>,
    pending: VecDeque<Phase>,
}

/// One batch of lifecycle progress.
struct Phase {
    resource_status: String,
    stack_status: Option<String>,
}

#[derive(Clone, Copy)]
enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    fn prefix(&self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryProvider {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Register an image under a manifest location.
    pub fn with_image(
        self,
        region: impl Into<String>,
        manifest_location: impl Into<String>,
        image_id: impl Into<String>,
    ) -> Self {
        self.lock().images.push((
            region.into(),
            manifest_location.into(),
            image_id.into(),
        ));
        self
    }

    /// Names of the stacks currently known, in no particular order.
    pub fn stack_names(&self) -> Vec<String> {
        self.lock().stacks.keys().cloned().collect()
    }

    /// The last request accepted for a stack.
    pub fn last_request(&self, name: &str) -> Option<StackRequest> {
        self.lock().stacks.get(name).map(|s| s.request.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves the simulation usable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn not_found(name: &str) -> ProviderError {
        ProviderError::Api {
            status: 400,
            code: "ValidationError".to_string(),
            message: format!("Stack with id {} does not exist", name),
        }
    }
}

impl State {
    /// Wall-clock event timestamps, nudged forward so they strictly increase.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.clock {
            Some(last) if last + Duration::milliseconds(1) > now => last + Duration::milliseconds(1),
            _ => now,
        };
        self.clock = Some(next);
        next
    }

    fn event(
        &mut self,
        resource_type: &str,
        logical_id: &str,
        status: &str,
        reason: Option<&str>,
    ) -> StackEvent {
        StackEvent {
            timestamp: self.tick(),
            resource_type: resource_type.to_string(),
            logical_resource_id: logical_id.to_string(),
            resource_status: status.to_string(),
            resource_status_reason: reason.map(str::to_string),
        }
    }

    /// Apply the next pending phase of a stack, returning the events it
    /// produced.
    fn advance(&mut self, name: &str) -> Vec<StackEvent> {
        let Some(stack) = self.stacks.get_mut(name) else {
            return Vec::new();
        };
        let Some(phase) = stack.pending.pop_front() else {
            return Vec::new();
        };
        let body = stack.request.template_body.clone();

        let mut events = Vec::new();
        for (logical_id, resource_type) in template_resources(&body) {
            events.push(self.event(&resource_type, &logical_id, &phase.resource_status, None));
        }
        if let Some(status) = &phase.stack_status {
            events.push(self.event(STACK_RESOURCE_TYPE, name, status, None));
        }

        if let Some(status) = phase.stack_status {
            debug!(stack = %name, status = %status, "Simulated stack settled");
            if status == "DELETE_COMPLETE" {
                self.stacks.remove(name);
                return events;
            }
            if let Some(stack) = self.stacks.get_mut(name) {
                stack.outputs = template_outputs(name, &body);
                stack.status = status;
            }
        }
        if let Some(stack) = self.stacks.get_mut(name) {
            stack.events.extend(events.iter().cloned());
        }
        events
    }

    /// Start an operation: record the stack-level in-progress event and queue
    /// the phases that settle it.
    fn begin(&mut self, name: &str, operation: Operation) {
        let in_progress = format!("{}_IN_PROGRESS", operation.prefix());
        let complete = format!("{}_COMPLETE", operation.prefix());
        let reason = match operation {
            Operation::Create => Some("User Initiated"),
            _ => None,
        };
        let event = self.event(STACK_RESOURCE_TYPE, name, &in_progress, reason);

        if let Some(stack) = self.stacks.get_mut(name) {
            stack.status = in_progress.clone();
            stack.events.push(event);
            stack.pending = VecDeque::from([
                Phase {
                    resource_status: in_progress,
                    stack_status: None,
                },
                Phase {
                    resource_status: complete.clone(),
                    stack_status: Some(complete),
                },
            ]);
        }
    }
}

fn parse_template(body: &str) -> Result<Map<String, Value>, String> {
    // YAML is a superset of JSON, so both renderings parse here
    let doc: Value = serde_yaml::from_str(body).map_err(|e| e.to_string())?;
    match doc {
        Value::Object(map) => Ok(map),
        _ => Err("template is not a mapping".to_string()),
    }
}

fn template_resources(body: &str) -> Vec<(String, String)> {
    let Ok(template) = parse_template(body) else {
        return Vec::new();
    };
    template
        .get("Resources")
        .and_then(Value::as_object)
        .map(|resources| {
            resources
                .iter()
                .map(|(id, r)| {
                    let kind = r.get("Type").and_then(Value::as_str).unwrap_or("Unknown");
                    (id.clone(), kind.to_string())
                })
                .collect()
        })
        .unwrap_or_default()
}

fn template_outputs(stack_name: &str, body: &str) -> Vec<StackOutput> {
    let Ok(template) = parse_template(body) else {
        return Vec::new();
    };
    let Some(outputs) = template.get("Outputs").and_then(Value::as_object) else {
        return Vec::new();
    };

    outputs
        .iter()
        .map(|(key, output)| StackOutput {
            output_key: key.clone(),
            output_value: output
                .get("Value")
                .map(|v| simulate_value(stack_name, v))
                .unwrap_or_default(),
            description: output
                .get("Description")
                .and_then(Value::as_str)
                .map(str::to_string),
            export_name: output
                .get("Export")
                .and_then(|e| e.get("Name"))
                .map(|v| simulate_value(stack_name, v)),
        })
        .collect()
}

/// Resolve an intrinsic function the way a provider would, with made-up
/// physical identifiers.
fn simulate_value(stack_name: &str, value: &Value) -> String {
    if let Some(s) = value.as_str() {
        return s.to_string();
    }
    if let Some(target) = value.get("Ref").and_then(Value::as_str) {
        return format!("{}-{}", stack_name, target.to_lowercase());
    }
    if let Some(parts) = value.get("Fn::GetAtt").and_then(Value::as_array) {
        let target = parts.first().and_then(Value::as_str).unwrap_or_default();
        let attr = parts.get(1).and_then(Value::as_str).unwrap_or_default();
        return format!("arn:memory:::{}-{}/{}", stack_name, target.to_lowercase(), attr);
    }
    if let Some(text) = value.get("Fn::Sub").and_then(Value::as_str) {
        return text.replace("${AWS::StackName}", stack_name);
    }
    value.to_string()
}

impl Provider for MemoryProvider {
    fn describe_stack(&self, name: &str) -> Result<StackDescription, ProviderError> {
        let state = self.lock();
        let stack = state
            .stacks
            .get(name)
            .ok_or_else(|| ProviderError::NotFound(name.to_string()))?;
        Ok(StackDescription {
            stack_id: Some(stack.id.clone()),
            stack_name: name.to_string(),
            stack_status: stack.status.clone(),
            outputs: stack.outputs.clone(),
        })
    }

    fn describe_stack_events(&self, name: &str) -> Result<Vec<StackEvent>, ProviderError> {
        let mut state = self.lock();
        let mut events = state
            .stacks
            .get(name)
            .map(|s| s.events.clone())
            .ok_or_else(|| Self::not_found(name))?;

        let settled = state.advance(name);
        debug!(stack = %name, new_events = settled.len(), "Simulated events");
        events.extend(settled);

        // Newest first, as real providers report them
        events.reverse();
        Ok(events)
    }

    fn validate_template(&self, template_body: &str) -> Result<ProviderResponse, ProviderError> {
        let template = parse_template(template_body).map_err(|message| ProviderError::Api {
            status: 400,
            code: "ValidationError".to_string(),
            message: format!("Template format error: {}", message),
        })?;
        if !template.get("Resources").is_some_and(Value::is_object) {
            return Err(ProviderError::Api {
                status: 400,
                code: "ValidationError".to_string(),
                message: "Template format error: At least one Resources member must be defined."
                    .to_string(),
            });
        }

        Ok(ProviderResponse::ok(json!({
            "Description": template.get("Description").cloned().unwrap_or(Value::Null),
            "Parameters": [],
        })))
    }

    fn create_stack(&self, request: &StackRequest) -> Result<ProviderResponse, ProviderError> {
        let mut state = self.lock();
        let name = &request.stack_name;
        if state.stacks.contains_key(name) {
            return Err(ProviderError::Api {
                status: 400,
                code: "AlreadyExistsException".to_string(),
                message: format!("Stack [{}] already exists", name),
            });
        }

        state.next_id += 1;
        let id = format!(
            "arn:memory:{}:stack/{}/{}",
            self.region, name, state.next_id
        );
        state.stacks.insert(
            name.clone(),
            SimStack {
                id: id.clone(),
                request: request.clone(),
                status: String::new(),
                events: Vec::new(),
                outputs: Vec::new(),
                pending: VecDeque::new(),
            },
        );
        state.begin(name, Operation::Create);
        debug!(stack = %name, %id, "Simulated create");

        Ok(ProviderResponse::ok(json!({ "StackId": id })))
    }

    fn update_stack(&self, request: &StackRequest) -> Result<ProviderResponse, ProviderError> {
        let mut state = self.lock();
        let name = &request.stack_name;
        let stack = state
            .stacks
            .get_mut(name)
            .ok_or_else(|| Self::not_found(name))?;

        if stack.status.ends_with("_IN_PROGRESS") {
            return Err(ProviderError::Api {
                status: 400,
                code: "ValidationError".to_string(),
                message: format!(
                    "Stack:{} is in {} state and can not be updated.",
                    stack.id, stack.status
                ),
            });
        }
        if stack.request.template_body == request.template_body
            && stack.request.tags == request.tags
        {
            return Err(ProviderError::Api {
                status: 400,
                code: "ValidationError".to_string(),
                message: "No updates are to be performed.".to_string(),
            });
        }

        stack.request = request.clone();
        let id = stack.id.clone();
        state.begin(name, Operation::Update);
        debug!(stack = %name, "Simulated update");

        Ok(ProviderResponse::ok(json!({ "StackId": id })))
    }

    fn delete_stack(&self, name: &str) -> Result<ProviderResponse, ProviderError> {
        let mut state = self.lock();
        if state.stacks.contains_key(name) {
            state.begin(name, Operation::Delete);
            debug!(stack = %name, "Simulated delete");
        }
        Ok(ProviderResponse::ok(Value::Null))
    }

    fn find_images(
        &self,
        region: &str,
        manifest_location: &str,
    ) -> Result<Vec<String>, ProviderError> {
        Ok(self
            .lock()
            .images
            .iter()
            .filter(|(r, location, _)| r == region && location == manifest_location)
            .map(|(_, _, id)| id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackcraft_core::Tag;

    const TEMPLATE: &str = r#"
Resources:
  Bucket:
    Type: AWS::S3::Bucket
Outputs:
  BucketArn:
    Description: Bucket ARN
    Value:
      Fn::GetAtt: [Bucket, Arn]
    Export:
      Name:
        Fn::Sub: ${AWS::StackName}-BucketArn
"#;

    fn request(body: &str) -> StackRequest {
        StackRequest {
            stack_name: "foo".to_string(),
            template_body: body.to_string(),
            capabilities: vec![],
            tags: vec![Tag::new("Name", "foo")],
        }
    }

    fn settle(provider: &MemoryProvider, name: &str) {
        while provider
            .describe_stack(name)
            .map(|d| d.stack_status.ends_with("_IN_PROGRESS"))
            .unwrap_or(false)
        {
            provider.describe_stack_events(name).unwrap();
        }
    }

    #[test]
    fn test_create_lifecycle() {
        let provider = MemoryProvider::new("eu-west-1");
        let response = provider.create_stack(&request(TEMPLATE)).unwrap();
        assert!(response.stack_id().unwrap().starts_with("arn:memory:eu-west-1:stack/foo/"));
        assert_eq!(
            provider.describe_stack("foo").unwrap().stack_status,
            "CREATE_IN_PROGRESS"
        );

        let first = provider.describe_stack_events("foo").unwrap();
        assert!(first.iter().any(|e| e.logical_resource_id == "Bucket"));

        provider.describe_stack_events("foo").unwrap();
        let described = provider.describe_stack("foo").unwrap();
        assert_eq!(described.stack_status, "CREATE_COMPLETE");
        assert_eq!(described.outputs.len(), 1);
        assert_eq!(described.outputs[0].export_name.as_deref(), Some("foo-BucketArn"));
    }

    #[test]
    fn test_events_are_newest_first_and_increasing() {
        let provider = MemoryProvider::default();
        provider.create_stack(&request(TEMPLATE)).unwrap();
        let events = provider.describe_stack_events("foo").unwrap();
        assert!(events.windows(2).all(|w| w[0].timestamp > w[1].timestamp));
    }

    #[test]
    fn test_create_twice_is_rejected() {
        let provider = MemoryProvider::default();
        provider.create_stack(&request(TEMPLATE)).unwrap();
        assert!(matches!(
            provider.create_stack(&request(TEMPLATE)),
            Err(ProviderError::Api { code, .. }) if code == "AlreadyExistsException"
        ));
    }

    #[test]
    fn test_identical_update_is_noop() {
        let provider = MemoryProvider::default();
        provider.create_stack(&request(TEMPLATE)).unwrap();
        settle(&provider, "foo");

        let err = provider.update_stack(&request(TEMPLATE)).unwrap_err();
        assert!(err.is_noop_update());

        let changed = TEMPLATE.replace("Bucket ARN", "The bucket ARN");
        provider.update_stack(&request(&changed)).unwrap();
        assert_eq!(
            provider.describe_stack("foo").unwrap().stack_status,
            "UPDATE_IN_PROGRESS"
        );
    }

    #[test]
    fn test_delete_removes_stack() {
        let provider = MemoryProvider::default();
        provider.create_stack(&request(TEMPLATE)).unwrap();
        settle(&provider, "foo");

        provider.delete_stack("foo").unwrap();
        settle(&provider, "foo");
        assert!(matches!(
            provider.describe_stack("foo"),
            Err(ProviderError::NotFound(_))
        ));
        assert!(provider.describe_stack_events("foo").is_err());
    }

    #[test]
    fn test_validate_template() {
        let provider = MemoryProvider::default();
        assert!(provider.validate_template(TEMPLATE).unwrap().is_success());
        assert!(provider.validate_template("Description: nothing").is_err());
        assert!(provider.validate_template("- not\n- a mapping").is_err());
    }

    #[test]
    fn test_find_images() {
        let provider = MemoryProvider::default()
            .with_image("eu-west-1", "amazon/ami", "ami-1")
            .with_image("us-east-1", "amazon/ami", "ami-2");
        assert_eq!(
            provider.find_images("eu-west-1", "amazon/ami").unwrap(),
            vec!["ami-1"]
        );
        assert!(provider.find_images("eu-west-1", "other").unwrap().is_empty());
    }
}
