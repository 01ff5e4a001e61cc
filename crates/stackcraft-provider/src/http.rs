//! JSON-over-HTTP provisioning client.

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use stackcraft_core::provider::{
    Provider, ProviderError, ProviderResponse, StackDescription, StackEvent, StackRequest,
};
use tracing::debug;
use url::Url;

/// Default endpoint when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:4580";

/// Blocking client for a provisioning endpoint.
///
/// Every route is scoped to one region: `{endpoint}/regions/{region}/...`.
pub struct HttpProvider {
    client: Client,
    endpoint: Url,
    region: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EventsBody {
    #[serde(default)]
    stack_events: Vec<StackEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ImagesBody {
    #[serde(default)]
    images: Vec<ImageBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ImageBody {
    image_id: String,
}

impl HttpProvider {
    pub fn new(endpoint: &str, region: impl Into<String>) -> Result<Self, ProviderError> {
        // A trailing slash keeps the last path segment when joining routes
        let mut endpoint = endpoint.to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| ProviderError::Transport(format!("invalid endpoint {}: {}", endpoint, e)))?;

        Ok(Self {
            client: Client::new(),
            endpoint,
            region: region.into(),
        })
    }

    pub fn with_client(client: Client, endpoint: Url, region: impl Into<String>) -> Self {
        Self {
            client,
            endpoint,
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn url(&self, region: &str, route: &str) -> Result<Url, ProviderError> {
        let path = format!("regions/{}/{}", urlencoding::encode(region), route);
        self.endpoint
            .join(&path)
            .map_err(|e| ProviderError::Transport(format!("invalid route {}: {}", path, e)))
    }

    fn stack_route(name: &str) -> String {
        format!("stacks/{}", urlencoding::encode(name))
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, ProviderError> {
        request
            .header("Accept", "application/json")
            .send()
            .map_err(|e| ProviderError::Transport(e.to_string()))
    }

    /// Read a query response, treating every non-success status as an error.
    fn read<T: DeserializeOwned>(&self, name: &str, response: Response) -> Result<T, ProviderError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(name.to_string()));
        }

        let body = read_body(response)?;
        if !status.is_success() {
            return Err(http_error(status, &body));
        }

        serde_json::from_value(body).map_err(|e| ProviderError::Decode(e.to_string()))
    }

    fn respond(&self, response: Response) -> Result<ProviderResponse, ProviderError> {
        let status = response.status();
        let body = read_body(response)?;
        mutation_result(status, body)
    }
}

/// Outcome of a mutating call.
///
/// Non-success statuses with an API error body, or whose text is a no-op
/// update refusal, are errors. Any other non-success is handed back for the
/// caller to report.
fn mutation_result(status: StatusCode, body: Value) -> Result<ProviderResponse, ProviderError> {
    if !status.is_success() {
        if let Some(err) = api_error(status, &body) {
            return Err(err);
        }
        let err = http_error(status, &body);
        if err.is_noop_update() {
            return Err(err);
        }
    }

    Ok(ProviderResponse {
        status: status.as_u16(),
        body,
    })
}

fn read_body(response: Response) -> Result<Value, ProviderError> {
    let text = response
        .text()
        .map_err(|e| ProviderError::Transport(e.to_string()))?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    // Non-JSON bodies are kept verbatim for error reporting
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

/// An API error from the body, falling back to the raw body text.
fn http_error(status: StatusCode, body: &Value) -> ProviderError {
    api_error(status, body).unwrap_or_else(|| ProviderError::Api {
        status: status.as_u16(),
        code: "HttpError".to_string(),
        message: match body {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        },
    })
}

fn api_error(status: StatusCode, body: &Value) -> Option<ProviderError> {
    let parsed: ApiErrorBody = serde_json::from_value(body.clone()).ok()?;
    Some(ProviderError::Api {
        status: status.as_u16(),
        code: parsed.code,
        message: parsed.message,
    })
}

impl Provider for HttpProvider {
    fn describe_stack(&self, name: &str) -> Result<StackDescription, ProviderError> {
        let url = self.url(&self.region, &Self::stack_route(name))?;
        debug!(stack = %name, %url, "Describing stack");
        let response = self.send(self.client.get(url))?;
        self.read(name, response)
    }

    fn describe_stack_events(&self, name: &str) -> Result<Vec<StackEvent>, ProviderError> {
        let url = self.url(&self.region, &format!("{}/events", Self::stack_route(name)))?;
        let response = self.send(self.client.get(url))?;
        let body: EventsBody = self.read(name, response)?;
        Ok(body.stack_events)
    }

    fn validate_template(&self, template_body: &str) -> Result<ProviderResponse, ProviderError> {
        let url = self.url(&self.region, "templates/validate")?;
        debug!(%url, "Validating template");
        let response = self.send(
            self.client
                .post(url)
                .json(&json!({ "TemplateBody": template_body })),
        )?;
        self.respond(response)
    }

    fn create_stack(&self, request: &StackRequest) -> Result<ProviderResponse, ProviderError> {
        let url = self.url(&self.region, "stacks")?;
        debug!(stack = %request.stack_name, %url, "Creating stack");
        let response = self.send(self.client.post(url).json(request))?;
        self.respond(response)
    }

    fn update_stack(&self, request: &StackRequest) -> Result<ProviderResponse, ProviderError> {
        let url = self.url(&self.region, &Self::stack_route(&request.stack_name))?;
        debug!(stack = %request.stack_name, %url, "Updating stack");
        let response = self.send(self.client.put(url).json(request))?;
        self.respond(response)
    }

    fn delete_stack(&self, name: &str) -> Result<ProviderResponse, ProviderError> {
        let url = self.url(&self.region, &Self::stack_route(name))?;
        debug!(stack = %name, %url, "Deleting stack");
        let response = self.send(self.client.delete(url))?;
        self.respond(response)
    }

    fn find_images(
        &self,
        region: &str,
        manifest_location: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let mut url = self.url(region, "images")?;
        url.query_pairs_mut()
            .append_pair("manifest-location", manifest_location);
        let response = self.send(self.client.get(url))?;
        let body: ImagesBody = self.read(manifest_location, response)?;
        Ok(body.images.into_iter().map(|i| i.image_id).collect())
    }
}
