//! Stack specifications and instances.
//!
//! A [`StackSpec`] is the static description of a stack: its base name,
//! variant, capability flags, default configuration and the ordered set of
//! declaration providers that produce its resources and outputs. A [`Stack`]
//! is a validated instance of a spec bound to one configuration.

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::conf::{StackConf, scalar_string};
use crate::image;
use crate::provider::Provider;
use crate::template::{Output, Resource, Tag, Template};
use crate::variant::Variant;
use crate::{Error, Result};

/// Normalises what a declaration provider returns into a sequence.
pub trait IntoDeclarations<T> {
    fn into_declarations(self) -> Vec<T>;
}

impl IntoDeclarations<Resource> for Resource {
    fn into_declarations(self) -> Vec<Resource> {
        vec![self]
    }
}

impl IntoDeclarations<Resource> for Vec<Resource> {
    fn into_declarations(self) -> Vec<Resource> {
        self
    }
}

impl IntoDeclarations<Output> for Output {
    fn into_declarations(self) -> Vec<Output> {
        vec![self]
    }
}

impl IntoDeclarations<Output> for Vec<Output> {
    fn into_declarations(self) -> Vec<Output> {
        self
    }
}

type ResourceProvider = Arc<dyn Fn(&Stack) -> Result<Vec<Resource>> + Send + Sync>;
type OutputProvider = Arc<dyn Fn(&Stack) -> Result<Vec<Output>> + Send + Sync>;

/// Static description of a stack.
pub struct StackSpec {
    base_name: String,
    description: Option<String>,
    variant: Variant,
    capabilities: Vec<String>,
    default_conf: StackConf,
    resources: Vec<(String, ResourceProvider)>,
    outputs: Vec<(String, OutputProvider)>,
}

impl StackSpec {
    pub fn builder(base_name: impl Into<String>, variant: Variant) -> StackSpecBuilder {
        StackSpecBuilder {
            spec: StackSpec {
                base_name: base_name.into(),
                description: None,
                variant,
                capabilities: Vec::new(),
                default_conf: StackConf::new(),
                resources: Vec::new(),
                outputs: Vec::new(),
            },
        }
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn variant(&self) -> &Variant {
        &self.variant
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn default_conf(&self) -> &StackConf {
        &self.default_conf
    }

    /// Names of the registered resource providers, in registration order.
    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|(name, _)| name.as_str())
    }

    /// Names of the registered output providers, in registration order.
    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|(name, _)| name.as_str())
    }
}

impl std::fmt::Debug for StackSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackSpec")
            .field("base_name", &self.base_name)
            .field("variant", &self.variant)
            .field("capabilities", &self.capabilities)
            .field("resources", &self.resource_names().collect::<Vec<_>>())
            .field("outputs", &self.output_names().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`StackSpec`].
pub struct StackSpecBuilder {
    spec: StackSpec,
}

impl StackSpecBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.spec.description = Some(description.into());
        self
    }

    /// Add a capability flag the provider must be given to deploy the stack.
    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        self.spec.capabilities.push(capability.into());
        self
    }

    pub fn default_conf(mut self, conf: StackConf) -> Self {
        self.spec.default_conf = conf;
        self
    }

    /// Register a resource provider. It may return one resource or several.
    pub fn resource<F, D>(mut self, name: impl Into<String>, provider: F) -> Self
    where
        F: Fn(&Stack) -> Result<D> + Send + Sync + 'static,
        D: IntoDeclarations<Resource>,
    {
        let provider: ResourceProvider =
            Arc::new(move |stack: &Stack| provider(stack).map(D::into_declarations));
        self.spec.resources.push((name.into(), provider));
        self
    }

    /// Register an output provider. It may return one output or several.
    pub fn output<F, D>(mut self, name: impl Into<String>, provider: F) -> Self
    where
        F: Fn(&Stack) -> Result<D> + Send + Sync + 'static,
        D: IntoDeclarations<Output>,
    {
        let provider: OutputProvider =
            Arc::new(move |stack: &Stack| provider(stack).map(D::into_declarations));
        self.spec.outputs.push((name.into(), provider));
        self
    }

    pub fn build(self) -> StackSpec {
        self.spec
    }
}

/// A validated stack instance.
#[derive(Clone)]
pub struct Stack {
    spec: Arc<StackSpec>,
    conf: StackConf,
    region: Option<String>,
    env: Option<String>,
    release: Option<String>,
    image_lookup: Option<Arc<dyn Provider>>,
}

impl Stack {
    /// Build a stack from a spec and caller configuration, then validate it
    /// against the `StackSpec` variant.
    pub fn new(spec: impl Into<Arc<StackSpec>>, conf: StackConf) -> Result<Self> {
        let spec = spec.into();
        let conf = spec.variant.resolve_conf(&spec.default_conf, conf);
        let stack = Self {
            region: conf.get("region").and_then(scalar_string),
            env: conf.get("env").and_then(scalar_string),
            release: conf.get("release").and_then(scalar_string),
            spec,
            conf,
            image_lookup: None,
        };
        stack.spec.variant.validate(&stack)?;
        debug!(
            base_name = %stack.spec.base_name,
            variant = stack.spec.variant.name,
            "Stack constructed"
        );
        Ok(stack)
    }

    /// Build a stack from `key=value` override tokens. A token without `=`
    /// sets its key to null.
    pub fn from_override_tokens<I, S>(spec: impl Into<Arc<StackSpec>>, tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let conf = crate::conf::parse_override_tokens(tokens)?;
        Self::new(spec, conf)
    }

    /// Attach the provider used to resolve image identifiers.
    pub fn with_image_lookup(mut self, provider: Arc<dyn Provider>) -> Self {
        self.image_lookup = Some(provider);
        self
    }

    pub fn spec(&self) -> &StackSpec {
        &self.spec
    }

    pub fn base_name(&self) -> &str {
        &self.spec.base_name
    }

    pub fn capabilities(&self) -> &[String] {
        &self.spec.capabilities
    }

    pub fn conf(&self) -> &StackConf {
        &self.conf
    }

    /// Region the stack is deployed to. Always non-empty on a constructed stack.
    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or_default()
    }

    pub fn env(&self) -> Option<&str> {
        self.env.as_deref()
    }

    pub fn release(&self) -> Option<&str> {
        self.release.as_deref()
    }

    /// A configuration value that must be present.
    pub fn conf_value(&self, key: &str) -> Result<&Value> {
        self.conf.get(key).ok_or_else(|| Error::InvalidConf {
            key: key.to_string(),
            message: "missing".to_string(),
        })
    }

    /// A configuration value that must be a string.
    pub fn conf_str(&self, key: &str) -> Result<&str> {
        self.conf_value(key)?
            .as_str()
            .ok_or_else(|| Error::InvalidConf {
                key: key.to_string(),
                message: "expected a string".to_string(),
            })
    }

    pub fn stackname(&self) -> Result<String> {
        self.spec.variant.stackname(self)
    }

    pub fn tags(&self) -> Result<Vec<Tag>> {
        self.spec.variant.tags(self)
    }

    /// Compile the stack into a fresh template.
    pub fn compile(&self) -> Result<Template> {
        let mut template = Template::new();
        template.description = self.spec.description.clone();
        self.compile_into(&mut template)?;
        Ok(template)
    }

    /// Attach this stack's resources and outputs to an existing template.
    ///
    /// Lets several stacks be composed onto one document.
    pub fn compile_into(&self, template: &mut Template) -> Result<()> {
        for (name, provider) in &self.spec.resources {
            let resources = provider(self)?;
            debug!(provider = %name, count = resources.len(), "Attaching resources");
            for resource in resources {
                template.add_resource(resource);
            }
        }
        for (name, provider) in &self.spec.outputs {
            let outputs = provider(self)?;
            debug!(provider = %name, count = outputs.len(), "Attaching outputs");
            for output in outputs {
                template.add_output(output);
            }
        }
        Ok(())
    }

    /// Evaluate a single registered resource provider by name.
    pub fn resources_of(&self, name: &str) -> Result<Vec<Resource>> {
        let (_, provider) = self
            .spec
            .resources
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| Error::UnknownProvider(name.to_string()))?;
        provider(self)
    }

    /// Resolve an image manifest location to an image id in the stack's region.
    pub fn image_id(&self, location: &str) -> Result<String> {
        image::resolve_image_id(self.image_lookup.as_deref(), self.region(), location)
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("base_name", &self.spec.base_name)
            .field("region", &self.region)
            .field("env", &self.env)
            .field("release", &self.release)
            .field("conf", &self.conf)
            .finish()
    }
}
