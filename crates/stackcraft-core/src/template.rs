//! Template documents and their declarations.
//!
//! Only the slice of the CloudFormation object model that stacks need is
//! modelled here: typed resources with free-form properties, outputs with
//! optional exports, and helpers producing intrinsic function values.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

use crate::{Error, Result};

/// A single resource declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    #[serde(skip)]
    pub logical_id: String,
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(rename = "Properties", skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    #[serde(rename = "DependsOn", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl Resource {
    pub fn new(logical_id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            resource_type: resource_type.into(),
            properties: Map::new(),
            depends_on: Vec::new(),
        }
    }

    /// Set a property, replacing any previous value.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }

    /// Look up a property value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// `{"Ref": <logical id>}`
    pub fn reference(&self) -> Value {
        reference(&self.logical_id)
    }

    /// `{"Fn::GetAtt": [<logical id>, <attribute>]}`
    pub fn get_att(&self, attribute: &str) -> Value {
        get_att(&self.logical_id, attribute)
    }
}

/// A single output declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Value")]
    pub value: Value,
    #[serde(rename = "Export", skip_serializing_if = "Option::is_none")]
    pub export: Option<Value>,
}

impl Output {
    pub fn new(id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            description: None,
            value: value.into(),
            export: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Export the output as `<StackName>-<OutputId>`.
    ///
    /// Consuming stacks can import it by relying on the same convention.
    pub fn exported(mut self) -> Self {
        let name = sub(format!("${{AWS::StackName}}-{}", self.id));
        self.export = Some(json!({ "Name": name }));
        self
    }
}

/// A stack-wide tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The assembled template document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Template {
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, Resource>,
    #[serde(rename = "Outputs", skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Output>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a resource under its logical id. A later resource with the same
    /// id replaces the earlier one.
    pub fn add_resource(&mut self, resource: Resource) {
        self.resources.insert(resource.logical_id.clone(), resource);
    }

    /// Attach an output under its id. A later output with the same id replaces
    /// the earlier one.
    pub fn add_output(&mut self, output: Output) {
        self.outputs.insert(output.id.clone(), output);
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    /// Resources of the given CloudFormation type.
    pub fn resources_of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a Resource> {
        self.resources
            .values()
            .filter(move |r| r.resource_type == resource_type)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Render(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Render(e.to_string()))
    }
}

// Intrinsic function helpers

/// `{"Ref": <logical id>}`
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{"Fn::GetAtt": [<logical id>, <attribute>]}`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{"Fn::Sub": <template string>}`
pub fn sub(template: impl Into<String>) -> Value {
    json!({ "Fn::Sub": template.into() })
}

/// `{"Fn::Join": [<delimiter>, [<parts>...]]}`
pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [delimiter, parts] })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket() -> Resource {
        Resource::new("Bucket", "AWS::S3::Bucket").property("BucketName", "logs")
    }

    #[test]
    fn test_resource_intrinsics() {
        let r = bucket();
        assert_eq!(r.reference(), json!({ "Ref": "Bucket" }));
        assert_eq!(r.get_att("Arn"), json!({ "Fn::GetAtt": ["Bucket", "Arn"] }));
        assert_eq!(r.get("BucketName"), Some(&json!("logs")));
    }

    #[test]
    fn test_exported_output() {
        let out = Output::new("BucketArn", bucket().get_att("Arn")).exported();
        assert_eq!(
            out.export,
            Some(json!({ "Name": { "Fn::Sub": "${AWS::StackName}-BucketArn" } }))
        );
    }

    #[test]
    fn test_template_serialization() {
        let mut template = Template::new();
        template.add_resource(bucket());
        template.add_output(Output::new("BucketName", bucket().reference()).description("name"));

        let doc: Value = serde_json::from_str(&template.to_json().unwrap()).unwrap();
        assert_eq!(doc["Resources"]["Bucket"]["Type"], "AWS::S3::Bucket");
        assert_eq!(doc["Resources"]["Bucket"]["Properties"]["BucketName"], "logs");
        assert_eq!(doc["Outputs"]["BucketName"]["Value"], json!({ "Ref": "Bucket" }));
        assert!(doc.get("Description").is_none());

        let yaml = template.to_yaml().unwrap();
        assert!(yaml.contains("Resources:"));
        assert!(yaml.contains("AWS::S3::Bucket"));
    }

    #[test]
    fn test_empty_outputs_are_omitted() {
        let mut template = Template::new();
        template.add_resource(bucket());
        let doc: Value = serde_json::from_str(&template.to_json().unwrap()).unwrap();
        assert!(doc.get("Outputs").is_none());
        assert_eq!(template.resources_of_type("AWS::S3::Bucket").count(), 1);
    }
}
