//! Structural OpenAPI v3 schema tree for CRD validation.
//!
//! A [`SchemaNode`] mirrors the `openAPIV3Schema` subset Kubernetes accepts
//! for structural schemas. Nodes are built once by the resolver per
//! spec/status type and never mutated after being attached to a document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The type tag of a schema node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    /// Object with named properties (or a string-keyed map)
    Object,
    /// Homogeneous array
    Array,
    /// String
    String,
    /// Floating point number
    Number,
    /// Whole number
    Integer,
    /// Boolean
    Boolean,
}

impl SchemaType {
    /// Manifest spelling of the type tag
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Object => "object",
            SchemaType::Array => "array",
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Boolean => "boolean",
        }
    }
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of a structural schema.
///
/// Acyclic by construction: the resolver's cycle guard truncates or rejects
/// self-referential type graphs before a node can reference an ancestor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaNode {
    /// The `type` keyword
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<SchemaType>,
    /// Human-readable description, taken from the field's doc text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// OpenAPI format hint (`date-time`, `int64`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Allowed values for closed string enumerations
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    /// Named properties of an object node
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaNode>,
    /// Names of mandatory properties, kept sorted
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Element schema of an array node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,
    /// Value schema of a map node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<SchemaNode>>,
}

impl SchemaNode {
    fn typed(type_: SchemaType) -> Self {
        SchemaNode {
            type_: Some(type_),
            ..SchemaNode::default()
        }
    }

    /// A plain string node
    pub fn string() -> Self {
        Self::typed(SchemaType::String)
    }

    /// An integer node
    pub fn integer() -> Self {
        Self::typed(SchemaType::Integer)
    }

    /// A floating point node
    pub fn number() -> Self {
        Self::typed(SchemaType::Number)
    }

    /// A boolean node
    pub fn boolean() -> Self {
        Self::typed(SchemaType::Boolean)
    }

    /// An object node with no properties yet
    pub fn object() -> Self {
        Self::typed(SchemaType::Object)
    }

    /// An array node with the given element schema
    pub fn array(items: SchemaNode) -> Self {
        SchemaNode {
            items: Some(Box::new(items)),
            ..Self::typed(SchemaType::Array)
        }
    }

    /// A string-keyed map node with the given value schema
    pub fn map(values: SchemaNode) -> Self {
        SchemaNode {
            additional_properties: Some(Box::new(values)),
            ..Self::typed(SchemaType::Object)
        }
    }

    /// A string node restricted to the given values
    pub fn string_enum(values: Vec<String>) -> Self {
        SchemaNode {
            enum_values: values,
            ..Self::typed(SchemaType::String)
        }
    }

    /// Attach a description, ignoring empty text
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        if !description.is_empty() {
            self.description = Some(description);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collections_are_omitted() {
        let node = SchemaNode::string();
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json, serde_json::json!({"type": "string"}));
    }

    #[test]
    fn nested_object_shape() {
        let mut spec = SchemaNode::object();
        spec.properties.insert("replicas".into(), SchemaNode::integer());
        spec.properties
            .insert("hosts".into(), SchemaNode::array(SchemaNode::string()));
        spec.required.push("replicas".into());

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "object",
                "properties": {
                    "hosts": {"type": "array", "items": {"type": "string"}},
                    "replicas": {"type": "integer"},
                },
                "required": ["replicas"],
            })
        );
    }

    #[test]
    fn enum_serializes_under_enum_keyword() {
        let node = SchemaNode::string_enum(vec!["Pending".into(), "Running".into()]);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["enum"], serde_json::json!(["Pending", "Running"]));
    }
}
