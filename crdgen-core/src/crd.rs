//! The in-memory CRD document model.
//!
//! A [`CustomResourceDefinition`] here is the mutable aggregate the document
//! builder decorates incrementally; once normalized it serializes to the
//! standard `apiextensions.k8s.io/v1` manifest shape. Optional fields are
//! omitted from output entirely, so decorators can set fields one at a time
//! without leaving placeholder noise in the manifests.

use crate::{resource::Scope, schema::SchemaNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The `apiVersion` of every emitted document.
pub const API_VERSION: &str = "apiextensions.k8s.io/v1";

/// The `kind` of every emitted document.
pub const KIND: &str = "CustomResourceDefinition";

/// One CRD document, keyed externally by its metadata name (the crdName).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomResourceDefinition {
    /// Always [`API_VERSION`]
    pub api_version: String,
    /// Always [`KIND`]
    pub kind: String,
    /// Object metadata; `name` is the group-qualified plural
    pub metadata: ObjectMeta,
    /// The definition body
    pub spec: CrdSpec,
}

impl CustomResourceDefinition {
    /// An empty document for the given crdName
    pub fn new(crd_name: impl Into<String>) -> Self {
        CustomResourceDefinition {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ObjectMeta {
                name: crd_name.into(),
                labels: BTreeMap::new(),
                annotations: BTreeMap::new(),
            },
            spec: CrdSpec::default(),
        }
    }

    /// The version entry with the given name, if present
    pub fn version(&self, name: &str) -> Option<&CrdVersion> {
        self.spec.versions.iter().find(|v| v.name == name)
    }

    /// Mutable access to the version entry with the given name
    pub fn version_mut(&mut self, name: &str) -> Option<&mut CrdVersion> {
        self.spec.versions.iter_mut().find(|v| v.name == name)
    }
}

/// Metadata of the CRD object itself.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    /// The crdName, `<plural>.<group>`
    pub name: String,
    /// Labels on the CRD object
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations on the CRD object
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// The `spec` of a CRD document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrdSpec {
    /// API group
    pub group: String,
    /// Naming information
    pub names: CrdNames,
    /// Resource scope
    pub scope: Scope,
    /// Version entries; normalized documents keep these in priority order
    pub versions: Vec<CrdVersion>,
}

/// The `spec.names` block.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrdNames {
    /// Kind
    pub kind: String,
    /// Plural name
    pub plural: String,
    /// Singular name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub singular: Option<String>,
    /// Short names, in declaration order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub short_names: Vec<String>,
}

/// One schema version of a CRD, exclusively owned by its parent document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrdVersion {
    /// Version name
    pub name: String,
    /// Whether the version is served
    pub served: bool,
    /// Whether the version is the storage version
    pub storage: bool,
    /// Set only for deprecated versions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    /// Warning returned to clients of a deprecated version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation_warning: Option<String>,
    /// Validation schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<CrdValidation>,
    /// Subresource declarations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subresources: Option<Subresources>,
    /// Printer columns; normalized documents keep these sorted by name
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_printer_columns: Vec<PrinterColumn>,
}

impl CrdVersion {
    /// An empty entry for the given version name
    pub fn new(name: impl Into<String>) -> Self {
        CrdVersion {
            name: name.into(),
            ..CrdVersion::default()
        }
    }
}

/// The `schema` block of a version.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrdValidation {
    /// The root structural schema
    #[serde(rename = "openAPIV3Schema", skip_serializing_if = "Option::is_none")]
    pub open_api_v3_schema: Option<SchemaNode>,
}

/// The `subresources` block of a version.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Subresources {
    /// Enables the status subresource; serializes as an empty object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusSubresource>,
    /// Scale subresource paths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleSubresource>,
}

/// The (empty) `subresources.status` marker object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSubresource {}

/// The `subresources.scale` block; paths are filled in one decorator at a time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScaleSubresource {
    /// Path to the desired replica count, e.g. `.spec.replicas`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_replicas_path: Option<String>,
    /// Path to the observed replica count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_replicas_path: Option<String>,
    /// Path to the scale label selector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_selector_path: Option<String>,
}

/// One `additionalPrinterColumns` entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrinterColumn {
    /// Column header
    pub name: String,
    /// Column data type (`string`, `integer`, `number`, `boolean`, `date`)
    #[serde(rename = "type")]
    pub type_: String,
    /// Path to the displayed value
    pub json_path: String,
    /// Column description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Format hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Relative priority; `0` columns show in standard views
    #[serde(skip_serializing_if = "is_default_priority")]
    pub priority: i32,
}

fn is_default_priority(priority: &i32) -> bool {
    *priority == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_document_manifest_shape() {
        let crd = CustomResourceDefinition::new("widgets.example.com");
        let value = serde_json::to_value(&crd).unwrap();
        assert_eq!(
            value,
            json!({
                "apiVersion": "apiextensions.k8s.io/v1",
                "kind": "CustomResourceDefinition",
                "metadata": {"name": "widgets.example.com"},
                "spec": {
                    "group": "",
                    "names": {"kind": "", "plural": ""},
                    "scope": "Cluster",
                    "versions": [],
                },
            })
        );
    }

    #[test]
    fn status_subresource_is_an_empty_object() {
        let sub = Subresources {
            status: Some(StatusSubresource {}),
            scale: None,
        };
        assert_eq!(serde_json::to_value(&sub).unwrap(), json!({"status": {}}));
    }

    #[test]
    fn printer_column_omits_defaults() {
        let col = PrinterColumn {
            name: "REPLICAS".into(),
            type_: "integer".into(),
            json_path: ".spec.replicas".into(),
            ..PrinterColumn::default()
        };
        assert_eq!(
            serde_json::to_value(&col).unwrap(),
            json!({"name": "REPLICAS", "type": "integer", "jsonPath": ".spec.replicas"})
        );
    }

    #[test]
    fn manifest_roundtrip() {
        let mut crd = CustomResourceDefinition::new("widgets.example.com");
        crd.spec.group = "example.com".into();
        crd.spec.versions.push(CrdVersion::new("v1"));
        let json = serde_json::to_string(&crd).unwrap();
        let back: CustomResourceDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, crd);
        assert!(back.version("v1").is_some());
    }
}
