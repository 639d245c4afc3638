//! The decorator-driven document builder.
//!
//! A [`Resources`] accumulator holds one [`CustomResourceDefinition`] per
//! crdName and mutates it through small, idempotent [`Decorator`] steps.
//! Decorators targeting different versions commute, so resources of the
//! same Kind can be added in any order and still produce byte-identical
//! manifests once normalized and deterministically serialized.

use crdgen_core::{
    crd::{
        CrdValidation, CrdVersion, CustomResourceDefinition, PrinterColumn, ScaleSubresource,
        StatusSubresource, Subresources,
    },
    resource::Scope,
    schema::SchemaNode,
    Version,
};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from applying decorators or normalizing documents.
#[derive(Debug, Error)]
pub enum DecorateError {
    /// Two versions of one resource disagree on a shared, whole-resource field.
    #[error("conflicting values for `{field}` of `{crd_name}`: `{existing}` vs `{incoming}`")]
    Conflict {
        /// The affected document
        crd_name: String,
        /// The shared field that disagreed
        field: &'static str,
        /// The value already recorded
        existing: String,
        /// The rejected incoming value
        incoming: String,
    },

    /// A document ended up with more than one storage version.
    #[error("`{crd_name}` declares multiple storage versions: {}", .versions.join(", "))]
    MultipleStorageVersions {
        /// The affected document
        crd_name: String,
        /// Every version flagged as storage
        versions: Vec<String>,
    },

    /// A document ended up with no storage version at all.
    #[error("`{crd_name}` declares no storage version")]
    NoStorageVersion {
        /// The affected document
        crd_name: String,
    },

    /// A scale path decorator ran before the subresources block existed.
    #[error("subresources of `{crd_name}/{version}` are not initialized")]
    SubresourcesNotInitialized {
        /// The affected document
        crd_name: String,
        /// The affected version
        version: String,
    },
}

/// One mutation step against a single CRD document.
///
/// Every variant names its target document (`crd_name`) and, where it edits
/// one version entry, the target `version`. Applying the same decorator
/// twice leaves the document unchanged.
#[derive(Clone, Debug)]
pub enum Decorator {
    /// Establish (or verify) the whole-resource fields of a document.
    AddResource {
        /// Target document
        crd_name: String,
        /// API group
        group: String,
        /// Kind
        kind: String,
        /// Resource scope
        scope: Scope,
        /// Plural name
        plural: String,
        /// Singular name
        singular: Option<String>,
        /// Short names
        short_names: Vec<String>,
        /// CRD object labels
        labels: BTreeMap<String, String>,
        /// CRD object annotations
        annotations: BTreeMap<String, String>,
    },
    /// Ensure a version entry exists (initially unserved, non-storage).
    AddVersion {
        /// Target document
        crd_name: String,
        /// Version name
        version: String,
    },
    /// Attach the validation schema of a version.
    AddSchema {
        /// Target document
        crd_name: String,
        /// Target version
        version: String,
        /// Root structural schema
        schema: SchemaNode,
    },
    /// Ensure the subresources block of a version exists.
    AddSubresources {
        /// Target document
        crd_name: String,
        /// Target version
        version: String,
    },
    /// Enable the status subresource of a version.
    AddStatusSubresource {
        /// Target document
        crd_name: String,
        /// Target version
        version: String,
    },
    /// Record the scale subresource's desired-replicas path.
    AddSpecReplicasPath {
        /// Target document
        crd_name: String,
        /// Target version
        version: String,
        /// Dotted path
        path: String,
    },
    /// Record the scale subresource's observed-replicas path.
    AddStatusReplicasPath {
        /// Target document
        crd_name: String,
        /// Target version
        version: String,
        /// Dotted path
        path: String,
    },
    /// Record the scale subresource's label selector path.
    AddLabelSelectorPath {
        /// Target document
        crd_name: String,
        /// Target version
        version: String,
        /// Dotted path
        path: String,
    },
    /// Append a printer column to a version, skipping exact duplicates.
    AddPrinterColumn {
        /// Target document
        crd_name: String,
        /// Target version
        version: String,
        /// The column to add
        column: PrinterColumn,
    },
    /// Set the served flag of a version.
    SetServed {
        /// Target document
        crd_name: String,
        /// Target version
        version: String,
        /// Flag value
        served: bool,
    },
    /// Set the storage flag of a version.
    SetStorage {
        /// Target document
        crd_name: String,
        /// Target version
        version: String,
        /// Flag value
        storage: bool,
    },
    /// Mark a version deprecated, with an optional client-facing warning.
    SetDeprecated {
        /// Target document
        crd_name: String,
        /// Target version
        version: String,
        /// Warning returned to clients
        warning: Option<String>,
    },
    /// Verify exactly one version of a document is the storage version.
    EnsureSingleStorageVersion {
        /// Target document
        crd_name: String,
    },
    /// Sort a document's versions by descending Kubernetes version priority.
    SortVersions {
        /// Target document
        crd_name: String,
    },
    /// Sort a version's printer columns by column name.
    SortPrinterColumns {
        /// Target document
        crd_name: String,
        /// Target version
        version: String,
    },
}

impl Decorator {
    /// The crdName of the document this decorator targets
    pub fn crd_name(&self) -> &str {
        match self {
            Decorator::AddResource { crd_name, .. }
            | Decorator::AddVersion { crd_name, .. }
            | Decorator::AddSchema { crd_name, .. }
            | Decorator::AddSubresources { crd_name, .. }
            | Decorator::AddStatusSubresource { crd_name, .. }
            | Decorator::AddSpecReplicasPath { crd_name, .. }
            | Decorator::AddStatusReplicasPath { crd_name, .. }
            | Decorator::AddLabelSelectorPath { crd_name, .. }
            | Decorator::AddPrinterColumn { crd_name, .. }
            | Decorator::SetServed { crd_name, .. }
            | Decorator::SetStorage { crd_name, .. }
            | Decorator::SetDeprecated { crd_name, .. }
            | Decorator::EnsureSingleStorageVersion { crd_name }
            | Decorator::SortVersions { crd_name }
            | Decorator::SortPrinterColumns { crd_name, .. } => crd_name,
        }
    }
}

/// A failed document, reported alongside the ones that generated cleanly.
#[derive(Debug)]
pub struct GenerateFailure {
    /// The document that failed
    pub crd_name: String,
    /// Why it failed
    pub error: DecorateError,
}

/// The outcome of a generation run.
#[derive(Debug)]
pub struct Generated {
    /// Normalized documents, in crdName order
    pub documents: Vec<CustomResourceDefinition>,
    /// Documents dropped during normalization
    pub failures: Vec<GenerateFailure>,
}

/// The accumulator of in-progress CRD documents.
#[derive(Debug, Default)]
pub struct Resources {
    documents: BTreeMap<String, CustomResourceDefinition>,
}

impl Resources {
    /// An empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the document with the given crdName, if present
    pub fn remove(&mut self, crd_name: &str) -> Option<CustomResourceDefinition> {
        self.documents.remove(crd_name)
    }

    /// The in-progress document with the given crdName
    pub fn get(&self, crd_name: &str) -> Option<&CustomResourceDefinition> {
        self.documents.get(crd_name)
    }

    /// Apply one decorator, creating its target document on first reference.
    pub fn decorate(&mut self, decorator: Decorator) -> Result<(), DecorateError> {
        let crd_name = decorator.crd_name().to_string();
        let doc = self
            .documents
            .entry(crd_name.clone())
            .or_insert_with(|| CustomResourceDefinition::new(&crd_name));
        match decorator {
            Decorator::AddResource {
                group,
                kind,
                scope,
                plural,
                singular,
                short_names,
                labels,
                annotations,
                ..
            } => {
                // kind is only ever set here, so an empty kind means this is
                // the first AddResource and scope can be taken as-is
                if doc.spec.names.kind.is_empty() {
                    doc.spec.scope = scope;
                } else if doc.spec.scope != scope {
                    return Err(DecorateError::Conflict {
                        crd_name,
                        field: "scope",
                        existing: doc.spec.scope.to_string(),
                        incoming: scope.to_string(),
                    });
                }
                check_field(&crd_name, "group", &mut doc.spec.group, group)?;
                check_field(&crd_name, "kind", &mut doc.spec.names.kind, kind)?;
                check_field(&crd_name, "plural", &mut doc.spec.names.plural, plural)?;
                if let Some(singular) = singular {
                    match &doc.spec.names.singular {
                        None => doc.spec.names.singular = Some(singular),
                        Some(existing) if *existing != singular => {
                            return Err(DecorateError::Conflict {
                                crd_name,
                                field: "singular",
                                existing: existing.clone(),
                                incoming: singular,
                            });
                        }
                        Some(_) => {}
                    }
                }
                for name in short_names {
                    if !doc.spec.names.short_names.contains(&name) {
                        doc.spec.names.short_names.push(name);
                    }
                }
                doc.metadata.labels.extend(labels);
                doc.metadata.annotations.extend(annotations);
                Ok(())
            }
            Decorator::AddVersion { version, .. } => {
                ensure_version(doc, &version);
                Ok(())
            }
            Decorator::AddSchema {
                version, schema, ..
            } => {
                ensure_version(doc, &version).schema = Some(CrdValidation {
                    open_api_v3_schema: Some(schema),
                });
                Ok(())
            }
            Decorator::AddSubresources { version, .. } => {
                let entry = ensure_version(doc, &version);
                if entry.subresources.is_none() {
                    entry.subresources = Some(Subresources::default());
                }
                Ok(())
            }
            Decorator::AddStatusSubresource { version, .. } => {
                subresources(doc, &crd_name, &version)?.status = Some(StatusSubresource {});
                Ok(())
            }
            Decorator::AddSpecReplicasPath { version, path, .. } => {
                scale(doc, &crd_name, &version)?.spec_replicas_path = Some(path);
                Ok(())
            }
            Decorator::AddStatusReplicasPath { version, path, .. } => {
                scale(doc, &crd_name, &version)?.status_replicas_path = Some(path);
                Ok(())
            }
            Decorator::AddLabelSelectorPath { version, path, .. } => {
                scale(doc, &crd_name, &version)?.label_selector_path = Some(path);
                Ok(())
            }
            Decorator::AddPrinterColumn {
                version, column, ..
            } => {
                let entry = ensure_version(doc, &version);
                if !entry.additional_printer_columns.contains(&column) {
                    entry.additional_printer_columns.push(column);
                }
                Ok(())
            }
            Decorator::SetServed {
                version, served, ..
            } => {
                ensure_version(doc, &version).served = served;
                Ok(())
            }
            Decorator::SetStorage {
                version, storage, ..
            } => {
                ensure_version(doc, &version).storage = storage;
                Ok(())
            }
            Decorator::SetDeprecated {
                version, warning, ..
            } => {
                let entry = ensure_version(doc, &version);
                entry.deprecated = Some(true);
                entry.deprecation_warning = warning;
                Ok(())
            }
            Decorator::EnsureSingleStorageVersion { .. } => {
                ensure_single_storage(doc)
            }
            Decorator::SortVersions { .. } => {
                sort_versions(doc);
                Ok(())
            }
            Decorator::SortPrinterColumns { version, .. } => {
                ensure_version(doc, &version)
                    .additional_printer_columns
                    .sort_by(|a, b| a.name.cmp(&b.name));
                Ok(())
            }
        }
    }

    /// Normalize every document and take the results.
    ///
    /// Each document independently gets its storage invariant checked and its
    /// versions and printer columns sorted; documents that fail are reported
    /// instead of emitted, without affecting their siblings.
    pub fn generate(self) -> Generated {
        let mut documents = Vec::new();
        let mut failures = Vec::new();
        for (crd_name, mut doc) in self.documents {
            if let Err(error) = ensure_single_storage(&doc) {
                tracing::warn!(%crd_name, %error, "dropping customresourcedefinition");
                failures.push(GenerateFailure { crd_name, error });
                continue;
            }
            sort_versions(&mut doc);
            for version in &mut doc.spec.versions {
                version
                    .additional_printer_columns
                    .sort_by(|a, b| a.name.cmp(&b.name));
            }
            documents.push(doc);
        }
        Generated {
            documents,
            failures,
        }
    }
}

/// Set a shared string field, or fail if it already holds a different value.
fn check_field(
    crd_name: &str,
    field: &'static str,
    slot: &mut String,
    incoming: String,
) -> Result<(), DecorateError> {
    if slot.is_empty() {
        *slot = incoming;
        return Ok(());
    }
    if *slot != incoming {
        return Err(DecorateError::Conflict {
            crd_name: crd_name.to_string(),
            field,
            existing: slot.clone(),
            incoming,
        });
    }
    Ok(())
}

fn ensure_version<'a>(doc: &'a mut CustomResourceDefinition, version: &str) -> &'a mut CrdVersion {
    if doc.version(version).is_none() {
        doc.spec.versions.push(CrdVersion::new(version));
    }
    // the entry exists now
    let idx = doc
        .spec
        .versions
        .iter()
        .position(|v| v.name == version)
        .unwrap_or(doc.spec.versions.len() - 1);
    &mut doc.spec.versions[idx]
}

fn subresources<'a>(
    doc: &'a mut CustomResourceDefinition,
    crd_name: &str,
    version: &str,
) -> Result<&'a mut Subresources, DecorateError> {
    ensure_version(doc, version)
        .subresources
        .as_mut()
        .ok_or_else(|| DecorateError::SubresourcesNotInitialized {
            crd_name: crd_name.to_string(),
            version: version.to_string(),
        })
}

fn scale<'a>(
    doc: &'a mut CustomResourceDefinition,
    crd_name: &str,
    version: &str,
) -> Result<&'a mut ScaleSubresource, DecorateError> {
    let sub = subresources(doc, crd_name, version)?;
    Ok(sub.scale.get_or_insert_with(ScaleSubresource::default))
}

fn ensure_single_storage(doc: &CustomResourceDefinition) -> Result<(), DecorateError> {
    let storage: Vec<&CrdVersion> = doc.spec.versions.iter().filter(|v| v.storage).collect();
    match storage.len() {
        1 => Ok(()),
        0 => Err(DecorateError::NoStorageVersion {
            crd_name: doc.metadata.name.clone(),
        }),
        _ => Err(DecorateError::MultipleStorageVersions {
            crd_name: doc.metadata.name.clone(),
            versions: storage.iter().map(|v| v.name.clone()).collect(),
        }),
    }
}

fn sort_versions(doc: &mut CustomResourceDefinition) {
    doc.spec
        .versions
        .sort_by_cached_key(|v| Reverse(Version::parse(&v.name)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_resource(crd_name: &str, kind: &str, scope: Scope) -> Decorator {
        Decorator::AddResource {
            crd_name: crd_name.into(),
            group: "example.com".into(),
            kind: kind.into(),
            scope,
            plural: "widgets".into(),
            singular: Some("widget".into()),
            short_names: vec!["wd".into()],
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }

    #[test]
    fn lazily_creates_documents_and_versions() {
        let mut res = Resources::new();
        res.decorate(Decorator::SetServed {
            crd_name: "widgets.example.com".into(),
            version: "v1".into(),
            served: true,
        })
        .unwrap();
        let doc = res.get("widgets.example.com").unwrap();
        let v1 = doc.version("v1").unwrap();
        assert!(v1.served);
        assert!(!v1.storage);
    }

    #[test]
    fn add_resource_is_idempotent() {
        let mut res = Resources::new();
        res.decorate(add_resource("widgets.example.com", "Widget", Scope::Namespaced))
            .unwrap();
        res.decorate(add_resource("widgets.example.com", "Widget", Scope::Namespaced))
            .unwrap();
        let doc = res.get("widgets.example.com").unwrap();
        assert_eq!(doc.spec.names.short_names, vec!["wd".to_string()]);
        assert_eq!(doc.spec.group, "example.com");
        assert_eq!(doc.spec.scope, Scope::Namespaced);
    }

    #[test]
    fn conflicting_kind_is_rejected() {
        let mut res = Resources::new();
        res.decorate(add_resource("widgets.example.com", "Widget", Scope::Namespaced))
            .unwrap();
        let err = res
            .decorate(add_resource("widgets.example.com", "Gadget", Scope::Namespaced))
            .unwrap_err();
        match err {
            DecorateError::Conflict { field, existing, incoming, .. } => {
                assert_eq!(field, "kind");
                assert_eq!(existing, "Widget");
                assert_eq!(incoming, "Gadget");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn conflicting_singular_is_rejected() {
        let mut res = Resources::new();
        res.decorate(add_resource("widgets.example.com", "Widget", Scope::Namespaced))
            .unwrap();
        let err = res
            .decorate(Decorator::AddResource {
                crd_name: "widgets.example.com".into(),
                group: "example.com".into(),
                kind: "Widget".into(),
                scope: Scope::Namespaced,
                plural: "widgets".into(),
                singular: Some("gizmo".into()),
                short_names: Vec::new(),
                labels: BTreeMap::new(),
                annotations: BTreeMap::new(),
            })
            .unwrap_err();
        match err {
            DecorateError::Conflict { field, existing, incoming, .. } => {
                assert_eq!(field, "singular");
                assert_eq!(existing, "widget");
                assert_eq!(incoming, "gizmo");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn conflicting_scope_is_rejected() {
        let mut res = Resources::new();
        res.decorate(add_resource("widgets.example.com", "Widget", Scope::Namespaced))
            .unwrap();
        let err = res
            .decorate(add_resource("widgets.example.com", "Widget", Scope::Cluster))
            .unwrap_err();
        assert!(matches!(err, DecorateError::Conflict { field: "scope", .. }));
    }

    #[test]
    fn scale_paths_require_subresources_block() {
        let mut res = Resources::new();
        let err = res
            .decorate(Decorator::AddSpecReplicasPath {
                crd_name: "widgets.example.com".into(),
                version: "v1".into(),
                path: ".spec.replicas".into(),
            })
            .unwrap_err();
        assert!(matches!(err, DecorateError::SubresourcesNotInitialized { .. }));

        res.decorate(Decorator::AddSubresources {
            crd_name: "widgets.example.com".into(),
            version: "v1".into(),
        })
        .unwrap();
        res.decorate(Decorator::AddSpecReplicasPath {
            crd_name: "widgets.example.com".into(),
            version: "v1".into(),
            path: ".spec.replicas".into(),
        })
        .unwrap();
        let doc = res.get("widgets.example.com").unwrap();
        let scale = doc.version("v1").unwrap().subresources.as_ref().unwrap().scale.as_ref().unwrap();
        assert_eq!(scale.spec_replicas_path.as_deref(), Some(".spec.replicas"));
    }

    #[test]
    fn duplicate_printer_columns_collapse() {
        let column = PrinterColumn {
            name: "REPLICAS".into(),
            type_: "integer".into(),
            json_path: ".spec.replicas".into(),
            ..PrinterColumn::default()
        };
        let mut res = Resources::new();
        for _ in 0..2 {
            res.decorate(Decorator::AddPrinterColumn {
                crd_name: "widgets.example.com".into(),
                version: "v1".into(),
                column: column.clone(),
            })
            .unwrap();
        }
        let doc = res.get("widgets.example.com").unwrap();
        assert_eq!(doc.version("v1").unwrap().additional_printer_columns.len(), 1);
    }

    #[test]
    fn versions_sort_by_priority() {
        let mut res = Resources::new();
        for version in ["v1beta1", "v2", "v1", "v10"] {
            res.decorate(Decorator::AddVersion {
                crd_name: "widgets.example.com".into(),
                version: version.into(),
            })
            .unwrap();
        }
        res.decorate(Decorator::SortVersions {
            crd_name: "widgets.example.com".into(),
        })
        .unwrap();
        let names: Vec<&str> = res
            .get("widgets.example.com")
            .unwrap()
            .spec
            .versions
            .iter()
            .map(|v| v.name.as_str())
            .collect();
        assert_eq!(names, vec!["v10", "v2", "v1", "v1beta1"]);
    }

    #[test]
    fn multiple_storage_versions_fail_generation() {
        let mut res = Resources::new();
        for version in ["v1", "v2"] {
            res.decorate(Decorator::SetStorage {
                crd_name: "widgets.example.com".into(),
                version: version.into(),
                storage: true,
            })
            .unwrap();
        }
        let generated = res.generate();
        assert!(generated.documents.is_empty());
        assert_eq!(generated.failures.len(), 1);
        assert!(matches!(
            generated.failures[0].error,
            DecorateError::MultipleStorageVersions { .. }
        ));
    }

    #[test]
    fn zero_storage_versions_fail_generation() {
        let mut res = Resources::new();
        res.decorate(Decorator::AddVersion {
            crd_name: "widgets.example.com".into(),
            version: "v1".into(),
        })
        .unwrap();
        let generated = res.generate();
        assert!(generated.documents.is_empty());
        assert!(matches!(
            generated.failures[0].error,
            DecorateError::NoStorageVersion { .. }
        ));
    }

    #[test]
    fn failed_document_does_not_poison_siblings() {
        let mut res = Resources::new();
        res.decorate(Decorator::SetStorage {
            crd_name: "widgets.example.com".into(),
            version: "v1".into(),
            storage: true,
        })
        .unwrap();
        // gadgets never gets a storage version
        res.decorate(Decorator::AddVersion {
            crd_name: "gadgets.example.com".into(),
            version: "v1".into(),
        })
        .unwrap();
        let generated = res.generate();
        assert_eq!(generated.documents.len(), 1);
        assert_eq!(generated.documents[0].metadata.name, "widgets.example.com");
        assert_eq!(generated.failures.len(), 1);
        assert_eq!(generated.failures[0].crd_name, "gadgets.example.com");
    }

    #[test]
    fn generation_normalizes_order() {
        let mut res = Resources::new();
        for (version, storage) in [("v1beta1", false), ("v1", true)] {
            res.decorate(Decorator::SetStorage {
                crd_name: "widgets.example.com".into(),
                version: version.into(),
                storage,
            })
            .unwrap();
        }
        let generated = res.generate();
        let names: Vec<&str> = generated.documents[0]
            .spec
            .versions
            .iter()
            .map(|v| v.name.as_str())
            .collect();
        assert_eq!(names, vec!["v1", "v1beta1"]);
    }
}
