//! Resource-level metadata extraction.
//!
//! Turns the raw, annotation-level description of one resource class (one
//! Kind at one API version) into the canonical [`CustomResourceInfo`] the
//! document builder consumes. Extraction is a pure transformation and fails
//! softly: absent optional annotations default instead of erroring.

use crate::typedef::{TypeIntrospector, TypeRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether instances of a resource live in a namespace or at cluster level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    /// Instances are namespaced
    Namespaced,
    /// Instances are cluster-wide
    #[default]
    Cluster,
}

impl Scope {
    /// The `spec.scope` manifest value
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Namespaced => "Namespaced",
            Scope::Cluster => "Cluster",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw description of a scanned resource class, before defaulting.
///
/// `spec_type`/`status_type` carry the resource's generic Spec/Status
/// parameterization where it could be resolved; `None` means the parameter
/// was raw or unobtainable.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResourceDef {
    /// Name of the root resource type (used for the property-scan fallback)
    pub name: String,
    /// API group
    pub group: String,
    /// API version name, e.g. `v1beta1`
    pub version: String,
    /// Kind override; defaults to the last segment of `name`
    pub kind: Option<String>,
    /// Singular name override; defaults to the lowercased kind
    pub singular: Option<String>,
    /// Plural name override; defaults to pluralizing the singular
    pub plural: Option<String>,
    /// Declared short names, in declaration order
    pub short_names: Vec<String>,
    /// Scope; defaults to cluster-wide
    pub scope: Option<Scope>,
    /// Whether this version is served; defaults to `true`
    pub served: Option<bool>,
    /// Whether this version is the storage version; defaults to `true`
    pub storage: Option<bool>,
    /// Whether this version is deprecated
    pub deprecated: bool,
    /// Warning returned to clients of a deprecated version
    pub deprecation_warning: Option<String>,
    /// Labels for the CRD object
    pub labels: BTreeMap<String, String>,
    /// Annotations for the CRD object
    pub annotations: BTreeMap<String, String>,
    /// Resolved Spec type parameter, if reliable
    pub spec_type: Option<String>,
    /// Resolved Status type parameter, if reliable
    pub status_type: Option<String>,
}

/// The resource's spec/status type association.
///
/// `unreliable` is set whenever either generic parameter could not be
/// resolved; in that case the names are recovered (best effort) by scanning
/// the root type's declared `spec`/`status` properties instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecAndStatus {
    /// Name of the spec type, if known
    pub spec_type: Option<String>,
    /// Name of the status type, if known
    pub status_type: Option<String>,
    /// Whether generic-parameter inspection was insufficient
    pub unreliable: bool,
}

/// Canonical metadata for one (Kind, API version) pair.
///
/// Immutable once constructed; consumed by the document builder. Instances
/// sharing a `crd_name` but differing in `version` aggregate into one CRD.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomResourceInfo {
    /// Group-qualified plural name, the join key across versions
    pub crd_name: String,
    /// API group
    pub group: String,
    /// API version name
    pub version: String,
    /// Kind
    pub kind: String,
    /// Resource scope
    pub scope: Scope,
    /// Plural name
    pub plural: String,
    /// Singular name
    pub singular: String,
    /// Short names, in declaration order
    pub short_names: Vec<String>,
    /// Whether this version is served
    pub served: bool,
    /// Whether this version is the storage version
    pub storage: bool,
    /// Whether this version is deprecated
    pub deprecated: bool,
    /// Deprecation warning, emitted only for deprecated versions
    pub deprecation_warning: Option<String>,
    /// CRD object labels
    pub labels: BTreeMap<String, String>,
    /// CRD object annotations
    pub annotations: BTreeMap<String, String>,
    /// Spec/status type association
    pub spec_and_status: SpecAndStatus,
}

impl CustomResourceInfo {
    /// Extract canonical info from a raw definition, applying defaults.
    pub fn from_def(def: &ResourceDef, introspector: &dyn TypeIntrospector) -> Self {
        let kind = def
            .kind
            .clone()
            .unwrap_or_else(|| def.name.rsplit("::").next().unwrap_or(&def.name).to_string());
        let singular = def.singular.clone().unwrap_or_else(|| kind.to_ascii_lowercase());
        let plural = def.plural.clone().unwrap_or_else(|| to_plural(&singular));
        CustomResourceInfo {
            crd_name: format!("{}.{}", plural, def.group),
            group: def.group.clone(),
            version: def.version.clone(),
            kind,
            scope: def.scope.unwrap_or_default(),
            plural,
            singular,
            short_names: def.short_names.clone(),
            served: def.served.unwrap_or(true),
            storage: def.storage.unwrap_or(true),
            deprecated: def.deprecated,
            deprecation_warning: def.deprecation_warning.clone(),
            labels: def.labels.clone(),
            annotations: def.annotations.clone(),
            spec_and_status: resolve_spec_and_status(def, introspector),
        }
    }
}

/// Resolve the spec/status type names for a resource.
///
/// Prefers the declared generic parameterization; when either side is
/// unobtainable the pair is marked unreliable and the root type's declared
/// properties named `spec`/`status` are scanned instead.
pub fn resolve_spec_and_status(
    def: &ResourceDef,
    introspector: &dyn TypeIntrospector,
) -> SpecAndStatus {
    let unreliable = def.spec_type.is_none() || def.status_type.is_none();
    let mut spec_type = def.spec_type.clone();
    let mut status_type = def.status_type.clone();
    if unreliable {
        if let Some(props) = introspector.properties(&def.name) {
            for p in props {
                if let TypeRef::Named(type_name) = &p.type_ref {
                    match p.name.as_str() {
                        "spec" if spec_type.is_none() => spec_type = Some(type_name.clone()),
                        "status" if status_type.is_none() => status_type = Some(type_name.clone()),
                        _ => {}
                    }
                }
            }
        }
    }
    SpecAndStatus {
        spec_type,
        status_type,
        unreliable,
    }
}

/// Simple pluralizer for singular resource names.
pub fn to_plural(word: &str) -> String {
    // Words ending in s, x, z, ch, sh are pluralized with -es (eg. foxes).
    if word.ends_with('s')
        || word.ends_with('x')
        || word.ends_with('z')
        || word.ends_with("ch")
        || word.ends_with("sh")
    {
        return format!("{word}es");
    }

    // Words ending in y preceded by a consonant get -ies (eg. policies).
    if word.ends_with('y') {
        if let Some(c) = word.chars().nth(word.len() - 2) {
            if !matches!(c, 'a' | 'e' | 'i' | 'o' | 'u') {
                let mut chars = word.chars();
                chars.next_back();
                return format!("{}ies", chars.as_str());
            }
        }
    }

    format!("{word}s")
}
