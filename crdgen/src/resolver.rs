//! Schema resolution: from introspected type descriptions to structural schemas.
//!
//! [`SchemaResolver::resolve`] walks one resource's spec/status type graph
//! through the [`TypeIntrospector`] capability and produces the root
//! [`SchemaNode`] attached under `openAPIV3Schema`, collecting marker paths
//! (replica counts, label selector, printer columns) along the way. A
//! per-call cycle guard bounds revisits of named types; known-recursive
//! graphs are broken by registering schema swaps on the [`ResolvingContext`].

use crdgen_core::{
    schema::{SchemaNode, SchemaType},
    typedef::{Marker, PrinterColumnSpec, Property, TypeDef, TypeIntrospector, TypeRef},
    CustomResourceInfo,
};
use std::fmt;
use thiserror::Error;

/// Errors from resolving a resource's type graph.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The type graph could not be mapped to a structural schema.
    #[error("cannot resolve schema for type `{type_name}` at `{path}`: {reason}")]
    SchemaResolution {
        /// The type that failed to resolve
        type_name: String,
        /// Dotted field path where resolution stopped
        path: String,
        /// Why resolution stopped
        reason: String,
    },

    /// More than one field carries a marker that must be unique per resource.
    #[error("expected at most one `{marker}` field, found: {}", .paths.join(", "))]
    MultiplePaths {
        /// The marker that was duplicated
        marker: MarkerKind,
        /// Every path carrying the marker
        paths: Vec<String>,
    },
}

/// The kinds of field marker whose paths can be extracted after resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    /// Desired replica count (unique per resource)
    SpecReplicas,
    /// Observed replica count (unique per resource)
    StatusReplicas,
    /// Scale label selector (unique per resource)
    LabelSelector,
    /// Printer column (any number per resource)
    PrinterColumn,
}

impl MarkerKind {
    fn of(marker: &Marker) -> MarkerKind {
        match marker {
            Marker::SpecReplicas => MarkerKind::SpecReplicas,
            Marker::StatusReplicas => MarkerKind::StatusReplicas,
            Marker::LabelSelector => MarkerKind::LabelSelector,
            Marker::PrinterColumn(_) => MarkerKind::PrinterColumn,
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MarkerKind::SpecReplicas => "spec replicas",
            MarkerKind::StatusReplicas => "status replicas",
            MarkerKind::LabelSelector => "label selector",
            MarkerKind::PrinterColumn => "printer column",
        };
        f.write_str(name)
    }
}

/// A registered substitution breaking a recursive or unsupported type graph.
///
/// The swap applies when resolving `field_name` declared on `original_type`,
/// once `original_type` has already expanded `depth` times on the current
/// resolution path (`depth = 0` applies from the first expansion).
#[derive(Clone, Debug)]
pub struct SchemaSwap {
    /// The type declaring the field to substitute
    pub original_type: String,
    /// The declared field name
    pub field_name: String,
    /// Prior expansions of `original_type` required before the swap applies
    pub depth: usize,
    /// What to substitute
    pub target: SwapTarget,
}

/// What a [`SchemaSwap`] substitutes at the matched field.
#[derive(Clone, Debug)]
pub enum SwapTarget {
    /// Resolve the field as this named type instead
    Type(String),
    /// Drop the field from the schema entirely
    Skip,
}

/// Caller-supplied resolution settings, shared across resources in one run.
pub struct ResolvingContext<'a> {
    introspector: &'a dyn TypeIntrospector,
    swaps: Vec<SchemaSwap>,
    max_revisits: usize,
}

impl<'a> ResolvingContext<'a> {
    /// A context with no swaps and the strict revisit bound of zero
    /// (a named type may not appear twice on one resolution path).
    pub fn new(introspector: &'a dyn TypeIntrospector) -> Self {
        ResolvingContext {
            introspector,
            swaps: Vec::new(),
            max_revisits: 0,
        }
    }

    /// Register a schema swap
    #[must_use]
    pub fn with_swap(mut self, swap: SchemaSwap) -> Self {
        self.swaps.push(swap);
        self
    }

    /// Allow each named type to be revisited up to `bound` times per path
    #[must_use]
    pub fn with_max_revisits(mut self, bound: usize) -> Self {
        self.max_revisits = bound;
        self
    }

    /// The introspector backing this context
    pub fn introspector(&self) -> &dyn TypeIntrospector {
        self.introspector
    }
}

/// A printer column derived from a marked field.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedColumn {
    /// Dotted path to the field, e.g. `.spec.replicas`
    pub path: String,
    /// Column name; defaults to the upper-cased field name
    pub name: String,
    /// Column data type derived from the field's schema
    pub type_: String,
    /// Format hint from the marker
    pub format: Option<String>,
    /// Description from the field's doc text
    pub description: Option<String>,
    /// Relative priority from the marker
    pub priority: i32,
}

#[derive(Clone, Debug)]
struct MarkedPath {
    kind: MarkerKind,
    path: String,
    field_name: String,
    column_type: String,
    doc: Option<String>,
    column: Option<PrinterColumnSpec>,
}

/// The outcome of resolving one resource: a schema tree plus marker paths.
#[derive(Debug)]
pub struct SchemaResolver {
    schema: SchemaNode,
    marked: Vec<MarkedPath>,
}

impl SchemaResolver {
    /// Resolve the spec/status graph of `info` into a root schema.
    ///
    /// The guard state is scoped to this call; contexts can be reused across
    /// resources (and from multiple threads, the context is never mutated).
    pub fn resolve(
        ctx: &ResolvingContext<'_>,
        info: &CustomResourceInfo,
    ) -> Result<Self, ResolveError> {
        let mut walker = Walker {
            ctx,
            stack: Vec::new(),
            path: Vec::new(),
            marked: Vec::new(),
        };
        let mut root = SchemaNode::object();
        for (field, type_name) in [
            ("spec", &info.spec_and_status.spec_type),
            ("status", &info.spec_and_status.status_type),
        ] {
            if let Some(type_name) = type_name {
                walker.path.push(field.to_string());
                let node = walker.resolve_named(type_name)?;
                walker.path.pop();
                root.properties.insert(field.to_string(), node);
            }
        }
        Ok(SchemaResolver {
            schema: root,
            marked: walker.marked,
        })
    }

    /// The resolved root schema
    pub fn schema(&self) -> &SchemaNode {
        &self.schema
    }

    /// The unique path carrying `kind`, if any.
    ///
    /// Fails with [`ResolveError::MultiplePaths`] when several fields claim a
    /// marker that must be unique (replica counts, label selector).
    pub fn single_path(&self, kind: MarkerKind) -> Result<Option<&str>, ResolveError> {
        let mut matches = self.marked.iter().filter(|m| m.kind == kind);
        let first = match matches.next() {
            None => return Ok(None),
            Some(m) => m,
        };
        let rest: Vec<&MarkedPath> = matches.collect();
        if rest.is_empty() {
            return Ok(Some(&first.path));
        }
        let mut paths = vec![first.path.clone()];
        paths.extend(rest.into_iter().map(|m| m.path.clone()));
        Err(ResolveError::MultiplePaths {
            marker: kind,
            paths,
        })
    }

    /// Every printer column discovered during resolution, with defaults
    /// applied (upper-cased field name, doc-derived description).
    pub fn printer_columns(&self) -> Vec<ResolvedColumn> {
        self.marked
            .iter()
            .filter_map(|m| {
                let spec = m.column.as_ref()?;
                let name = match spec.name.as_deref() {
                    Some(name) if !name.is_empty() => name.to_string(),
                    _ => m.field_name.to_uppercase(),
                };
                Some(ResolvedColumn {
                    path: m.path.clone(),
                    name,
                    type_: m.column_type.clone(),
                    format: spec.format.clone(),
                    description: m.doc.as_deref().and_then(doc_description),
                    priority: spec.priority,
                })
            })
            .collect()
    }
}

struct Walker<'a> {
    ctx: &'a ResolvingContext<'a>,
    /// Named types currently expanding, innermost last
    stack: Vec<String>,
    /// Field path segments from the root
    path: Vec<String>,
    marked: Vec<MarkedPath>,
}

impl Walker<'_> {
    fn dotted_path(&self) -> String {
        format!(".{}", self.path.join("."))
    }

    fn resolve_ref(&mut self, type_ref: &TypeRef) -> Result<SchemaNode, ResolveError> {
        Ok(match type_ref {
            TypeRef::String => SchemaNode::string(),
            TypeRef::Integer => SchemaNode::integer(),
            TypeRef::Number => SchemaNode::number(),
            TypeRef::Boolean => SchemaNode::boolean(),
            TypeRef::DateTime => {
                let mut node = SchemaNode::string();
                node.format = Some("date-time".to_string());
                node
            }
            TypeRef::List(item) => SchemaNode::array(self.resolve_ref(item)?),
            TypeRef::Map(values) => SchemaNode::map(self.resolve_ref(values)?),
            TypeRef::Named(name) => self.resolve_named(name)?,
        })
    }

    fn resolve_named(&mut self, name: &str) -> Result<SchemaNode, ResolveError> {
        let def =
            self.ctx
                .introspector
                .find(name)
                .ok_or_else(|| ResolveError::SchemaResolution {
                    type_name: name.to_string(),
                    path: self.dotted_path(),
                    reason: "type is not described by the introspector".to_string(),
                })?;
        match def {
            TypeDef::Enum { values } => Ok(SchemaNode::string_enum(values.clone())),
            TypeDef::Struct { properties } => self.resolve_struct(name, properties),
        }
    }

    fn resolve_struct(
        &mut self,
        name: &str,
        properties: &[Property],
    ) -> Result<SchemaNode, ResolveError> {
        let visits = self.stack.iter().filter(|t| *t == name).count();
        if visits > self.ctx.max_revisits {
            return Err(ResolveError::SchemaResolution {
                type_name: name.to_string(),
                path: self.dotted_path(),
                reason: format!(
                    "cyclic reference, already expanding {visits} time(s) on this path; \
                     register a schema swap to break the cycle"
                ),
            });
        }
        self.stack.push(name.to_string());
        let mut node = SchemaNode::object();
        for property in properties {
            self.path.push(property.name.clone());
            let resolved = self.resolve_property(name, visits, property);
            self.path.pop();
            if let Some(child) = resolved? {
                if property.required {
                    node.required.push(property.name.clone());
                }
                node.properties.insert(property.name.clone(), child);
            }
        }
        self.stack.pop();
        node.required.sort();
        Ok(node)
    }

    /// Resolve one property; `Ok(None)` means a swap dropped the field.
    fn resolve_property(
        &mut self,
        owner: &str,
        prior_expansions: usize,
        property: &Property,
    ) -> Result<Option<SchemaNode>, ResolveError> {
        let swap = self.ctx.swaps.iter().find(|s| {
            s.original_type == owner
                && s.field_name == property.name
                && prior_expansions >= s.depth
        });
        let mut node = match swap.map(|s| &s.target) {
            Some(SwapTarget::Skip) => return Ok(None),
            Some(SwapTarget::Type(target)) => self.resolve_named(target)?,
            None => self.resolve_ref(&property.type_ref)?,
        };
        if node.description.is_none() {
            if let Some(text) = property.doc.as_deref().and_then(doc_description) {
                node.description = Some(text);
            }
        }
        for marker in &property.markers {
            self.marked.push(MarkedPath {
                kind: MarkerKind::of(marker),
                path: self.dotted_path(),
                field_name: property.name.clone(),
                column_type: column_type(&node).to_string(),
                doc: property.doc.clone(),
                column: match marker {
                    Marker::PrinterColumn(spec) => Some(spec.clone()),
                    _ => None,
                },
            });
        }
        Ok(Some(node))
    }
}

/// Printer column data type for a field's resolved schema.
fn column_type(node: &SchemaNode) -> &'static str {
    match node.type_ {
        Some(SchemaType::String) if node.format.as_deref() == Some("date-time") => "date",
        Some(type_) => type_.as_str(),
        None => "string",
    }
}

/// The leading non-annotation doc text: lines starting with `@` are dropped,
/// the rest joined into one description.
fn doc_description(doc: &str) -> Option<String> {
    let text = doc
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('@'))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crdgen_core::{typedef::TypeRegistry, CustomResourceInfo, ResourceDef};
    use serde_json::json;

    fn info(spec: Option<&str>, status: Option<&str>) -> CustomResourceInfo {
        let def = ResourceDef {
            name: "Widget".into(),
            group: "example.com".into(),
            version: "v1".into(),
            spec_type: spec.map(String::from),
            status_type: status.map(String::from),
            ..ResourceDef::default()
        };
        CustomResourceInfo::from_def(&def, &TypeRegistry::new())
    }

    fn widget_registry() -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        reg.register_struct("WidgetSpec", vec![
            Property::new("replicas", TypeRef::Integer)
                .doc("Desired number of replicas.\n@min 0")
                .marker(Marker::SpecReplicas)
                .marker(Marker::PrinterColumn(PrinterColumnSpec::default())),
            Property::new("image", TypeRef::String).required(),
            Property::new("phase", TypeRef::Named("Phase".into())),
            Property::new("tags", TypeRef::List(Box::new(TypeRef::String))),
            Property::new("limits", TypeRef::Map(Box::new(TypeRef::Number))),
        ]);
        reg.register_struct("WidgetStatus", vec![
            Property::new("replicas", TypeRef::Integer).marker(Marker::StatusReplicas),
            Property::new("selector", TypeRef::String).marker(Marker::LabelSelector),
        ]);
        reg.register_enum("Phase", vec!["Pending".into(), "Running".into()]);
        reg
    }

    #[test]
    fn resolves_nested_shapes() {
        let reg = widget_registry();
        let ctx = ResolvingContext::new(&reg);
        let resolved =
            SchemaResolver::resolve(&ctx, &info(Some("WidgetSpec"), Some("WidgetStatus"))).unwrap();
        let schema = serde_json::to_value(resolved.schema()).unwrap();
        assert_eq!(schema["type"], "object");
        let spec = &schema["properties"]["spec"];
        assert_eq!(spec["required"], json!(["image"]));
        assert_eq!(spec["properties"]["replicas"], json!({
            "type": "integer",
            "description": "Desired number of replicas.",
        }));
        assert_eq!(spec["properties"]["phase"]["enum"], json!(["Pending", "Running"]));
        assert_eq!(spec["properties"]["tags"]["items"]["type"], "string");
        assert_eq!(
            spec["properties"]["limits"]["additionalProperties"]["type"],
            "number"
        );
        assert_eq!(schema["properties"]["status"]["properties"]["replicas"]["type"], "integer");
    }

    #[test]
    fn extracts_unique_marker_paths() {
        let reg = widget_registry();
        let ctx = ResolvingContext::new(&reg);
        let resolved =
            SchemaResolver::resolve(&ctx, &info(Some("WidgetSpec"), Some("WidgetStatus"))).unwrap();
        assert_eq!(
            resolved.single_path(MarkerKind::SpecReplicas).unwrap(),
            Some(".spec.replicas")
        );
        assert_eq!(
            resolved.single_path(MarkerKind::StatusReplicas).unwrap(),
            Some(".status.replicas")
        );
        assert_eq!(
            resolved.single_path(MarkerKind::LabelSelector).unwrap(),
            Some(".status.selector")
        );
    }

    #[test]
    fn duplicate_unique_marker_fails() {
        let mut reg = TypeRegistry::new();
        reg.register_struct("DoubleSpec", vec![
            Property::new("replicas", TypeRef::Integer).marker(Marker::SpecReplicas),
            Property::new("instances", TypeRef::Integer).marker(Marker::SpecReplicas),
        ]);
        let ctx = ResolvingContext::new(&reg);
        let resolved = SchemaResolver::resolve(&ctx, &info(Some("DoubleSpec"), None)).unwrap();
        let err = resolved.single_path(MarkerKind::SpecReplicas).unwrap_err();
        match err {
            ResolveError::MultiplePaths { marker, paths } => {
                assert_eq!(marker, MarkerKind::SpecReplicas);
                assert_eq!(paths, vec![".spec.replicas", ".spec.instances"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn printer_column_defaults() {
        let reg = widget_registry();
        let ctx = ResolvingContext::new(&reg);
        let resolved =
            SchemaResolver::resolve(&ctx, &info(Some("WidgetSpec"), None)).unwrap();
        let columns = resolved.printer_columns();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].name, "REPLICAS");
        assert_eq!(columns[0].path, ".spec.replicas");
        assert_eq!(columns[0].type_, "integer");
        assert_eq!(columns[0].description.as_deref(), Some("Desired number of replicas."));
        assert_eq!(columns[0].priority, 0);
    }

    #[test]
    fn unknown_type_is_named_in_error() {
        let reg = TypeRegistry::new();
        let ctx = ResolvingContext::new(&reg);
        let err = SchemaResolver::resolve(&ctx, &info(Some("Ghost"), None)).unwrap_err();
        match err {
            ResolveError::SchemaResolution { type_name, path, .. } => {
                assert_eq!(type_name, "Ghost");
                assert_eq!(path, ".spec");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cycle_is_rejected_with_path() {
        let mut reg = TypeRegistry::new();
        reg.register_struct("Node", vec![
            Property::new("value", TypeRef::String),
            Property::new("next", TypeRef::Named("Node".into())),
        ]);
        let ctx = ResolvingContext::new(&reg);
        let err = SchemaResolver::resolve(&ctx, &info(Some("Node"), None)).unwrap_err();
        match err {
            ResolveError::SchemaResolution { type_name, path, .. } => {
                assert_eq!(type_name, "Node");
                assert_eq!(path, ".spec.next");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn swap_skip_drops_the_field() {
        let mut reg = TypeRegistry::new();
        reg.register_struct("Node", vec![
            Property::new("value", TypeRef::String),
            Property::new("next", TypeRef::Named("Node".into())),
        ]);
        let ctx = ResolvingContext::new(&reg).with_swap(SchemaSwap {
            original_type: "Node".into(),
            field_name: "next".into(),
            depth: 0,
            target: SwapTarget::Skip,
        });
        let resolved = SchemaResolver::resolve(&ctx, &info(Some("Node"), None)).unwrap();
        let schema = serde_json::to_value(resolved.schema()).unwrap();
        assert_eq!(schema["properties"]["spec"]["properties"]["next"], serde_json::Value::Null);
        assert_eq!(schema["properties"]["spec"]["properties"]["value"]["type"], "string");
    }

    #[test]
    fn swap_at_depth_truncates_recursion() {
        let mut reg = TypeRegistry::new();
        reg.register_struct("Node", vec![
            Property::new("value", TypeRef::String),
            Property::new("next", TypeRef::Named("Node".into())),
        ]);
        let ctx = ResolvingContext::new(&reg)
            .with_max_revisits(1)
            .with_swap(SchemaSwap {
                original_type: "Node".into(),
                field_name: "next".into(),
                depth: 1,
                target: SwapTarget::Skip,
            });
        let resolved = SchemaResolver::resolve(&ctx, &info(Some("Node"), None)).unwrap();
        let schema = serde_json::to_value(resolved.schema()).unwrap();
        // one level of nesting survives, the inner node loses `next`
        let outer = &schema["properties"]["spec"]["properties"]["next"];
        assert_eq!(outer["type"], "object");
        assert_eq!(outer["properties"]["next"], serde_json::Value::Null);
    }

    #[test]
    fn swap_to_replacement_type() {
        let mut reg = TypeRegistry::new();
        reg.register_struct("Spec", vec![
            Property::new("raw", TypeRef::Named("ThirdParty".into())),
        ]);
        reg.register_struct("ThirdPartyRef", vec![
            Property::new("name", TypeRef::String),
        ]);
        let ctx = ResolvingContext::new(&reg).with_swap(SchemaSwap {
            original_type: "Spec".into(),
            field_name: "raw".into(),
            depth: 0,
            target: SwapTarget::Type("ThirdPartyRef".into()),
        });
        let resolved = SchemaResolver::resolve(&ctx, &info(Some("Spec"), None)).unwrap();
        let schema = serde_json::to_value(resolved.schema()).unwrap();
        assert_eq!(
            schema["properties"]["spec"]["properties"]["raw"]["properties"]["name"]["type"],
            "string"
        );
    }

    #[test]
    fn doc_description_filters_annotations() {
        assert_eq!(
            doc_description("The replica count.\n@min 0\n@max 10"),
            Some("The replica count.".to_string())
        );
        assert_eq!(doc_description("@internal"), None);
        assert_eq!(doc_description("  "), None);
    }
}
