//! Data model describing resource types to the schema resolver.
//!
//! Rust has no runtime reflection, so the pipeline consumes explicit type
//! descriptions instead of inspecting live types. A [`TypeRegistry`] is
//! usually populated by build-time tooling (or deserialized from a data
//! file, all types here are serde-friendly), and handed to the resolver
//! through the [`TypeIntrospector`] capability.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The shape of a property's type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TypeRef {
    /// Plain string
    String,
    /// Whole number, schema type `integer`
    Integer,
    /// Floating point, schema type `number`
    Number,
    /// Boolean
    Boolean,
    /// RFC 3339 timestamp, schema type `string` with `date-time` format
    DateTime,
    /// Homogeneous array
    List(Box<TypeRef>),
    /// String-keyed map
    Map(Box<TypeRef>),
    /// A named type the introspector can describe
    Named(String),
}

/// Parameters of a printer-column marker.
///
/// `name` defaults to the upper-cased field name when not given, and
/// `description` defaults to the field's doc text.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PrinterColumnSpec {
    /// Column name override
    pub name: Option<String>,
    /// OpenAPI format hint (`date`, `int64`, ...)
    pub format: Option<String>,
    /// Relative column priority; `0` columns show in standard views
    pub priority: i32,
}

/// A field-level annotation relevant to CRD generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Marker {
    /// The field holding the desired replica count (scale subresource)
    SpecReplicas,
    /// The field holding the observed replica count (scale subresource)
    StatusReplicas,
    /// The field holding the scale label selector
    LabelSelector,
    /// Surface the field as a `kubectl get` column
    PrinterColumn(PrinterColumnSpec),
}

/// One visible, serializable property of a struct type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Serialized field name
    pub name: String,
    /// The field's type
    pub type_ref: TypeRef,
    /// Whether the field is mandatory in the schema
    pub required: bool,
    /// Leading documentation text, used for schema and column descriptions
    pub doc: Option<String>,
    /// CRD generation markers on this field
    pub markers: Vec<Marker>,
}

impl Property {
    /// A plain optional property with no doc and no markers
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Property {
            name: name.into(),
            type_ref,
            required: false,
            doc: None,
            markers: Vec::new(),
        }
    }

    /// Mark the property as required
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach documentation text
    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Attach a generation marker
    #[must_use]
    pub fn marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }
}

/// A described named type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TypeDef {
    /// An object with declared properties
    Struct {
        /// The type's visible, serializable properties
        properties: Vec<Property>,
    },
    /// A closed string enumeration
    Enum {
        /// The allowed values
        values: Vec<String>,
    },
}

/// Capability for looking up type descriptions by name.
///
/// This is the seam between the pipeline and whatever produced the type
/// information; the in-memory [`TypeRegistry`] is the stock implementation.
pub trait TypeIntrospector {
    /// Look up a named type
    fn find(&self, type_name: &str) -> Option<&TypeDef>;

    /// The declared properties of a named struct type, if it is one
    fn properties(&self, type_name: &str) -> Option<&[Property]> {
        match self.find(type_name) {
            Some(TypeDef::Struct { properties }) => Some(properties),
            _ => None,
        }
    }
}

/// In-memory name to [`TypeDef`] mapping.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TypeRegistry {
    types: BTreeMap<String, TypeDef>,
}

impl TypeRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a struct type by name
    pub fn register_struct(
        &mut self,
        name: impl Into<String>,
        properties: Vec<Property>,
    ) -> &mut Self {
        self.types.insert(name.into(), TypeDef::Struct { properties });
        self
    }

    /// Register a string enum type by name
    pub fn register_enum(&mut self, name: impl Into<String>, values: Vec<String>) -> &mut Self {
        self.types.insert(name.into(), TypeDef::Enum { values });
        self
    }
}

impl TypeIntrospector for TypeRegistry {
    fn find(&self, type_name: &str) -> Option<&TypeDef> {
        self.types.get(type_name)
    }
}
