//! Client-less types for CRD generation
//!
//! This crate carries the pieces of the generation pipeline that do not
//! depend on the resolver or the document builder: Kubernetes version
//! priority, resource metadata extraction, the type-description data model
//! served to the schema resolver, and the CRD document model itself. The
//! full pipeline lives in `crdgen`, which re-exports everything here under
//! `crdgen::core`.
#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod crd;
pub use crd::{CrdVersion, CustomResourceDefinition};

pub mod resource;
pub use resource::{
    resolve_spec_and_status, to_plural, CustomResourceInfo, ResourceDef, Scope, SpecAndStatus,
};

pub mod schema;
pub use schema::{SchemaNode, SchemaType};

pub mod typedef;
pub use typedef::{
    Marker, PrinterColumnSpec, Property, TypeDef, TypeIntrospector, TypeRef, TypeRegistry,
};

pub mod version;
pub use version::Version;
