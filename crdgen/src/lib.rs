//! Deterministic CustomResourceDefinition generation.
//!
//! The pipeline turns descriptions of resource types into
//! `apiextensions.k8s.io/v1` manifests:
//!
//! 1. [`core::CustomResourceInfo`] extraction defaults and canonicalizes one
//!    (Kind, version) description.
//! 2. [`resolver::SchemaResolver`] walks the spec/status type graph into a
//!    structural schema and collects marker paths.
//! 3. [`decorator::Resources`] accumulates per-crdName documents through
//!    idempotent, order-independent decorators.
//! 4. [`serializer::DeterministicSerializer`] renders manifests that are
//!    byte-identical across runs.
//!
//! [`CrdGenerator`] ties the stages together for the common batch case:
//!
//! ```
//! use crdgen::{core::{ResourceDef, TypeRegistry}, CrdGenerator};
//! use crdgen::core::typedef::{Property, TypeRef};
//!
//! let mut registry = TypeRegistry::new();
//! registry.register_struct("WidgetSpec", vec![
//!     Property::new("replicas", TypeRef::Integer),
//! ]);
//! let def = ResourceDef {
//!     name: "Widget".into(),
//!     group: "example.com".into(),
//!     version: "v1".into(),
//!     spec_type: Some("WidgetSpec".into()),
//!     ..ResourceDef::default()
//! };
//!
//! let mut generator = CrdGenerator::new(&registry);
//! generator.add(&def);
//! let generated = generator.generate();
//! assert_eq!(generated.documents.len(), 1);
//! assert!(generated.failures.is_empty());
//! ```
#![deny(missing_docs)]
#![deny(unsafe_code)]

pub use crdgen_core as core;

pub mod decorator;
pub use decorator::{DecorateError, Decorator, Resources};

pub mod handler;
pub use handler::{handle, HandleError};

pub mod resolver;
pub use resolver::{
    MarkerKind, ResolveError, ResolvingContext, SchemaResolver, SchemaSwap, SwapTarget,
};

pub mod serializer;
pub use serializer::{DeterministicSerializer, SerializeError, SortRule};

use crate::core::{CustomResourceDefinition, CustomResourceInfo, ResourceDef, TypeIntrospector};
use std::collections::BTreeSet;
use thiserror::Error;

/// Any error from the generation pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Schema resolution failed
    #[error("schema resolution error: {0}")]
    Resolve(#[source] ResolveError),
    /// Document building failed
    #[error("document build error: {0}")]
    Decorate(#[source] DecorateError),
    /// Manifest rendering failed
    #[error("serialization error: {0}")]
    Serialize(#[source] SerializeError),
}

impl From<HandleError> for Error {
    fn from(err: HandleError) -> Self {
        match err {
            HandleError::Resolve(e) => Error::Resolve(e),
            HandleError::Decorate(e) => Error::Decorate(e),
        }
    }
}

/// Generic pipeline result
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A resource or document the pipeline had to drop.
#[derive(Debug)]
pub struct Failure {
    /// The affected document
    pub crd_name: String,
    /// Why it was dropped
    pub error: Error,
}

/// The outcome of a batch run: clean documents plus isolated failures.
#[derive(Debug)]
pub struct GeneratedCrds {
    /// Normalized documents, in crdName order
    pub documents: Vec<CustomResourceDefinition>,
    /// Documents dropped along the way, with their first error
    pub failures: Vec<Failure>,
}

/// Batch generator aggregating many resources into normalized documents.
///
/// Failures are isolated per crdName: a resource that cannot be resolved
/// drops only its own document, and the remaining documents still generate.
pub struct CrdGenerator<'a> {
    ctx: ResolvingContext<'a>,
    resources: Resources,
    poisoned: BTreeSet<String>,
    failures: Vec<Failure>,
}

impl<'a> CrdGenerator<'a> {
    /// A generator with default resolution settings
    pub fn new(introspector: &'a dyn TypeIntrospector) -> Self {
        Self::with_context(ResolvingContext::new(introspector))
    }

    /// A generator with caller-tuned resolution settings (swaps, revisit bound)
    pub fn with_context(ctx: ResolvingContext<'a>) -> Self {
        CrdGenerator {
            ctx,
            resources: Resources::new(),
            poisoned: BTreeSet::new(),
            failures: Vec::new(),
        }
    }

    /// Fold one resource into the batch.
    ///
    /// A failing resource poisons its crdName: the partial document is
    /// dropped, later versions of the same Kind are ignored, and the failure
    /// is reported by [`CrdGenerator::generate`].
    pub fn add(&mut self, def: &ResourceDef) -> &mut Self {
        let info = CustomResourceInfo::from_def(def, self.ctx.introspector());
        if self.poisoned.contains(&info.crd_name) {
            tracing::debug!(crd_name = %info.crd_name, version = %info.version, "skipping poisoned document");
            return self;
        }
        if let Err(err) = handle(&mut self.resources, &self.ctx, &info) {
            tracing::warn!(crd_name = %info.crd_name, error = %err, "dropping customresourcedefinition");
            self.resources.remove(&info.crd_name);
            self.poisoned.insert(info.crd_name.clone());
            self.failures.push(Failure {
                crd_name: info.crd_name,
                error: err.into(),
            });
        }
        self
    }

    /// Normalize and take every accumulated document.
    pub fn generate(self) -> GeneratedCrds {
        let generated = self.resources.generate();
        let mut failures = self.failures;
        failures.extend(generated.failures.into_iter().map(|f| Failure {
            crd_name: f.crd_name,
            error: Error::Decorate(f.error),
        }));
        GeneratedCrds {
            documents: generated.documents,
            failures,
        }
    }
}

/// File name under which a document is conventionally written,
/// `<crdName>-v1.yml` after the apiextensions version.
pub fn manifest_name(crd: &CustomResourceDefinition) -> String {
    format!("{}-v1.yml", crd.metadata.name)
}
