//! Per-resource orchestration.
//!
//! [`handle`] resolves one resource's schema and translates everything known
//! about it into decorator applications against the shared [`Resources`]
//! accumulator. All cross-version work (storage checks, ordering) is
//! deferred to normalization so resources can be handled in any order.

use crate::decorator::{DecorateError, Decorator, Resources};
use crate::resolver::{MarkerKind, ResolveError, ResolvingContext, SchemaResolver};
use crdgen_core::{crd::PrinterColumn, CustomResourceInfo};
use thiserror::Error;

/// Errors from handling one resource.
#[derive(Debug, Error)]
pub enum HandleError {
    /// Schema resolution failed
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// A decorator was rejected
    #[error(transparent)]
    Decorate(#[from] DecorateError),
}

/// Fold one resource into the accumulator.
///
/// On error the target document may hold a partial update; callers wanting
/// per-document isolation drop it via [`Resources::remove`].
pub fn handle(
    resources: &mut Resources,
    ctx: &ResolvingContext<'_>,
    info: &CustomResourceInfo,
) -> Result<(), HandleError> {
    let crd_name = &info.crd_name;
    let version = &info.version;

    if info.spec_and_status.unreliable {
        tracing::warn!(
            %crd_name,
            resource = %info.kind,
            "falling back to declared spec/status properties for schema resolution"
        );
    }

    resources.decorate(Decorator::AddResource {
        crd_name: crd_name.clone(),
        group: info.group.clone(),
        kind: info.kind.clone(),
        scope: info.scope,
        plural: info.plural.clone(),
        singular: Some(info.singular.clone()),
        short_names: info.short_names.clone(),
        labels: info.labels.clone(),
        annotations: info.annotations.clone(),
    })?;
    resources.decorate(Decorator::AddVersion {
        crd_name: crd_name.clone(),
        version: version.clone(),
    })?;

    let resolved = SchemaResolver::resolve(ctx, info)?;
    resources.decorate(Decorator::AddSchema {
        crd_name: crd_name.clone(),
        version: version.clone(),
        schema: resolved.schema().clone(),
    })?;

    type MakePath = fn(String, String, String) -> Decorator;
    let scale_paths: [(MarkerKind, MakePath); 3] = [
        (MarkerKind::SpecReplicas, scale_spec_replicas),
        (MarkerKind::StatusReplicas, scale_status_replicas),
        (MarkerKind::LabelSelector, scale_label_selector),
    ];
    for (kind, make) in scale_paths {
        if let Some(path) = resolved.single_path(kind)? {
            resources.decorate(Decorator::AddSubresources {
                crd_name: crd_name.clone(),
                version: version.clone(),
            })?;
            resources.decorate(make(crd_name.clone(), version.clone(), path.to_string()))?;
        }
    }

    for column in resolved.printer_columns() {
        resources.decorate(Decorator::AddPrinterColumn {
            crd_name: crd_name.clone(),
            version: version.clone(),
            column: PrinterColumn {
                name: column.name,
                type_: column.type_,
                json_path: column.path,
                description: column.description,
                format: column.format,
                priority: column.priority,
            },
        })?;
    }

    if info.spec_and_status.status_type.is_some() {
        resources.decorate(Decorator::AddSubresources {
            crd_name: crd_name.clone(),
            version: version.clone(),
        })?;
        resources.decorate(Decorator::AddStatusSubresource {
            crd_name: crd_name.clone(),
            version: version.clone(),
        })?;
    }

    resources.decorate(Decorator::SetServed {
        crd_name: crd_name.clone(),
        version: version.clone(),
        served: info.served,
    })?;
    resources.decorate(Decorator::SetStorage {
        crd_name: crd_name.clone(),
        version: version.clone(),
        storage: info.storage,
    })?;
    if info.deprecated {
        resources.decorate(Decorator::SetDeprecated {
            crd_name: crd_name.clone(),
            version: version.clone(),
            warning: info.deprecation_warning.clone(),
        })?;
    }
    Ok(())
}

fn scale_spec_replicas(crd_name: String, version: String, path: String) -> Decorator {
    Decorator::AddSpecReplicasPath {
        crd_name,
        version,
        path,
    }
}

fn scale_status_replicas(crd_name: String, version: String, path: String) -> Decorator {
    Decorator::AddStatusReplicasPath {
        crd_name,
        version,
        path,
    }
}

fn scale_label_selector(crd_name: String, version: String, path: String) -> Decorator {
    Decorator::AddLabelSelectorPath {
        crd_name,
        version,
        path,
    }
}
