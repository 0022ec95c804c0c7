//! Descriptor-file discovery, parsing and merge rules.
//!
//! # Responsibility
//! - Locate descriptor files for one extension point across all search
//!   roots and both directory conventions.
//! - Parse `name=reference` lines and resolve references against the
//!   binding table into one merged name->implementation map.
//!
//! # Invariants
//! - One name maps to exactly one implementation type; re-declaring the
//!   same mapping elsewhere is a no-op, a different type is fatal.
//! - An unresolved reference aborts the rest of its file only; other
//!   files and roots still contribute.
//! - I/O failures demote a location to an empty contribution.

use crate::extension::point::{ConstructFn, ExtensionKind, PointDescriptor};
use crate::extension::registry::RegistryShared;
use crate::extension::{ExtensionError, ExtensionResult};
use log::{debug, error, info, warn};
use std::any::TypeId;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// New-style descriptor directory under each search root.
pub const EXTENSIONS_DIRECTORY: &str = "extensions";
/// Legacy descriptor directory, scanned after the new-style one.
pub const SERVICES_DIRECTORY: &str = "services";

/// One name's resolved implementation inside a loaded table.
pub(crate) struct ResolvedBinding<P: ?Sized> {
    pub reference: String,
    pub impl_type: TypeId,
    pub impl_type_name: &'static str,
    pub construct: Arc<ConstructFn<P>>,
}

/// Immutable result of one descriptor scan for one point.
pub(crate) struct ExtensionTable<P: ?Sized> {
    pub default_name: Option<String>,
    pub entries: BTreeMap<String, ResolvedBinding<P>>,
}

/// Scans every visible descriptor file for `point` and merges the results.
///
/// Runs at most once per loader; the caller caches the table in a holder.
pub(crate) fn load_extension_table<P: ?Sized + Send + Sync + 'static>(
    point: &PointDescriptor,
    shared: &RegistryShared,
) -> ExtensionResult<ExtensionTable<P>> {
    let started_at = Instant::now();
    let default_name = validated_default_name(point)?;

    let mut entries = BTreeMap::new();
    for directory in [EXTENSIONS_DIRECTORY, SERVICES_DIRECTORY] {
        for root in shared.search_roots() {
            let path = root.join(directory).join(&point.name);
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => {
                    warn!(
                        "event=descriptor_read module=extension status=error point={} path={} error={}",
                        point.name,
                        path.display(),
                        err
                    );
                    continue;
                }
            };
            match merge_resource(&mut entries, point, shared, &path, &text) {
                Ok(()) => {}
                Err(ExtensionError::UnresolvedReference {
                    reference,
                    resource,
                }) => {
                    // Fatal for this file only; siblings still contribute.
                    error!(
                        "event=descriptor_resolve module=extension status=error point={} reference={} resource={}",
                        point.name, reference, resource
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    info!(
        "event=descriptor_scan module=extension status=ok point={} entries={} duration_ms={}",
        point.name,
        entries.len(),
        started_at.elapsed().as_millis()
    );
    Ok(ExtensionTable {
        default_name,
        entries,
    })
}

/// Splits the legacy comma-list default declaration and enforces that at
/// most one default name is declared.
fn validated_default_name(point: &PointDescriptor) -> ExtensionResult<Option<String>> {
    let Some(raw) = &point.default_extension else {
        return Ok(None);
    };
    let names: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect();
    match names.as_slice() {
        [] => Ok(None),
        [single] => Ok(Some((*single).to_string())),
        _ => Err(ExtensionError::MultipleDefaultNames {
            point: point.name.clone(),
            declared: raw.clone(),
        }),
    }
}

/// Merges one descriptor file into the aggregated map.
fn merge_resource<P: ?Sized + Send + Sync + 'static>(
    entries: &mut BTreeMap<String, ResolvedBinding<P>>,
    point: &PointDescriptor,
    shared: &RegistryShared,
    path: &Path,
    text: &str,
) -> ExtensionResult<()> {
    for line in text.lines() {
        let Some((explicit_name, reference)) = parse_line(line) else {
            continue;
        };
        merge_entry(entries, point, shared, path, explicit_name, reference)?;
    }
    Ok(())
}

/// Parses one descriptor line into `(optional name, reference)`.
///
/// Strips the `#` trailing comment and surrounding whitespace; returns
/// `None` for lines with nothing left to register.
pub(crate) fn parse_line(line: &str) -> Option<(Option<&str>, &str)> {
    let stripped = match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    };
    let stripped = stripped.trim();
    if stripped.is_empty() {
        return None;
    }

    match stripped.find('=') {
        Some(idx) if idx > 0 => {
            let name = stripped[..idx].trim();
            let reference = stripped[idx + 1..].trim();
            if reference.is_empty() {
                return None;
            }
            let name = (!name.is_empty()).then_some(name);
            Some((name, reference))
        }
        _ => Some((None, stripped)),
    }
}

fn merge_entry<P: ?Sized + Send + Sync + 'static>(
    entries: &mut BTreeMap<String, ResolvedBinding<P>>,
    point: &PointDescriptor,
    shared: &RegistryShared,
    path: &Path,
    explicit_name: Option<&str>,
    reference: &str,
) -> ExtensionResult<()> {
    let bindings = shared.bindings();
    let Some(record) = bindings.get(reference) else {
        return Err(ExtensionError::UnresolvedReference {
            reference: reference.to_string(),
            resource: path.display().to_string(),
        });
    };

    if record.point_type != TypeId::of::<P>() {
        return Err(ExtensionError::IncompatibleExtension {
            reference: reference.to_string(),
            expected_point: point.name.clone(),
            actual_point: record.point_type_name.to_string(),
        });
    }

    match record.kind {
        ExtensionKind::Adaptive => {
            // Recognized marker with no behavior yet.
            debug!(
                "event=descriptor_scan module=extension status=skipped point={} reference={} kind=adaptive",
                point.name, reference
            );
            return Ok(());
        }
        ExtensionKind::Wrapper => {
            debug!(
                "event=descriptor_scan module=extension status=skipped point={} reference={} kind=wrapper",
                point.name, reference
            );
            return Ok(());
        }
        ExtensionKind::Regular => {}
    }

    let name = match explicit_name {
        Some(name) => name.to_string(),
        None => match &record.declared_name {
            Some(declared) if !declared.trim().is_empty() => declared.trim().to_string(),
            _ => {
                // Lower-confidence fallback: the reference doubles as the name.
                info!(
                    "event=descriptor_scan module=extension status=fallback point={} reference={} name_source=reference",
                    point.name, reference
                );
                reference.to_string()
            }
        },
    };
    if name.is_empty() {
        warn!(
            "event=descriptor_scan module=extension status=skipped point={} reference={} reason=no_derivable_name",
            point.name, reference
        );
        return Ok(());
    }

    let construct = record
        .construct
        .downcast_ref::<Arc<ConstructFn<P>>>()
        .cloned()
        .ok_or_else(|| ExtensionError::IncompatibleExtension {
            reference: reference.to_string(),
            expected_point: point.name.clone(),
            actual_point: record.point_type_name.to_string(),
        })?;

    if let Some(existing) = entries.get(&name) {
        if existing.impl_type != record.impl_type {
            return Err(ExtensionError::DuplicateExtension {
                point: point.name.clone(),
                name,
                existing: existing.impl_type_name.to_string(),
                incoming: record.impl_type_name.to_string(),
            });
        }
        // Same mapping declared in another location.
        return Ok(());
    }

    entries.insert(
        name,
        ResolvedBinding {
            reference: reference.to_string(),
            impl_type: record.impl_type,
            impl_type_name: record.impl_type_name,
            construct,
        },
    );
    Ok(())
}
