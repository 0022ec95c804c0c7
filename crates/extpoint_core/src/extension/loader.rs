//! Per-point extension loader and instance cache.
//!
//! # Responsibility
//! - Resolve extension names to shared singleton instances.
//! - Trigger the one-time descriptor scan on first resolution.
//!
//! # Invariants
//! - At most one instance is constructed per name; constructing one name
//!   never blocks lookups of another.
//! - Two names bound to the same implementation type share one instance.
//! - Constructor failures propagate to the caller and are never swallowed.

use crate::extension::descriptor::{load_extension_table, ExtensionTable};
use crate::extension::point::PointDescriptor;
use crate::extension::registry::RegistryShared;
use crate::extension::{ExtensionError, ExtensionResult};
use crate::holder::Holder;
use log::info;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Legacy sentinel meaning "resolve the declared default extension".
///
/// Default resolution is deliberately not implemented; lookups with this
/// name are rejected explicitly instead of guessing.
pub const DEFAULT_EXTENSION_SENTINEL: &str = "true";

/// Loader for one extension-point type `P` (a `dyn Trait` object type).
///
/// Created once per point through the registry and kept for the process
/// lifetime. The descriptor table and every named instance initialize
/// lazily behind independent holders.
pub struct ExtensionLoader<P: ?Sized + Send + Sync + 'static> {
    point: PointDescriptor,
    shared: Arc<RegistryShared>,
    table: Holder<ExtensionTable<P>>,
    cells: Mutex<HashMap<String, Arc<Holder<Arc<P>>>>>,
}

/// Serializable diagnostic snapshot of one loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionStatus {
    pub point: String,
    pub default_extension: Option<String>,
    pub extensions: Vec<String>,
    pub loaded: Vec<String>,
}

impl<P: ?Sized + Send + Sync + 'static> ExtensionLoader<P> {
    pub(crate) fn new(point: PointDescriptor, shared: Arc<RegistryShared>) -> Self {
        Self {
            point,
            shared,
            table: Holder::new(),
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the descriptor this loader was registered with.
    pub fn point(&self) -> &PointDescriptor {
        &self.point
    }

    /// Resolves `name` to its shared extension instance.
    ///
    /// The first lookup for any name triggers the one-time descriptor scan;
    /// the first lookup of a given name constructs its instance. Both are
    /// contention-safe and cached for the process lifetime.
    ///
    /// # Errors
    /// - `EmptyName` when `name` is empty, before any cache or scan activity.
    /// - `DefaultUnsupported` for the `"true"` sentinel.
    /// - `UnknownExtension` when no descriptor binds `name`.
    /// - `Instantiation` when the implementation constructor fails; the
    ///   failure is not cached and a later call retries.
    pub fn get_extension(&self, name: &str) -> ExtensionResult<Arc<P>> {
        if name.is_empty() {
            return Err(ExtensionError::EmptyName {
                point: self.point.name.clone(),
            });
        }
        if name == DEFAULT_EXTENSION_SENTINEL {
            return Err(ExtensionError::DefaultUnsupported {
                point: self.point.name.clone(),
            });
        }

        let cell = self.cell_for(name);
        cell.get_or_try_init(|| self.create_extension(name))
            .cloned()
    }

    /// Adaptive dispatch is recognized but unimplemented; always fails.
    pub fn get_adaptive_extension(&self) -> ExtensionResult<Arc<P>> {
        Err(ExtensionError::AdaptiveUnsupported {
            point: self.point.name.clone(),
        })
    }

    /// Returns the validated default extension name, if one is declared.
    ///
    /// Triggers the descriptor scan on first use since the default
    /// declaration is validated alongside the table.
    pub fn default_extension_name(&self) -> ExtensionResult<Option<String>> {
        Ok(self.extension_table()?.default_name.clone())
    }

    /// Returns all bindable extension names, sorted.
    pub fn supported_extensions(&self) -> ExtensionResult<Vec<String>> {
        Ok(self.extension_table()?.entries.keys().cloned().collect())
    }

    /// Returns true when an instance for `name` is already constructed.
    pub fn is_loaded(&self, name: &str) -> bool {
        let cells = self
            .cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        cells.get(name).is_some_and(|cell| cell.is_set())
    }

    /// Returns a serializable snapshot for diagnostics.
    pub fn extension_status(&self) -> ExtensionResult<ExtensionStatus> {
        let table = self.extension_table()?;
        let cells = self
            .cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut loaded: Vec<String> = cells
            .iter()
            .filter(|(_, cell)| cell.is_set())
            .map(|(name, _)| name.clone())
            .collect();
        loaded.sort();
        Ok(ExtensionStatus {
            point: self.point.name.clone(),
            default_extension: table.default_name.clone(),
            extensions: table.entries.keys().cloned().collect(),
            loaded,
        })
    }

    fn cell_for(&self, name: &str) -> Arc<Holder<Arc<P>>> {
        let mut cells = self
            .cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            cells
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Holder::new())),
        )
    }

    fn extension_table(&self) -> ExtensionResult<&ExtensionTable<P>> {
        self.table
            .get_or_try_init(|| load_extension_table(&self.point, &self.shared))
    }

    fn create_extension(&self, name: &str) -> ExtensionResult<Arc<P>> {
        let binding = {
            let table = self.extension_table()?;
            table
                .entries
                .get(name)
                .ok_or_else(|| ExtensionError::UnknownExtension {
                    point: self.point.name.clone(),
                    name: name.to_string(),
                })?
        };

        let started_at = Instant::now();
        let candidate = (binding.construct)().map_err(|message| ExtensionError::Instantiation {
            point: self.point.name.clone(),
            reference: binding.reference.clone(),
            message,
        })?;

        // Identical implementation types are singletons regardless of how
        // many names reference them; a racing construction loses its copy.
        let (instance, shared_hit) = self.shared.dedup_instance(binding.impl_type, candidate);
        info!(
            "event=extension_create module=extension status=ok point={} name={} reference={} shared={} duration_ms={}",
            self.point.name,
            name,
            binding.reference,
            shared_hit,
            started_at.elapsed().as_millis()
        );
        Ok(instance)
    }
}
