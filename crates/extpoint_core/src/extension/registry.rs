//! Process-wide extension registry.
//!
//! # Responsibility
//! - Own the point descriptors, the reference binding table, the per-point
//!   loader map and the cross-name instance dedup cache.
//! - Hand out exactly one loader per extension-point type, race-safely.
//!
//! # Invariants
//! - Concurrent `get_loader` calls for one type observe one loader object.
//! - Loader construction has no side effects, so a racing loser is safe
//!   to discard.
//! - All state lives for the process lifetime; there is no teardown.

use crate::extension::loader::ExtensionLoader;
use crate::extension::point::{BindingRecord, Implementation, PointDescriptor};
use crate::extension::{ExtensionError, ExtensionResult};
use log::{info, warn};
use once_cell::sync::OnceCell;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};

static GLOBAL_REGISTRY: OnceCell<ExtensionRegistry> = OnceCell::new();

/// Environment variable naming the global registry's search roots,
/// colon-separated. The layered-roots analogue of a resource path.
pub const SEARCH_PATH_ENV: &str = "EXTPOINT_PATH";

/// State shared between the registry and its loaders.
pub(crate) struct RegistryShared {
    search_roots: Vec<PathBuf>,
    points: RwLock<HashMap<TypeId, PointDescriptor>>,
    bindings: RwLock<HashMap<String, BindingRecord>>,
    /// `(point type, implementation type)` -> boxed `Arc<P>` shared instance.
    instances: Mutex<HashMap<(TypeId, TypeId), Box<dyn Any + Send + Sync>>>,
}

impl RegistryShared {
    pub(crate) fn search_roots(&self) -> &[PathBuf] {
        &self.search_roots
    }

    pub(crate) fn bindings(&self) -> RwLockReadGuard<'_, HashMap<String, BindingRecord>> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the shared instance for an implementation type within point
    /// `P`, keeping the first construction and discarding later candidates.
    ///
    /// The boolean reports whether an existing instance was reused.
    /// Safe only because constructors are expected to be side-effect-free;
    /// a discarded candidate's construction effects would not be undone.
    ///
    /// A concrete type serving two point traits cannot share one
    /// trait-object instance, so each point holds its own slot; one point's
    /// lookups never disturb another's cached instance.
    pub(crate) fn dedup_instance<P: ?Sized + Send + Sync + 'static>(
        &self,
        impl_type: TypeId,
        candidate: Arc<P>,
    ) -> (Arc<P>, bool) {
        let key = (TypeId::of::<P>(), impl_type);
        let mut instances = self
            .instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = instances
            .get(&key)
            .and_then(|boxed| boxed.downcast_ref::<Arc<P>>())
        {
            return (Arc::clone(existing), true);
        }
        instances.insert(key, Box::new(Arc::clone(&candidate)));
        (candidate, false)
    }
}

/// Registry of extension points, implementation bindings and loaders.
///
/// Construct one per scope under test, or use [`ExtensionRegistry::global`]
/// for the process-wide instance.
pub struct ExtensionRegistry {
    shared: Arc<RegistryShared>,
    /// Extension-point `TypeId` -> boxed `Arc<ExtensionLoader<P>>`.
    loaders: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl ExtensionRegistry {
    /// Creates a registry scanning descriptor files under `search_roots`.
    ///
    /// Roots are layered: every root may contribute a descriptor file for
    /// the same point and the contributions merge into one table.
    pub fn new(search_roots: Vec<PathBuf>) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                search_roots,
                points: RwLock::new(HashMap::new()),
                bindings: RwLock::new(HashMap::new()),
                instances: Mutex::new(HashMap::new()),
            }),
            loaders: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a registry without descriptor directories, for callers that
    /// only exercise binding-table validation.
    pub fn with_no_roots() -> Self {
        Self::new(Vec::new())
    }

    /// Returns the process-wide registry, initialized once from
    /// [`SEARCH_PATH_ENV`].
    pub fn global() -> &'static ExtensionRegistry {
        GLOBAL_REGISTRY.get_or_init(|| {
            let roots = search_roots_from_env();
            info!(
                "event=registry_init module=extension status=ok roots={}",
                roots.len()
            );
            ExtensionRegistry::new(roots)
        })
    }

    /// Registers `P` (a `dyn Trait` object type) as an extension point.
    ///
    /// Registration is the extensibility marker: [`Self::get_loader`]
    /// rejects types that were never registered. Re-registering the same
    /// descriptor is idempotent; a conflicting descriptor fails.
    pub fn register_point<P: ?Sized + Send + Sync + 'static>(
        &self,
        descriptor: PointDescriptor,
    ) -> ExtensionResult<()> {
        if descriptor.name.trim().is_empty() {
            return Err(ExtensionError::InvalidExtensionPoint {
                type_name: std::any::type_name::<P>().to_string(),
            });
        }

        let mut points = self
            .shared
            .points
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match points.get(&TypeId::of::<P>()) {
            Some(existing) if *existing == descriptor => Ok(()),
            Some(existing) => {
                warn!(
                    "event=point_register module=extension status=error point={} existing={}",
                    descriptor.name, existing.name
                );
                Err(ExtensionError::PointAlreadyRegistered {
                    point: descriptor.name,
                })
            }
            None => {
                points.insert(TypeId::of::<P>(), descriptor);
                Ok(())
            }
        }
    }

    /// Binds one implementation reference for point `P`.
    ///
    /// References are unique across the registry; re-binding the same
    /// reference to the same concrete type is a no-op.
    pub fn bind_implementation<P: ?Sized + Send + Sync + 'static>(
        &self,
        implementation: Implementation<P>,
    ) -> ExtensionResult<()> {
        if implementation.reference.trim().is_empty() {
            return Err(ExtensionError::EmptyReference {
                point: std::any::type_name::<P>().to_string(),
            });
        }

        let reference = implementation.reference.clone();
        let record = implementation.into_record();
        let mut bindings = self
            .shared
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match bindings.get(&reference) {
            Some(existing)
                if existing.impl_type == record.impl_type
                    && existing.point_type == record.point_type =>
            {
                Ok(())
            }
            Some(existing) => Err(ExtensionError::ConflictingBinding {
                reference,
                existing: existing.impl_type_name.to_string(),
                incoming: record.impl_type_name.to_string(),
            }),
            None => {
                bindings.insert(reference, record);
                Ok(())
            }
        }
    }

    /// Returns the unique loader for extension point `P`.
    ///
    /// # Errors
    /// - `InvalidExtensionPoint` when `P` was never registered as a point.
    pub fn get_loader<P: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> ExtensionResult<Arc<ExtensionLoader<P>>> {
        let key = TypeId::of::<P>();
        {
            let loaders = self
                .loaders
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = loaders
                .get(&key)
                .and_then(|boxed| boxed.downcast_ref::<Arc<ExtensionLoader<P>>>())
            {
                return Ok(Arc::clone(existing));
            }
        }

        let point = {
            let points = self
                .shared
                .points
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            points.get(&key).cloned()
        };
        let Some(point) = point else {
            return Err(ExtensionError::InvalidExtensionPoint {
                type_name: std::any::type_name::<P>().to_string(),
            });
        };

        // Insert-if-absent: under a race the losing candidate is discarded,
        // which is safe because loader construction is side-effect-free.
        let candidate = Arc::new(ExtensionLoader::new(point, Arc::clone(&self.shared)));
        let mut loaders = self
            .loaders
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let slot = loaders
            .entry(key)
            .or_insert_with(|| Box::new(Arc::clone(&candidate)));
        match slot.downcast_ref::<Arc<ExtensionLoader<P>>>() {
            Some(existing) => Ok(Arc::clone(existing)),
            // Unreachable: the slot is keyed by P's TypeId.
            None => Ok(candidate),
        }
    }
}

fn search_roots_from_env() -> Vec<PathBuf> {
    match std::env::var(SEARCH_PATH_ENV) {
        Ok(value) => value
            .split(':')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(PathBuf::from)
            .collect(),
        Err(_) => Vec::new(),
    }
}
