//! Extension-point descriptors and implementation bindings.
//!
//! Descriptor files keep the declarative name=reference format, but Rust has
//! no runtime type resolution, so references resolve against an explicit
//! binding table populated at startup. Binding a reference is the
//! registration-time replacement for the original reflective class lookup.

use serde::Serialize;
use std::any::TypeId;
use std::sync::Arc;

/// Declares one trait type as an extensible point.
///
/// `name` is the fully qualified point name; descriptor files for the point
/// are named after it. The default declaration keeps the legacy comma-list
/// form; it is split and validated when the descriptor table is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointDescriptor {
    pub name: String,
    pub default_extension: Option<String>,
}

impl PointDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_extension: None,
        }
    }

    /// Declares the default extension name for this point.
    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default_extension = Some(name.into());
        self
    }
}

/// Structural classification of one binding.
///
/// Adaptive and wrapper kinds are recognized during descriptor loading but
/// deliberately carry no behavior; they are skipped and never registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExtensionKind {
    Regular,
    Adaptive,
    Wrapper,
}

pub(crate) type ConstructFn<P> = dyn Fn() -> Result<Arc<P>, String> + Send + Sync;

/// One implementation binding for an extension point `P`.
///
/// The concrete type parameter on [`Implementation::new`] identifies the
/// implementation for duplicate detection and cross-name instance sharing;
/// the constructor closure performs the unsize coercion to `Arc<P>`.
pub struct Implementation<P: ?Sized + Send + Sync + 'static> {
    pub(crate) reference: String,
    pub(crate) declared_name: Option<String>,
    pub(crate) kind: ExtensionKind,
    pub(crate) impl_type: TypeId,
    pub(crate) impl_type_name: &'static str,
    pub(crate) construct: Arc<ConstructFn<P>>,
}

impl<P: ?Sized + Send + Sync + 'static> Implementation<P> {
    /// Binds `reference` to a constructor producing concrete type `C`.
    ///
    /// The closure's return type stays `Arc<P>` so the unsize coercion
    /// happens at the call site; `C` only supplies the type identity.
    pub fn new<C, F>(reference: &str, construct: F) -> Self
    where
        C: Send + Sync + 'static,
        F: Fn() -> Result<Arc<P>, String> + Send + Sync + 'static,
    {
        Self {
            reference: reference.to_string(),
            declared_name: None,
            kind: ExtensionKind::Regular,
            impl_type: TypeId::of::<C>(),
            impl_type_name: std::any::type_name::<C>(),
            construct: Arc::new(construct),
        }
    }

    /// Declares the default extension name carried by the implementation,
    /// used when a descriptor line omits the `name=` part.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.declared_name = Some(name.into());
        self
    }

    /// Marks this binding as an adaptive dispatcher (recognized, not loaded).
    pub fn adaptive(mut self) -> Self {
        self.kind = ExtensionKind::Adaptive;
        self
    }

    /// Marks this binding as a wrapper/decorator (recognized, not loaded).
    pub fn wrapper(mut self) -> Self {
        self.kind = ExtensionKind::Wrapper;
        self
    }
}

/// Type-erased binding record stored in the registry-wide table.
pub(crate) struct BindingRecord {
    pub point_type: TypeId,
    pub point_type_name: &'static str,
    pub declared_name: Option<String>,
    pub kind: ExtensionKind,
    pub impl_type: TypeId,
    pub impl_type_name: &'static str,
    /// Holds `Arc<ConstructFn<P>>`; recovered by downcast during loading.
    pub construct: Box<dyn std::any::Any + Send + Sync>,
}

impl<P: ?Sized + Send + Sync + 'static> Implementation<P> {
    pub(crate) fn into_record(self) -> BindingRecord {
        BindingRecord {
            point_type: TypeId::of::<P>(),
            point_type_name: std::any::type_name::<P>(),
            declared_name: self.declared_name,
            kind: self.kind,
            impl_type: self.impl_type,
            impl_type_name: self.impl_type_name,
            construct: Box::new(self.construct),
        }
    }
}
