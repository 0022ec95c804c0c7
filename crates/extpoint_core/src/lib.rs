//! Extension-point registry core for extpoint.
//! This crate is the single source of truth for discovery and caching
//! invariants.

pub mod extension;
pub mod holder;
pub mod logging;

pub use extension::descriptor::{EXTENSIONS_DIRECTORY, SERVICES_DIRECTORY};
pub use extension::loader::{ExtensionLoader, ExtensionStatus, DEFAULT_EXTENSION_SENTINEL};
pub use extension::point::{ExtensionKind, Implementation, PointDescriptor};
pub use extension::registry::{ExtensionRegistry, SEARCH_PATH_ENV};
pub use extension::{ExtensionError, ExtensionResult};
pub use holder::Holder;
pub use logging::{default_log_level, init_logging, logging_status};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
