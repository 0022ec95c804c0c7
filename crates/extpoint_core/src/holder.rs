//! Single-assignment value holder used by the extension registry.
//!
//! # Responsibility
//! - Hold zero-or-one computed value with thread-safe, compute-once semantics.
//! - Back both the per-point descriptor table and per-name instance cells.
//!
//! # Invariants
//! - A holder transitions UNSET -> SET at most once.
//! - Readers observe either UNSET or a fully constructed value, never a
//!   partially initialized one.
//! - A failed initializer leaves the holder UNSET; later callers retry.

use once_cell::sync::OnceCell;

/// Thread-safe compute-once value holder.
#[derive(Debug, Default)]
pub struct Holder<T> {
    cell: OnceCell<T>,
}

impl<T> Holder<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Returns the held value if it has been set.
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Returns true when a value has been set.
    pub fn is_set(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Returns the held value, computing it once on first use.
    ///
    /// Concurrent callers block until the winning initializer finishes, then
    /// all observe the same value. When `init` fails nothing is cached and
    /// the error is returned to the caller that ran the initializer.
    pub fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        self.cell.get_or_try_init(init)
    }
}
