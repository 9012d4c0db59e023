//! Compute-once cells for lazily populated symbol properties.

use std::fmt;
use std::sync::OnceLock;

/// A property computed on first access and memoized for the lifetime of its symbol.
///
/// Concurrent first accesses race to compute; exactly one result is installed and every caller observes it.
pub struct Lazy<T> {
    cell: OnceLock<T>,
}

impl<T> Lazy<T> {
    pub const fn new() -> Self {
        Self { cell: OnceLock::new() }
    }

    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        self.cell.get_or_init(init)
    }

    /// The memoized value, if already computed.
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_computed(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> Default for Lazy<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(v) => f.debug_tuple("Lazy").field(v).finish(),
            None => f.write_str("Lazy(<pending>)"),
        }
    }
}
