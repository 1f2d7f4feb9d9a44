//! Store identity
//!
//! Every store gets a [`StoreId`] at construction. Ids come from one
//! process-wide counter and are never reused, so a lock record keyed by id can
//! never be mistaken for a different store.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Next id to hand out. Starts at 1 so that 0 never names a store.
static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique store identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(u64);

impl StoreId {
    /// Allocate a fresh identifier
    pub fn next() -> Self {
        StoreId(NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw value, for error-formatting tests
    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u64) -> Self {
        StoreId(raw)
    }

    /// Raw numeric value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
