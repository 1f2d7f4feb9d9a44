//! Capability traits shared by stores and the lock manager

use crate::types::StoreId;
use parking_lot::RawRwLock;
use std::sync::Arc;

/// The narrow view of a store that lock coordination needs
///
/// A store exposes its identity and the raw reader/writer lock guarding its
/// container. Only the lock manager and the persistence scheduler should
/// drive the raw lock; everything else goes through the store's own methods.
///
/// # Safety
///
/// `store_id` must return the same id on every call, and no other live store
/// may report that id. `raw_lock` must return the same lock on every call,
/// and that lock must be the one guarding the store's container. The lock
/// manager hands out references to the container on the strength of these
/// two facts.
pub unsafe trait Lockable {
    /// Process-unique identifier assigned at construction
    fn store_id(&self) -> StoreId;

    /// Raw lock guarding the store's container
    fn raw_lock(&self) -> &RawRwLock;

    /// Called after an exclusive hold on the store has been fully released
    ///
    /// Persistent stores use this to schedule a save. The default does nothing.
    fn mark_changed(&self) {}
}

// SAFETY: forwards to the pointee, which upholds the contract itself.
unsafe impl<L: Lockable + ?Sized> Lockable for Arc<L> {
    fn store_id(&self) -> StoreId {
        (**self).store_id()
    }

    fn raw_lock(&self) -> &RawRwLock {
        (**self).raw_lock()
    }

    fn mark_changed(&self) {
        (**self).mark_changed()
    }
}
