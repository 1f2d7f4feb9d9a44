//! Per-caller lock coordination
//!
//! A [`State`] records, for each store it touches, how much read and write
//! interest its owner currently has. Only the first acquisition of a mode
//! touches the store's raw lock; nested acquisitions just bump a counter.
//! That lets one caller re-enter locks it already holds, and upgrade a read
//! hold to a write hold, without deadlocking on itself.
//!
//! A `State` is neither `Send` nor `Sync`: its counters are plain integers and
//! the raw locks it holds belong to the creating thread.
//!
//! ## Transitions
//!
//! | Call | Before | Raw lock effect |
//! |------|--------|-----------------|
//! | `lock` | write > 0 | none |
//! | `lock` | read > 0, write == 0 | release shared, acquire exclusive |
//! | `lock` | idle | acquire exclusive |
//! | `unlock` | write == 1, read > 0 | downgrade exclusive to shared |
//! | `unlock` | write == 1, read == 0 | release exclusive |
//! | `read_lock` | idle | acquire shared |
//! | `read_unlock` | read == 1, write == 0 | release shared |

use crate::scope::Guarded;
use parking_lot::lock_api::{RawRwLock as _, RawRwLockDowngrade as _};
use speicher_core::{Lockable, Misuse, StoreId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;

struct Entry<'s> {
    store: &'s dyn Lockable,
    read: usize,
    write: usize,
}

/// Lock interest held by one caller across any number of stores
///
/// Dropping a `State` releases every hold it still owns. Write holds released
/// this way still fire the store's change notification.
pub struct State<'s> {
    entries: HashMap<StoreId, Entry<'s>>,
    _not_send: PhantomData<*const ()>,
}

impl<'s> State<'s> {
    /// Create a state holding nothing
    pub fn new() -> Self {
        State {
            entries: HashMap::new(),
            _not_send: PhantomData,
        }
    }

    fn entry(&mut self, store: &'s dyn Lockable) -> &mut Entry<'s> {
        self.entries.entry(store.store_id()).or_insert_with(|| Entry {
            store,
            read: 0,
            write: 0,
        })
    }

    /// Acquire exclusive access to `store`
    ///
    /// Reentrant. If this state only holds `store` for reading, the shared
    /// hold is released before blocking for the exclusive one, so another
    /// writer may run in between.
    pub fn lock(&mut self, store: &'s dyn Lockable) {
        let entry = self.entry(store);
        if entry.write > 0 {
            entry.write += 1;
            return;
        }

        let raw = entry.store.raw_lock();
        if entry.read > 0 {
            // SAFETY: read > 0 with write == 0 means this state holds the
            // shared lock.
            unsafe { raw.unlock_shared() };
        }
        raw.lock_exclusive();
        entry.write = 1;
    }

    /// Release one level of exclusive access to `store`
    ///
    /// When the last level is released the store is notified of a change. Read
    /// interest taken before an upgrade is preserved: the exclusive hold is
    /// downgraded atomically so no writer can slip in.
    ///
    /// # Panics
    ///
    /// Aborts with [`Misuse::UnmatchedUnlock`] if there is no matching `lock`.
    #[track_caller]
    pub fn unlock(&mut self, store: &dyn Lockable) {
        let id = store.store_id();
        let entry = match self.entries.get_mut(&id) {
            Some(entry) if entry.write > 0 => entry,
            _ => Misuse::UnmatchedUnlock(id).abort(),
        };

        entry.write -= 1;
        if entry.write > 0 {
            return;
        }

        let target = entry.store;
        let raw = target.raw_lock();
        if entry.read > 0 {
            // SAFETY: write just dropped from 1 to 0, so this state holds the
            // exclusive lock.
            unsafe { raw.downgrade() };
        } else {
            // SAFETY: as above.
            unsafe { raw.unlock_exclusive() };
            self.entries.remove(&id);
        }
        target.mark_changed();
    }

    /// Acquire shared access to `store`
    ///
    /// Under a write hold this only records interest.
    pub fn read_lock(&mut self, store: &'s dyn Lockable) {
        let entry = self.entry(store);
        if entry.write == 0 && entry.read == 0 {
            entry.store.raw_lock().lock_shared();
        }
        entry.read += 1;
    }

    /// Release one level of shared access to `store`
    ///
    /// # Panics
    ///
    /// Aborts with [`Misuse::UnmatchedReadUnlock`] if there is no matching
    /// `read_lock`.
    #[track_caller]
    pub fn read_unlock(&mut self, store: &dyn Lockable) {
        let id = store.store_id();
        let entry = match self.entries.get_mut(&id) {
            Some(entry) if entry.read > 0 => entry,
            _ => Misuse::UnmatchedReadUnlock(id).abort(),
        };

        entry.read -= 1;
        if entry.read == 0 && entry.write == 0 {
            // SAFETY: the last read interest without a writer means this state
            // holds the shared lock.
            unsafe { entry.store.raw_lock().unlock_shared() };
            self.entries.remove(&id);
        }
    }

    /// Whether this state may read `store` (read or write interest)
    pub fn has_read_lock(&self, store: &dyn Lockable) -> bool {
        self.entries
            .get(&store.store_id())
            .map_or(false, |e| e.read > 0 || e.write > 0)
    }

    /// Whether this state holds `store` exclusively
    pub fn has_write_lock(&self, store: &dyn Lockable) -> bool {
        self.entries
            .get(&store.store_id())
            .map_or(false, |e| e.write > 0)
    }

    /// Whether this state holds nothing
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the recorded hold for `store`'s id is on `store`'s own lock
    fn holds(&self, store: &dyn Lockable, exclusive: bool) -> bool {
        self.entries.get(&store.store_id()).map_or(false, |e| {
            let interest = if exclusive {
                e.write > 0
            } else {
                e.read > 0 || e.write > 0
            };
            interest && ptr::eq(e.store.raw_lock(), store.raw_lock())
        })
    }

    /// Borrow the contents of a store this state can read
    ///
    /// # Panics
    ///
    /// Aborts with [`Misuse::LockNotHeld`] without read or write interest.
    #[track_caller]
    pub fn access<'a, G: Guarded>(&'a self, store: &'a G) -> &'a G::Data {
        if !self.holds(store, false) {
            Misuse::LockNotHeld {
                store: store.store_id(),
                mode: "read",
            }
            .abort();
        }
        // SAFETY: this state holds at least a shared lock on `store`, and it
        // stays borrowed for as long as the returned reference lives.
        unsafe { &*store.data_ptr() }
    }

    /// Mutably borrow the contents of a store this state holds exclusively
    ///
    /// # Panics
    ///
    /// Aborts with [`Misuse::LockNotHeld`] without write interest.
    #[track_caller]
    pub fn access_mut<'a, G: Guarded>(&'a mut self, store: &'a G) -> &'a mut G::Data {
        if !self.holds(store, true) {
            Misuse::LockNotHeld {
                store: store.store_id(),
                mode: "write",
            }
            .abort();
        }
        // SAFETY: this state holds the exclusive lock on `store` and is
        // mutably borrowed for as long as the returned reference lives.
        unsafe { &mut *store.data_ptr() }
    }
}

impl Default for State<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for State<'_> {
    fn drop(&mut self) {
        for (_, entry) in self.entries.drain() {
            let raw = entry.store.raw_lock();
            if entry.write > 0 {
                // SAFETY: write interest means this state holds the exclusive lock.
                unsafe { raw.unlock_exclusive() };
                entry.store.mark_changed();
            } else if entry.read > 0 {
                // SAFETY: read interest alone means a shared hold.
                unsafe { raw.unlock_shared() };
            }
        }
    }
}

impl fmt::Debug for State<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (id, entry) in &self.entries {
            map.entry(id, &(entry.read, entry.write));
        }
        map.finish()
    }
}
