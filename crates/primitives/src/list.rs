//! ListStore: ordered, index-addressed store
//!
//! Every method holds the store lock only for its own duration, and every
//! value crossing the boundary is deep-cloned. There is no transaction type
//! for lists; hold the lock through a `State` (or use `write`) to make
//! several steps atomic.

use crate::query::Query;
use crate::range::RangeHandle;
use crate::store::{clone_all, Storable, StoreCore};
use serde::{Deserialize, Serialize};
use speicher_concurrency::{Guarded, State};
use speicher_core::{DeepClone, Lockable, RawRwLock, Result, SpeicherError, StoreId};
use speicher_durability::{Persist, PersistConfig, SchedulerStats};
use std::path::Path;
use std::sync::{Arc, Weak};

/// Contents of a [`ListStore`]
///
/// Reachable directly only under a held lock (see [`ListStore::locked`]).
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListData<T>(Vec<T>);

impl<T> Default for ListData<T> {
    fn default() -> Self {
        ListData(Vec::new())
    }
}

impl<T: DeepClone> DeepClone for ListData<T> {
    fn deep_clone(&self) -> Self {
        ListData(self.0.deep_clone())
    }
}

impl<T: DeepClone> ListData<T> {
    /// Copy of the element at `index`
    pub fn get(&self, index: usize) -> Option<T> {
        self.0.get(index).map(DeepClone::deep_clone)
    }

    /// Borrow the element at `index`
    pub fn get_ref(&self, index: usize) -> Option<&T> {
        self.0.get(index)
    }

    /// Mutably borrow the element at `index`
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.0.get_mut(index)
    }

    /// Replace the element at `index` with a copy of `value`
    pub fn set(&mut self, index: usize, value: &T) -> Result<()> {
        let len = self.0.len();
        match self.0.get_mut(index) {
            Some(slot) => {
                *slot = value.deep_clone();
                Ok(())
            }
            None => Err(SpeicherError::IndexOutOfRange { index, len }),
        }
    }

    /// Append a copy of `value`
    pub fn push(&mut self, value: &T) {
        self.0.push(value.deep_clone());
    }

    /// Append a copy of `value` unless `eq` matches an existing element
    pub fn push_unique(&mut self, value: &T, mut eq: impl FnMut(&T, &T) -> bool) -> bool {
        if self.0.iter().any(|existing| eq(existing, value)) {
            return false;
        }
        self.push(value);
        true
    }

    /// Copy of the first element matching `pred`
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<T> {
        self.0.iter().find(|v| pred(*v)).map(DeepClone::deep_clone)
    }

    /// Copies of every element matching `pred`, in order
    pub fn find_all(&self, mut pred: impl FnMut(&T) -> bool) -> Vec<T> {
        clone_all(self.0.iter().filter(|v| pred(*v)))
    }

    /// Replace all contents with copies of `values`
    pub fn replace(&mut self, values: &[T]) {
        self.0 = clone_all(values.iter());
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrowing iterator in order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    /// Borrow the elements
    pub fn as_slice(&self) -> &[T] {
        &self.0
    }
}

/// Thread-safe, optionally persistent list of `T`
///
/// # Example
///
/// ```
/// use speicher_primitives::ListStore;
///
/// let tags = ListStore::<String>::ephemeral();
/// tags.append(&"red".to_string());
/// assert!(tags.append_unique(&"blue".to_string(), |a, b| a == b));
/// assert!(!tags.append_unique(&"red".to_string(), |a, b| a == b));
///
/// tags.set(0, &"green".to_string())?;
/// assert_eq!(tags.get(0).as_deref(), Some("green"));
/// assert!(tags.set(5, &"x".to_string()).is_err());
/// # Ok::<(), speicher_core::SpeicherError>(())
/// ```
pub struct ListStore<T: Storable> {
    core: StoreCore<ListData<T>>,
}

/// Open a List store backed by a JSON file with the default config
pub fn load_list<T: Storable>(path: impl AsRef<Path>) -> Result<Arc<ListStore<T>>> {
    load_list_with(path, PersistConfig::default())
}

/// Open a List store backed by a JSON file
pub fn load_list_with<T: Storable>(
    path: impl AsRef<Path>,
    config: PersistConfig,
) -> Result<Arc<ListStore<T>>> {
    let core = StoreCore::load(path.as_ref(), &config)?;
    let store = Arc::new(ListStore { core });
    let owner: Weak<dyn Persist> = Arc::downgrade(&store) as Weak<dyn Persist>;
    store.core.start(owner)?;
    Ok(store)
}

impl<T: Storable> ListStore<T> {
    /// A store that is never persisted
    pub fn ephemeral() -> Arc<Self> {
        Arc::new(ListStore {
            core: StoreCore::ephemeral(ListData::default()),
        })
    }

    /// Copy of the element at `index`
    pub fn get(&self, index: usize) -> Option<T> {
        self.core.read().get(index)
    }

    /// Copy of the first element matching `pred`
    pub fn find(&self, pred: impl FnMut(&T) -> bool) -> Option<T> {
        self.core.read().find(pred)
    }

    /// Copies of every element matching `pred`
    pub fn find_all(&self, pred: impl FnMut(&T) -> bool) -> Vec<T> {
        self.core.read().find_all(pred)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.core.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.core.read().is_empty()
    }

    /// Append a copy of `value`
    pub fn append(&self, value: &T) {
        self.core.write().push(value);
        self.core.changed();
    }

    /// Append a copy of `value` unless `eq(existing, value)` holds for some
    /// element; returns whether it was appended
    pub fn append_unique(&self, value: &T, eq: impl FnMut(&T, &T) -> bool) -> bool {
        let appended = self.core.write().push_unique(value, eq);
        if appended {
            self.core.changed();
        }
        appended
    }

    /// Replace the element at `index`
    ///
    /// Fails with [`SpeicherError::IndexOutOfRange`] unless `index < len()`.
    pub fn set(&self, index: usize, value: &T) -> Result<()> {
        self.core.write().set(index, value)?;
        self.core.changed();
        Ok(())
    }

    /// Replace all contents with copies of `values`
    pub fn overwrite(&self, values: &[T]) {
        self.core.write().replace(values);
        self.core.changed();
    }

    /// Lazy sequence of copies in order
    ///
    /// Each pull takes a short shared hold and clones one element.
    pub fn select(&self) -> Query<'_, T> {
        Query::new(ListCursor {
            store: self,
            index: 0,
        })
    }

    /// Run `f` with exclusive access to the contents
    pub fn write<R>(&self, f: impl FnOnce(&mut ListData<T>) -> R) -> R {
        speicher_concurrency::write(self, f)
    }

    /// Like [`write`](Self::write), for closures that can fail
    pub fn write_e<R, E>(
        &self,
        f: impl FnOnce(&mut ListData<T>) -> std::result::Result<R, E>,
    ) -> std::result::Result<R, E> {
        speicher_concurrency::write_e(self, f)
    }

    /// Run `f` with shared access to the contents
    pub fn read<R>(&self, f: impl FnOnce(&ListData<T>) -> R) -> R {
        speicher_concurrency::read(self, f)
    }

    /// Like [`read`](Self::read), for closures that can fail
    pub fn read_e<R, E>(
        &self,
        f: impl FnOnce(&ListData<T>) -> std::result::Result<R, E>,
    ) -> std::result::Result<R, E> {
        speicher_concurrency::read_e(self, f)
    }

    /// Contents under a lock held by `state`
    #[track_caller]
    pub fn locked<'a>(&'a self, state: &'a State<'_>) -> &'a ListData<T> {
        state.access(self)
    }

    /// Mutable contents under a write lock held by `state`
    #[track_caller]
    pub fn locked_mut<'a>(&'a self, state: &'a mut State<'_>) -> &'a mut ListData<T> {
        state.access_mut(self)
    }

    /// Write the contents to disk now
    pub fn save(&self) -> Result<()> {
        self.core.save()
    }

    /// Save now if a background save is pending
    pub fn flush(&self) -> Result<bool> {
        self.core.flush()
    }

    /// Backing file, if persistent
    pub fn path(&self) -> Option<&Path> {
        self.core.path()
    }

    /// Scheduler counters, if background saving is enabled
    pub fn persistence_stats(&self) -> Option<SchedulerStats> {
        self.core.stats()
    }

    /// Stream a snapshot of all elements from a background thread
    #[deprecated(since = "0.1.0", note = "use select()")]
    pub fn range(&self) -> Result<RangeHandle<T>> {
        let snapshot = clone_all(self.core.read().iter());
        RangeHandle::spawn(snapshot)
    }
}

// SAFETY: the id comes from `StoreId::next` and the lock is the one around
// `core.data`, which is also what `data_ptr` points into.
unsafe impl<T: Storable> Lockable for ListStore<T> {
    fn store_id(&self) -> StoreId {
        self.core.id()
    }

    fn raw_lock(&self) -> &RawRwLock {
        self.core.raw_lock()
    }

    fn mark_changed(&self) {
        self.core.changed();
    }
}

unsafe impl<T: Storable> Guarded for ListStore<T> {
    type Data = ListData<T>;

    fn data_ptr(&self) -> *mut ListData<T> {
        self.core.data_ptr()
    }
}

impl<T: Storable> Persist for ListStore<T> {
    fn save(&self) -> Result<()> {
        self.core.save()
    }
}

impl<T: Storable> std::fmt::Debug for ListStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListStore")
            .field("id", &self.core.id())
            .field("path", &self.core.path())
            .finish()
    }
}

struct ListCursor<'a, T: Storable> {
    store: &'a ListStore<T>,
    index: usize,
}

impl<T: Storable> Iterator for ListCursor<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let item = self.store.core.read().get(self.index)?;
        self.index += 1;
        Some(item)
    }
}
