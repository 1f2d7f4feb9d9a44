//! MapStore: string-keyed store with copy-on-write transactions
//!
//! ## Single-Operation API
//!
//! `get`, `find`, `find_all`, `has`, `set`, `delete`, `overwrite`, `select`.
//! Each call holds the store lock only for its own duration. Values are
//! deep-cloned in both directions, so nothing the caller holds aliases the
//! store.
//!
//! ## Multi-Operation API
//!
//! - `begin`/`transaction` with [`MapTx`]: staged changes applied atomically
//!   on commit. This is the way to make several Map updates atomic.
//! - `write`/`read` and `locked`/`locked_mut` with a `State`: direct access
//!   under a held lock, for work spanning several stores.
//!
//! ## Persistence
//!
//! Stores opened with [`load_map`] save their contents as one JSON object
//! (keys sorted) after changes settle. Ephemeral stores never touch disk.

use crate::query::Query;
use crate::range::RangeHandle;
use crate::store::{clone_all, Storable, StoreCore};
use serde::{Deserialize, Serialize};
use speicher_concurrency::{
    ApplyResult, Guarded, PendingOperations, Staged, StagedChanges, State, TransactionStatus,
};
use speicher_core::{DeepClone, Lockable, RawRwLock, Result, StoreId};
use speicher_durability::{Persist, PersistConfig, SchedulerStats};
use std::collections::btree_map::{self, BTreeMap};
use std::ops::Bound;
use std::path::Path;
use std::sync::{Arc, Weak};

// ============================================================================
// Container
// ============================================================================

/// Contents of a [`MapStore`]
///
/// Reachable directly only under a held lock (see [`MapStore::locked`]).
/// Values entering or leaving through these methods are deep-cloned.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapData<T>(BTreeMap<String, T>);

impl<T> Default for MapData<T> {
    fn default() -> Self {
        MapData(BTreeMap::new())
    }
}

impl<T: DeepClone> DeepClone for MapData<T> {
    fn deep_clone(&self) -> Self {
        MapData(self.0.deep_clone())
    }
}

impl<T: DeepClone> MapData<T> {
    /// Copy of the value at `key`
    pub fn get(&self, key: &str) -> Option<T> {
        self.0.get(key).map(DeepClone::deep_clone)
    }

    /// Borrow the value at `key`
    pub fn get_ref(&self, key: &str) -> Option<&T> {
        self.0.get(key)
    }

    /// Mutably borrow the value at `key`
    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        self.0.get_mut(key)
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Store a copy of `value` at `key`
    pub fn set(&mut self, key: impl Into<String>, value: &T) {
        self.0.insert(key.into(), value.deep_clone());
    }

    /// Remove `key`, returning its value
    pub fn remove(&mut self, key: &str) -> Option<T> {
        self.0.remove(key)
    }

    /// Copy of the first value (in key order) matching `pred`
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<T> {
        self.0.values().find(|v| pred(*v)).map(DeepClone::deep_clone)
    }

    /// Copies of every value matching `pred`, in key order
    pub fn find_all(&self, mut pred: impl FnMut(&T) -> bool) -> Vec<T> {
        clone_all(self.0.values().filter(|v| pred(*v)))
    }

    /// Replace all contents with copies of `entries`
    pub fn replace(&mut self, entries: &BTreeMap<String, T>) {
        self.0 = entries.deep_clone();
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Borrowing iterator in key order
    pub fn iter(&self) -> btree_map::Iter<'_, String, T> {
        self.0.iter()
    }
}

// ============================================================================
// Store
// ============================================================================

/// Thread-safe, optionally persistent map from `String` keys to `T`
///
/// Share it as `Arc<MapStore<T>>`.
///
/// # Example
///
/// ```
/// use speicher_primitives::MapStore;
///
/// let users = MapStore::<u32>::ephemeral();
/// users.set("alice", &30);
///
/// users.transaction(|tx| {
///     if let Some(age) = tx.get("alice")? {
///         *age += 1;
///     }
///     tx.set("bob", &25)
/// })?;
///
/// assert_eq!(users.get("alice"), Some(31));
/// assert_eq!(users.len(), 2);
/// # Ok::<(), speicher_core::SpeicherError>(())
/// ```
pub struct MapStore<T: Storable> {
    core: StoreCore<MapData<T>>,
}

/// Open a Map store backed by a JSON file with the default config
///
/// A missing file is not an error: its directory is created and the store
/// starts empty.
pub fn load_map<T: Storable>(path: impl AsRef<Path>) -> Result<Arc<MapStore<T>>> {
    load_map_with(path, PersistConfig::default())
}

/// Open a Map store backed by a JSON file
pub fn load_map_with<T: Storable>(
    path: impl AsRef<Path>,
    config: PersistConfig,
) -> Result<Arc<MapStore<T>>> {
    let core = StoreCore::load(path.as_ref(), &config)?;
    let store = Arc::new(MapStore { core });
    let owner: Weak<dyn Persist> = Arc::downgrade(&store) as Weak<dyn Persist>;
    store.core.start(owner)?;
    Ok(store)
}

impl<T: Storable> MapStore<T> {
    /// A store that is never persisted
    pub fn ephemeral() -> Arc<Self> {
        Arc::new(MapStore {
            core: StoreCore::ephemeral(MapData::default()),
        })
    }

    /// Copy of the value at `key`
    pub fn get(&self, key: &str) -> Option<T> {
        self.core.read().get(key)
    }

    /// Copy of the first value (in key order) matching `pred`
    pub fn find(&self, pred: impl FnMut(&T) -> bool) -> Option<T> {
        self.core.read().find(pred)
    }

    /// Copies of every value matching `pred`
    pub fn find_all(&self, pred: impl FnMut(&T) -> bool) -> Vec<T> {
        self.core.read().find_all(pred)
    }

    /// Whether `key` is present
    pub fn has(&self, key: &str) -> bool {
        self.core.read().contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.core.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.core.read().is_empty()
    }

    /// All keys in order
    pub fn keys(&self) -> Vec<String> {
        self.core.read().keys().map(str::to_string).collect()
    }

    /// Store a copy of `value` at `key`
    pub fn set(&self, key: impl Into<String>, value: &T) {
        self.core.write().set(key, value);
        self.core.changed();
    }

    /// Remove `key`, returning whether it was present
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.core.write().remove(key).is_some();
        if removed {
            self.core.changed();
        }
        removed
    }

    /// Replace all contents with copies of `entries`
    pub fn overwrite(&self, entries: &BTreeMap<String, T>) {
        self.core.write().replace(entries);
        self.core.changed();
    }

    /// Lazy `(key, value)` sequence in key order
    ///
    /// Each pull takes a short shared hold and clones one entry. Entries
    /// written after the query started may or may not be seen.
    pub fn select(&self) -> Query<'_, (String, T)> {
        Query::new(MapCursor::new(self, None))
    }

    /// Start a transaction
    pub fn begin(&self) -> MapTx<'_, T> {
        MapTx {
            store: self,
            staged: StagedChanges::new(),
        }
    }

    /// Run `f` in a transaction, committing on `Ok` and rolling back on `Err`
    pub fn transaction<R, E, F>(&self, f: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut MapTx<'_, T>) -> std::result::Result<R, E>,
    {
        let mut tx = self.begin();
        match f(&mut tx) {
            Ok(value) => {
                tx.commit();
                Ok(value)
            }
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }

    /// Run `f` with exclusive access to the contents
    pub fn write<R>(&self, f: impl FnOnce(&mut MapData<T>) -> R) -> R {
        speicher_concurrency::write(self, f)
    }

    /// Like [`write`](Self::write), for closures that can fail
    pub fn write_e<R, E>(
        &self,
        f: impl FnOnce(&mut MapData<T>) -> std::result::Result<R, E>,
    ) -> std::result::Result<R, E> {
        speicher_concurrency::write_e(self, f)
    }

    /// Run `f` with shared access to the contents
    pub fn read<R>(&self, f: impl FnOnce(&MapData<T>) -> R) -> R {
        speicher_concurrency::read(self, f)
    }

    /// Like [`read`](Self::read), for closures that can fail
    pub fn read_e<R, E>(
        &self,
        f: impl FnOnce(&MapData<T>) -> std::result::Result<R, E>,
    ) -> std::result::Result<R, E> {
        speicher_concurrency::read_e(self, f)
    }

    /// Contents under a lock held by `state`
    ///
    /// # Panics
    ///
    /// Aborts if `state` holds neither a read nor a write lock on this store.
    #[track_caller]
    pub fn locked<'a>(&'a self, state: &'a State<'_>) -> &'a MapData<T> {
        state.access(self)
    }

    /// Mutable contents under a write lock held by `state`
    ///
    /// # Panics
    ///
    /// Aborts if `state` does not hold the write lock on this store.
    #[track_caller]
    pub fn locked_mut<'a>(&'a self, state: &'a mut State<'_>) -> &'a mut MapData<T> {
        state.access_mut(self)
    }

    /// Write the contents to disk now
    ///
    /// Does nothing for ephemeral stores.
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

    /// Stream a snapshot of all entries from a background thread
    #[deprecated(since = "0.1.0", note = "use select()")]
    pub fn range_kv(&self) -> Result<RangeHandle<(String, T)>> {
        let snapshot: Vec<(String, T)> = self
            .core
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.deep_clone()))
            .collect();
        RangeHandle::spawn(snapshot)
    }
}

// SAFETY: the id comes from `StoreId::next` and the lock is the one around
// `core.data`, which is also what `data_ptr` points into.
unsafe impl<T: Storable> Lockable for MapStore<T> {
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

unsafe impl<T: Storable> Guarded for MapStore<T> {
    type Data = MapData<T>;

    fn data_ptr(&self) -> *mut MapData<T> {
        self.core.data_ptr()
    }
}

impl<T: Storable> Persist for MapStore<T> {
    fn save(&self) -> Result<()> {
        self.core.save()
    }
}

impl<T: Storable> std::fmt::Debug for MapStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapStore")
            .field("id", &self.core.id())
            .field("path", &self.core.path())
            .finish()
    }
}

// ============================================================================
// Cursor
// ============================================================================

/// Pulls live entries one at a time, resuming after the last key yielded
struct MapCursor<'a, T: Storable> {
    store: &'a MapStore<T>,
    shadow: Option<&'a StagedChanges<String, T>>,
    last: Option<String>,
    done: bool,
}

impl<'a, T: Storable> MapCursor<'a, T> {
    fn new(store: &'a MapStore<T>, shadow: Option<&'a StagedChanges<String, T>>) -> Self {
        MapCursor {
            store,
            shadow,
            last: None,
            done: false,
        }
    }
}

impl<T: Storable> Iterator for MapCursor<'_, T> {
    type Item = (String, T);

    fn next(&mut self) -> Option<(String, T)> {
        if self.done {
            return None;
        }

        let shadow = self.shadow;
        let found = {
            let data = self.store.core.read();
            let lower = match &self.last {
                Some(last) => Bound::Excluded(last.as_str()),
                None => Bound::Unbounded,
            };
            data.0
                .range::<str, _>((lower, Bound::Unbounded))
                .find(|(k, _)| shadow.map_or(true, |s| !s.contains(k.as_str())))
                .map(|(k, v)| (k.clone(), v.deep_clone()))
        };

        match found {
            Some((key, value)) => {
                self.last = Some(key.clone());
                Some((key, value))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

// ============================================================================
// Transaction
// ============================================================================

/// Copy-on-write transaction on one [`MapStore`]
///
/// Reads see staged changes first, then the live store. Nothing reaches the
/// live store until [`commit`](Self::commit); dropping an unresolved
/// transaction discards it.
pub struct MapTx<'m, T: Storable> {
    store: &'m MapStore<T>,
    staged: StagedChanges<String, T>,
}

impl<'m, T: Storable> MapTx<'m, T> {
    /// Current status
    pub fn status(&self) -> TransactionStatus {
        self.staged.status()
    }

    /// The transaction's copy of the value at `key`
    ///
    /// The first read of a live key stages a private copy; later reads
    /// return that same copy, so mutations through the returned reference
    /// are committed with the transaction.
    pub fn get(&mut self, key: &str) -> Result<Option<&mut T>> {
        self.staged.ensure_open()?;
        if self.staged.contains(key) {
            return Ok(self.staged.get_mut(key).and_then(Staged::value_mut));
        }

        let live = self.store.core.read().get(key);
        match live {
            Some(value) => self.staged.materialize(key.to_string(), value).map(Some),
            None => Ok(None),
        }
    }

    /// The transaction's copy of the first value matching `pred`
    ///
    /// Staged values are searched first, then unshadowed live entries in key
    /// order. A live match is staged like a [`get`](Self::get).
    pub fn find(&mut self, mut pred: impl FnMut(&T) -> bool) -> Result<Option<&mut T>> {
        self.staged.ensure_open()?;

        let staged_hit = self
            .staged
            .upserts()
            .find(|(_, v)| pred(*v))
            .map(|(k, _)| k.clone());
        if let Some(key) = staged_hit {
            return Ok(self.staged.get_mut(&key).and_then(Staged::value_mut));
        }

        let live_hit = {
            let data = self.store.core.read();
            let staged = &self.staged;
            data.iter()
                .find(|(k, v)| !staged.contains(k.as_str()) && pred(*v))
                .map(|(k, v)| (k.clone(), v.deep_clone()))
        };
        match live_hit {
            Some((key, value)) => self.staged.materialize(key, value).map(Some),
            None => Ok(None),
        }
    }

    /// Whether `key` exists as seen by this transaction
    pub fn has(&self, key: &str) -> Result<bool> {
        self.staged.ensure_open()?;
        Ok(match self.staged.get(key) {
            Some(staged) => !staged.is_tombstone(),
            None => self.store.core.read().contains_key(key),
        })
    }

    /// Stage a copy of `value` at `key`
    pub fn set(&mut self, key: impl Into<String>, value: &T) -> Result<()> {
        self.staged.upsert(key.into(), value.deep_clone())
    }

    /// Stage deletion of `key`
    pub fn delete(&mut self, key: impl Into<String>) -> Result<()> {
        self.staged.tombstone(key.into())
    }

    /// Lazy sequence: staged upserts first, then live entries not shadowed by
    /// any staged change
    pub fn select(&self) -> Result<Query<'_, (String, T)>> {
        self.staged.ensure_open()?;
        let staged = self
            .staged
            .upserts()
            .map(|(k, v)| (k.clone(), v.deep_clone()));
        let live = MapCursor::new(self.store, Some(&self.staged));
        Ok(Query::new(staged.chain(live)))
    }

    /// Summary of staged changes
    pub fn pending_operations(&self) -> PendingOperations {
        self.staged.pending_operations()
    }

    /// Apply every staged change under the store's exclusive lock
    ///
    /// Returns `None` if the transaction was already committed or rolled back.
    pub fn commit(&mut self) -> Option<ApplyResult> {
        let staged = self.staged.take_for_commit()?;
        let mut result = ApplyResult::default();
        {
            let mut data = self.store.core.write();
            for (key, change) in staged {
                match change {
                    Staged::Upsert(value) => {
                        data.0.insert(key, value);
                        result.upserts += 1;
                    }
                    Staged::Tombstone => {
                        if data.0.remove(&key).is_some() {
                            result.deletes += 1;
                        }
                    }
                }
            }
        }
        self.store.core.changed();
        Some(result)
    }

    /// Discard every staged change
    ///
    /// Returns `false` if the transaction was already resolved; a committed
    /// transaction stays committed.
    pub fn rollback(&mut self) -> bool {
        self.staged.rollback()
    }
}

impl<T: Storable> std::fmt::Debug for MapTx<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapTx")
            .field("store", &self.store.core.id())
            .field("staged", &self.staged)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speicher_core::{impl_deep_clone, Shared, SpeicherError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store_with(entries: &[(&str, i32)]) -> Arc<MapStore<i32>> {
        let store = MapStore::ephemeral();
        for (k, v) in entries {
            store.set(*k, v);
        }
        store
    }

    #[test]
    fn test_set_get_delete() {
        let store = store_with(&[("a", 1)]);
        assert_eq!(store.get("a"), Some(1));
        assert!(store.has("a"));
        assert!(store.delete("a"));
        assert!(!store.delete("a"));
        assert_eq!(store.get("a"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_values_are_isolated() {
        let store = MapStore::<Vec<String>>::ephemeral();
        let mut value = vec!["x".to_string()];
        store.set("k", &value);

        value.push("mutated".to_string());
        let mut out = store.get("k").unwrap();
        assert_eq!(out, vec!["x".to_string()]);

        out.clear();
        assert_eq!(store.get("k").unwrap().len(), 1);
    }

    #[test]
    fn test_find_and_find_all_in_key_order() {
        let store = store_with(&[("c", 3), ("a", 1), ("b", 2)]);
        assert_eq!(store.find(|v| *v > 1), Some(2));
        assert_eq!(store.find_all(|v| *v != 2), vec![1, 3]);
        assert_eq!(store.find(|v| *v > 10), None);
        assert_eq!(store.keys(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_overwrite_replaces_everything() {
        let store = store_with(&[("a", 1), ("b", 2)]);
        let replacement = BTreeMap::from([("z".to_string(), 26)]);
        store.overwrite(&replacement);
        assert_eq!(store.keys(), vec!["z"]);
    }

    #[test]
    fn test_select_is_key_ordered() {
        let store = store_with(&[("b", 2), ("a", 1), ("c", 3)]);
        let pairs: Vec<_> = store.select().collect();
        assert_eq!(
            pairs,
            vec![("a".to_string(), 1), ("b".to_string(), 2), ("c".to_string(), 3)]
        );
    }

    #[test]
    fn test_select_allows_writes_between_pulls() {
        let store = store_with(&[("a", 1), ("b", 2)]);
        let mut query = store.select();
        assert_eq!(query.next(), Some(("a".to_string(), 1)));

        store.set("c", &3);
        store.delete("b");
        assert_eq!(query.next(), Some(("c".to_string(), 3)));
        assert_eq!(query.next(), None);
    }

    struct Counted {
        clones: Shared<AtomicUsize>,
    }

    impl DeepClone for Counted {
        fn deep_clone(&self) -> Self {
            self.clones.fetch_add(1, Ordering::SeqCst);
            Counted {
                clones: self.clones.clone(),
            }
        }
    }

    impl Serialize for Counted {
        fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
            s.serialize_unit()
        }
    }

    impl<'de> Deserialize<'de> for Counted {
        fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
            <()>::deserialize(d)?;
            Ok(Counted {
                clones: Shared::new(AtomicUsize::new(0)),
            })
        }
    }

    #[test]
    fn test_select_limit_clones_only_what_is_pulled() {
        let clones = Shared::new(AtomicUsize::new(0));
        let store = MapStore::<Counted>::ephemeral();
        for key in ["a", "b", "c", "d", "e"] {
            store.set(
                key,
                &Counted {
                    clones: clones.clone(),
                },
            );
        }

        let before = clones.load(Ordering::SeqCst);
        let pulled = store.select().limit(2).count();
        assert_eq!(pulled, 2);
        assert_eq!(clones.load(Ordering::SeqCst) - before, 2);
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        visits: u32,
    }

    impl_deep_clone!(Profile { name, visits });

    #[test]
    fn test_tx_get_materializes_and_mutation_commits() {
        let store = MapStore::<Profile>::ephemeral();
        store.set(
            "u1",
            &Profile {
                name: "ann".into(),
                visits: 1,
            },
        );

        let mut tx = store.begin();
        tx.get("u1").unwrap().unwrap().visits += 1;
        assert_eq!(tx.get("u1").unwrap().unwrap().visits, 2);
        assert_eq!(store.get("u1").unwrap().visits, 1);

        let applied = tx.commit().unwrap();
        assert_eq!(applied.upserts, 1);
        assert_eq!(store.get("u1").unwrap().visits, 2);
    }

    #[test]
    fn test_tx_tombstone_hides_live_key() {
        let store = store_with(&[("a", 1)]);
        let mut tx = store.begin();
        tx.delete("a").unwrap();

        assert!(!tx.has("a").unwrap());
        assert!(tx.get("a").unwrap().is_none());
        assert!(store.has("a"));

        let applied = tx.commit().unwrap();
        assert_eq!(applied.deletes, 1);
        assert!(!store.has("a"));
    }

    #[test]
    fn test_tx_rollback_then_commit_is_noop() {
        let store = store_with(&[("a", 1)]);
        let mut tx = store.begin();
        tx.set("a", &2).unwrap();
        assert!(tx.rollback());

        assert!(tx.commit().is_none());
        assert_eq!(store.get("a"), Some(1));
        assert_eq!(tx.status(), TransactionStatus::RolledBack);
    }

    #[test]
    fn test_tx_commit_twice_is_noop() {
        let store = store_with(&[]);
        let mut tx = store.begin();
        tx.set("a", &1).unwrap();
        assert!(tx.commit().is_some());
        assert!(tx.commit().is_none());
        assert!(!tx.rollback());
        assert_eq!(tx.status(), TransactionStatus::Committed);
        assert_eq!(store.get("a"), Some(1));
    }

    #[test]
    fn test_tx_operations_after_resolution_fail() {
        let store = store_with(&[("a", 1)]);
        let mut tx = store.begin();
        tx.commit();

        assert!(matches!(
            tx.get("a"),
            Err(SpeicherError::TransactionClosed { status: "committed" })
        ));
        assert!(tx.set("b", &2).is_err());
        assert!(tx.delete("a").is_err());
        assert!(tx.has("a").is_err());
        assert!(tx.select().is_err());
        assert!(tx.find(|_| true).is_err());
    }

    #[test]
    fn test_tx_select_staged_first_then_unshadowed_live() {
        let store = store_with(&[("a", 1), ("b", 2), ("c", 3)]);
        let mut tx = store.begin();
        tx.set("z", &26).unwrap();
        tx.set("b", &20).unwrap();
        tx.delete("c").unwrap();

        let pairs: Vec<_> = tx.select().unwrap().collect();
        assert_eq!(
            pairs,
            vec![
                ("b".to_string(), 20),
                ("z".to_string(), 26),
                ("a".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_tx_find_prefers_staged() {
        let store = store_with(&[("a", 5), ("b", 7)]);
        let mut tx = store.begin();
        tx.set("x", &9).unwrap();

        assert_eq!(tx.find(|v| *v > 6).unwrap().copied(), Some(9));
        *tx.find(|v| *v == 5).unwrap().unwrap() = 50;
        assert_eq!(store.get("a"), Some(5));

        tx.commit();
        assert_eq!(store.get("a"), Some(50));
        assert_eq!(store.get("x"), Some(9));
    }

    #[test]
    fn test_transaction_helper_rolls_back_on_err() {
        let store = store_with(&[("a", 1)]);
        let result: Result<()> = store.transaction(|tx| {
            tx.set("a", &2)?;
            Err(SpeicherError::IndexOutOfRange { index: 0, len: 0 })
        });
        assert!(result.is_err());
        assert_eq!(store.get("a"), Some(1));

        store
            .transaction(|tx| tx.set("a", &3))
            .unwrap();
        assert_eq!(store.get("a"), Some(3));
    }

    #[test]
    fn test_pending_operations() {
        let store = store_with(&[("a", 1)]);
        let mut tx = store.begin();
        tx.set("b", &2).unwrap();
        tx.delete("a").unwrap();
        let pending = tx.pending_operations();
        assert_eq!(pending.upserts, 1);
        assert_eq!(pending.deletes, 1);
    }

    #[test]
    fn test_locked_access_with_state() {
        let store = store_with(&[("a", 1)]);
        let mut state = State::new();
        state.lock(&*store);
        store.locked_mut(&mut state).set("b", &2);
        assert_eq!(store.locked(&state).get("b"), Some(2));
        state.unlock(&*store);

        assert_eq!(store.get("b"), Some(2));
    }

    #[test]
    fn test_read_lock_allows_single_operation_reads() {
        let store = store_with(&[("a", 1)]);
        let mut state = State::new();
        state.read_lock(&*store);
        assert_eq!(store.get("a"), Some(1));
        assert_eq!(store.locked(&state).len(), 1);
        state.read_unlock(&*store);
    }

    #[test]
    fn test_write_helper() {
        let store = store_with(&[("a", 1)]);
        let total = store.write(|data| {
            data.set("b", &2);
            data.iter().map(|(_, v)| *v).sum::<i32>()
        });
        assert_eq!(total, 3);
        assert_eq!(store.read(|data| data.len()), 2);

        let failed: std::result::Result<(), &str> = store.write_e(|data| {
            data.remove("a");
            Err("abort")
        });
        assert!(failed.is_err());
        // write_e does not roll back
        assert!(!store.has("a"));
    }

    #[test]
    #[allow(deprecated)]
    fn test_range_kv_streams_snapshot() {
        let store = store_with(&[("a", 1), ("b", 2)]);
        let handle = store.range_kv().unwrap();
        store.set("c", &3);
        let pairs: Vec<_> = handle.collect();
        assert_eq!(pairs, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
    }

    #[test]
    fn test_ephemeral_save_is_noop() {
        let store = store_with(&[("a", 1)]);
        assert!(store.path().is_none());
        assert!(store.save().is_ok());
        assert!(!store.flush().unwrap());
        assert!(store.persistence_stats().is_none());
    }
}
