//! Staged-change table for copy-on-write transactions
//!
//! A transaction buffers every change in a [`StagedChanges`] table until it is
//! resolved. Nothing here touches a live store: the owning transaction type
//! decides how to read through to live data and how to apply the table under
//! the store's exclusive lock.
//!
//! Status moves `Open → Committed | RolledBack` exactly once. A terminal table
//! rejects further staging with [`SpeicherError::TransactionClosed`].

use speicher_core::{Result, SpeicherError};
use std::borrow::Borrow;
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::mem;

/// A staged change for one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staged<V> {
    /// Insert or replace with this value
    Upsert(V),
    /// Delete the key, even though it is still present in the live store
    Tombstone,
}

impl<V> Staged<V> {
    /// The staged value, unless this is a tombstone
    pub fn value(&self) -> Option<&V> {
        match self {
            Staged::Upsert(v) => Some(v),
            Staged::Tombstone => None,
        }
    }

    /// Mutable staged value, unless this is a tombstone
    pub fn value_mut(&mut self) -> Option<&mut V> {
        match self {
            Staged::Upsert(v) => Some(v),
            Staged::Tombstone => None,
        }
    }

    /// Whether this entry deletes its key
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Staged::Tombstone)
    }
}

/// Lifecycle of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Accepting reads and staged writes
    Open,
    /// Changes were applied to the live store
    Committed,
    /// Changes were discarded
    RolledBack,
}

impl TransactionStatus {
    /// Whether the transaction has been resolved
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Open)
    }

    /// Lowercase name for messages
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Open => "open",
            TransactionStatus::Committed => "committed",
            TransactionStatus::RolledBack => "rolled back",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of what a commit would apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingOperations {
    /// Staged upserts, including values materialized by reads
    pub upserts: usize,
    /// Staged tombstones
    pub deletes: usize,
}

impl PendingOperations {
    /// Total number of staged changes
    pub fn total(&self) -> usize {
        self.upserts + self.deletes
    }

    /// Whether nothing is staged
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Result of applying a staged table to a live store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyResult {
    /// Keys written
    pub upserts: usize,
    /// Keys deleted (tombstones whose key was present count, absent ones do not)
    pub deletes: usize,
}

impl ApplyResult {
    /// Total number of changes applied
    pub fn total_operations(&self) -> usize {
        self.upserts + self.deletes
    }
}

/// Buffered changes of one transaction, keyed by `K`
pub struct StagedChanges<K, V> {
    status: TransactionStatus,
    staged: BTreeMap<K, Staged<V>>,
}

impl<K: Ord, V> StagedChanges<K, V> {
    /// Open an empty table
    pub fn new() -> Self {
        StagedChanges {
            status: TransactionStatus::Open,
            staged: BTreeMap::new(),
        }
    }

    /// Current status
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Whether the table still accepts changes
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Fail with `TransactionClosed` unless open
    pub fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(SpeicherError::TransactionClosed {
                status: self.status.as_str(),
            })
        }
    }

    /// Staged entry for `key`, if any
    pub fn get<Q>(&self, key: &Q) -> Option<&Staged<V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.staged.get(key)
    }

    /// Mutable staged entry for `key`, if any
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut Staged<V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.staged.get_mut(key)
    }

    /// Whether `key` has any staged entry, tombstones included
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.staged.contains_key(key)
    }

    /// Stage an upsert, replacing whatever was staged for `key`
    pub fn upsert(&mut self, key: K, value: V) -> Result<()> {
        self.ensure_open()?;
        self.staged.insert(key, Staged::Upsert(value));
        Ok(())
    }

    /// Stage a deletion, replacing whatever was staged for `key`
    pub fn tombstone(&mut self, key: K) -> Result<()> {
        self.ensure_open()?;
        self.staged.insert(key, Staged::Tombstone);
        Ok(())
    }

    /// Stage a value read from the live store and return the staged copy
    ///
    /// Later reads of `key` in the same transaction see this copy, including
    /// any mutation made through the returned reference.
    pub fn materialize(&mut self, key: K, value: V) -> Result<&mut V> {
        self.ensure_open()?;
        let slot = match self.staged.entry(key) {
            btree_map::Entry::Vacant(vacant) => vacant.insert(Staged::Upsert(value)),
            btree_map::Entry::Occupied(occupied) => {
                let slot = occupied.into_mut();
                *slot = Staged::Upsert(value);
                slot
            }
        };
        match slot {
            Staged::Upsert(v) => Ok(v),
            Staged::Tombstone => unreachable!("slot was just filled with an upsert"),
        }
    }

    /// Staged upserts in key order
    pub fn upserts(&self) -> impl Iterator<Item = (&K, &V)> {
        self.staged.iter().filter_map(|(k, s)| s.value().map(|v| (k, v)))
    }

    /// Count staged changes
    pub fn pending_operations(&self) -> PendingOperations {
        let deletes = self.staged.values().filter(|s| s.is_tombstone()).count();
        PendingOperations {
            upserts: self.staged.len() - deletes,
            deletes,
        }
    }

    /// Mark committed and hand over the staged table for application
    ///
    /// Returns `None` if the table was already terminal.
    pub fn take_for_commit(&mut self) -> Option<BTreeMap<K, Staged<V>>> {
        if !self.is_open() {
            return None;
        }
        self.status = TransactionStatus::Committed;
        Some(mem::take(&mut self.staged))
    }

    /// Mark rolled back and discard every staged change
    ///
    /// Returns `false` if the table was already terminal.
    pub fn rollback(&mut self) -> bool {
        if !self.is_open() {
            return false;
        }
        self.status = TransactionStatus::RolledBack;
        self.staged.clear();
        true
    }
}

impl<K: Ord, V> Default for StagedChanges<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V> fmt::Debug for StagedChanges<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedChanges")
            .field("status", &self.status)
            .field("keys", &self.staged.keys().collect::<Vec<_>>())
            .finish()
    }
}
