//! Shared store plumbing
//!
//! Map and List stores differ only in their container. Everything else
//! (identity, the lock around the container, the persistence target and the
//! save scheduler) lives in [`StoreCore`].

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::de::DeserializeOwned;
use serde::Serialize;
use speicher_core::{DeepClone, RawRwLock, Result, StoreId};
use speicher_durability::{
    load_json, save_json, Persist, PersistConfig, SaveScheduler, SchedulerStats,
};
use std::path::{Path, PathBuf};
use std::sync::Weak;
use tracing::warn;

/// Element types a store can hold
///
/// Implemented for every type that can be deep-cloned, serialized and shared
/// across threads.
pub trait Storable: DeepClone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Storable for T where T: DeepClone + Serialize + DeserializeOwned + Send + Sync + 'static {}

pub(crate) struct StoreCore<D: Serialize> {
    id: StoreId,
    data: RwLock<D>,
    path: Option<PathBuf>,
    pretty: bool,
    /// Serializes saves from callers, the worker and drop
    save_lock: Mutex<()>,
    scheduler: Option<SaveScheduler>,
}

impl<D: Serialize> StoreCore<D> {
    pub(crate) fn ephemeral(data: D) -> Self {
        StoreCore {
            id: StoreId::next(),
            data: RwLock::new(data),
            path: None,
            pretty: false,
            save_lock: Mutex::new(()),
            scheduler: None,
        }
    }

    /// Load `path`, falling back to `D::default()` when the file is missing
    pub(crate) fn load(path: &Path, config: &PersistConfig) -> Result<Self>
    where
        D: DeserializeOwned + Default,
    {
        config.validate()?;
        let data = load_json::<D>(path)?.unwrap_or_default();
        let id = StoreId::next();
        let scheduler = config
            .auto_save
            .then(|| SaveScheduler::new(id.to_string(), config));

        Ok(StoreCore {
            id,
            data: RwLock::new(data),
            path: Some(path.to_path_buf()),
            pretty: config.pretty,
            save_lock: Mutex::new(()),
            scheduler,
        })
    }

    /// Start background saving for the store owning this core
    pub(crate) fn start(&self, owner: Weak<dyn Persist>) -> Result<()> {
        match &self.scheduler {
            Some(scheduler) => scheduler.start(owner),
            None => Ok(()),
        }
    }

    pub(crate) fn id(&self) -> StoreId {
        self.id
    }

    pub(crate) fn raw_lock(&self) -> &RawRwLock {
        // SAFETY: the raw lock is only driven through `State`, which pairs
        // every acquisition with a release.
        unsafe { self.data.raw() }
    }

    pub(crate) fn data_ptr(&self) -> *mut D {
        self.data.data_ptr()
    }

    /// Shared hold for one operation
    ///
    /// Recursive so that a caller already holding the store for reading
    /// through a `State` can still use single-operation reads.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, D> {
        self.data.read_recursive()
    }

    /// Exclusive hold for one operation
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, D> {
        self.data.write()
    }

    /// Record a change; call after the exclusive hold is released
    pub(crate) fn changed(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.notify();
        }
    }

    pub(crate) fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _saving = self.save_lock.lock();
        let data = self.read();
        save_json(path, &*data, self.pretty)
    }

    pub(crate) fn stats(&self) -> Option<SchedulerStats> {
        self.scheduler.as_ref().map(SaveScheduler::stats)
    }
}

impl<D: Serialize + Send + Sync> StoreCore<D> {
    pub(crate) fn flush(&self) -> Result<bool> {
        match &self.scheduler {
            Some(scheduler) => scheduler.flush(self),
            None => Ok(false),
        }
    }
}

impl<D: Serialize + Send + Sync> Persist for StoreCore<D> {
    fn save(&self) -> Result<()> {
        StoreCore::save(self)
    }
}

impl<D: Serialize> Drop for StoreCore<D> {
    fn drop(&mut self) {
        let Some(scheduler) = &self.scheduler else {
            return;
        };
        scheduler.shutdown();
        if scheduler.take_pending() {
            if let Err(e) = self.save() {
                warn!(target: "speicher::persist", store = %self.id, error = %e, "Final save on drop failed");
            }
        }
    }
}

/// Deep-clone every element of an iterator of references
pub(crate) fn clone_all<'a, T: DeepClone + 'a>(items: impl Iterator<Item = &'a T>) -> Vec<T> {
    items.map(DeepClone::deep_clone).collect()
}
