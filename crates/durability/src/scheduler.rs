//! Debounced background saves
//!
//! Each persistent store owns one [`SaveScheduler`] with one worker thread.
//! Every change notification pushes the quiet-period deadline out; the first
//! notification after a save also starts a max-wait deadline. The worker saves
//! once when either deadline passes, so a burst of changes becomes a single
//! write and continuous changes still reach disk at least once per max-wait.
//!
//! The worker holds only a weak reference to its store. Saves are skipped once
//! the store is gone.

use crate::config::PersistConfig;
use parking_lot::{Condvar, Mutex, MutexGuard};
use speicher_core::{Result, SpeicherError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Something that can write itself to disk
pub trait Persist: Send + Sync {
    /// Write the current contents
    fn save(&self) -> Result<()>;
}

/// Scheduler metrics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    /// A change is waiting for a save
    pub pending: bool,
    /// Saves that completed successfully
    pub saves_completed: u64,
    /// Saves that returned an error
    pub save_failures: u64,
}

#[derive(Default)]
struct Timers {
    quiet_deadline: Option<Instant>,
    max_deadline: Option<Instant>,
    shutdown: bool,
}

impl Timers {
    fn next_deadline(&self) -> Option<Instant> {
        match (self.quiet_deadline, self.max_deadline) {
            (Some(q), Some(m)) => Some(q.min(m)),
            (q, m) => q.or(m),
        }
    }

    fn take_pending(&mut self) -> bool {
        let pending = self.quiet_deadline.is_some() || self.max_deadline.is_some();
        self.quiet_deadline = None;
        self.max_deadline = None;
        pending
    }
}

struct Inner {
    timers: Mutex<Timers>,
    wake: Condvar,
    quiet_period: Duration,
    max_wait: Duration,
    saves_completed: AtomicU64,
    save_failures: AtomicU64,
}

impl Inner {
    fn record(&self, result: &Result<()>) {
        match result {
            Ok(()) => {
                self.saves_completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.save_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Coalesces change notifications into bounded-latency saves
pub struct SaveScheduler {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
    name: String,
}

impl SaveScheduler {
    /// Create a scheduler with the config's timers
    ///
    /// No thread runs until [`start`](Self::start). Notifications received
    /// before that are remembered.
    pub fn new(name: impl Into<String>, config: &PersistConfig) -> Self {
        SaveScheduler {
            inner: Arc::new(Inner {
                timers: Mutex::new(Timers::default()),
                wake: Condvar::new(),
                quiet_period: config.quiet_period(),
                max_wait: config.max_wait(),
                saves_completed: AtomicU64::new(0),
                save_failures: AtomicU64::new(0),
            }),
            worker: Mutex::new(None),
            name: name.into(),
        }
    }

    /// Spawn the worker thread saving `target`
    ///
    /// Calling `start` again while a worker is running does nothing.
    pub fn start(&self, target: Weak<dyn Persist>) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name(format!("speicher-save-{}", self.name))
            .spawn(move || worker_loop(&inner, &target))
            .map_err(|source| SpeicherError::Spawn {
                what: "save scheduler",
                source,
            })?;
        *worker = Some(handle);
        Ok(())
    }

    /// Record a change
    pub fn notify(&self) {
        let mut timers = self.inner.timers.lock();
        if timers.shutdown {
            return;
        }
        let now = Instant::now();
        timers.quiet_deadline = Some(now + self.inner.quiet_period);
        if timers.max_deadline.is_none() {
            timers.max_deadline = Some(now + self.inner.max_wait);
        }
        drop(timers);
        self.inner.wake.notify_one();
    }

    /// Cancel pending deadlines, returning whether a save was pending
    pub fn take_pending(&self) -> bool {
        self.inner.timers.lock().take_pending()
    }

    /// Save `target` now if a save is pending
    ///
    /// Returns `Ok(true)` when a save ran.
    pub fn flush(&self, target: &dyn Persist) -> Result<bool> {
        if !self.take_pending() {
            return Ok(false);
        }
        let result = target.save();
        self.inner.record(&result);
        result.map(|()| true)
    }

    /// Current counters
    pub fn stats(&self) -> SchedulerStats {
        let pending = self.inner.timers.lock().next_deadline().is_some();
        SchedulerStats {
            pending,
            saves_completed: self.inner.saves_completed.load(Ordering::Relaxed),
            save_failures: self.inner.save_failures.load(Ordering::Relaxed),
        }
    }

    /// Stop the worker
    ///
    /// Pending deadlines are left in place for a final [`flush`](Self::flush).
    /// When called from the worker thread itself (the store was dropped by
    /// its own save), the worker is told to exit but not joined.
    pub fn shutdown(&self) {
        self.inner.timers.lock().shutdown = true;
        self.inner.wake.notify_all();

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!(target: "speicher::persist", store = %self.name, "Save worker panicked");
            }
        }
    }
}

impl Drop for SaveScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SaveScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveScheduler")
            .field("name", &self.name)
            .field("stats", &self.stats())
            .finish()
    }
}

fn worker_loop(inner: &Inner, target: &Weak<dyn Persist>) {
    let mut timers = inner.timers.lock();
    loop {
        if timers.shutdown {
            return;
        }
        match timers.next_deadline() {
            None => inner.wake.wait(&mut timers),
            Some(at) if Instant::now() < at => {
                inner.wake.wait_until(&mut timers, at);
            }
            Some(_) => {
                timers.take_pending();
                MutexGuard::unlocked(&mut timers, || run_save(inner, target));
            }
        }
    }
}

fn run_save(inner: &Inner, target: &Weak<dyn Persist>) {
    let Some(store) = target.upgrade() else {
        debug!(target: "speicher::persist", "Store dropped before scheduled save");
        return;
    };
    let result = store.save();
    inner.record(&result);
    if let Err(e) = result {
        warn!(target: "speicher::persist", error = %e, "Background save failed");
    }
}
