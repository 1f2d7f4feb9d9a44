//! Scoped lock acquisition
//!
//! Each helper opens a fresh [`State`], takes one hold on the store, runs the
//! closure against the store's contents and releases the hold on every exit
//! path, including an early `Err` and panic unwinding.
//!
//! ```
//! use speicher_concurrency::{read, write};
//! # use speicher_concurrency::Guarded;
//! # use speicher_core::{Lockable, RawRwLock, StoreId};
//! # use parking_lot::RwLock;
//! # struct Counter { id: StoreId, data: RwLock<u64> }
//! # unsafe impl Lockable for Counter {
//! #     fn store_id(&self) -> StoreId { self.id }
//! #     fn raw_lock(&self) -> &RawRwLock { unsafe { self.data.raw() } }
//! # }
//! # unsafe impl Guarded for Counter {
//! #     type Data = u64;
//! #     fn data_ptr(&self) -> *mut u64 { self.data.data_ptr() }
//! # }
//! # let counter = Counter { id: StoreId::next(), data: RwLock::new(0) };
//! write(&counter, |n| *n += 1);
//! assert_eq!(read(&counter, |n| *n), 1);
//! ```

use crate::state::State;
use speicher_core::Lockable;

/// A lockable store whose contents the helpers can reach
///
/// # Safety
///
/// `data_ptr` must always return the same pointer, to a container that lives
/// as long as the store and is only ever read or written under the lock
/// returned by [`Lockable::raw_lock`].
pub unsafe trait Guarded: Lockable {
    /// Container type guarded by the store's lock
    type Data;

    /// Pointer to the guarded container
    fn data_ptr(&self) -> *mut Self::Data;
}

/// Run `f` with exclusive access to the store's contents
pub fn write<G, R, F>(store: &G, f: F) -> R
where
    G: Guarded,
    F: FnOnce(&mut G::Data) -> R,
{
    let mut state = State::new();
    state.lock(store);
    f(state.access_mut(store))
}

/// Like [`write`], for closures that can fail
///
/// The hold is released whether `f` returns `Ok` or `Err`.
pub fn write_e<G, R, E, F>(store: &G, f: F) -> Result<R, E>
where
    G: Guarded,
    F: FnOnce(&mut G::Data) -> Result<R, E>,
{
    write(store, f)
}

/// Run `f` with shared access to the store's contents
pub fn read<G, R, F>(store: &G, f: F) -> R
where
    G: Guarded,
    F: FnOnce(&G::Data) -> R,
{
    let mut state = State::new();
    state.read_lock(store);
    f(state.access(store))
}

/// Like [`read`], for closures that can fail
pub fn read_e<G, R, E, F>(store: &G, f: F) -> Result<R, E>
where
    G: Guarded,
    F: FnOnce(&G::Data) -> Result<R, E>,
{
    read(store, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::{RawRwLock, RwLock};
    use speicher_core::StoreId;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    struct Counter {
        id: StoreId,
        data: RwLock<u64>,
        changes: AtomicUsize,
    }

    impl Counter {
        fn new() -> Self {
            Counter {
                id: StoreId::next(),
                data: RwLock::new(0),
                changes: AtomicUsize::new(0),
            }
        }
    }

    unsafe impl Lockable for Counter {
        fn store_id(&self) -> StoreId {
            self.id
        }

        fn raw_lock(&self) -> &RawRwLock {
            unsafe { self.data.raw() }
        }

        fn mark_changed(&self) {
            self.changes.fetch_add(1, Ordering::SeqCst);
        }
    }

    unsafe impl Guarded for Counter {
        type Data = u64;

        fn data_ptr(&self) -> *mut u64 {
            self.data.data_ptr()
        }
    }

    #[test]
    fn test_write_then_read() {
        let counter = Counter::new();
        let returned = write(&counter, |n| {
            *n += 5;
            *n
        });
        assert_eq!(returned, 5);
        assert_eq!(read(&counter, |n| *n), 5);
        assert_eq!(counter.changes.load(Ordering::SeqCst), 1);
        assert!(counter.data.try_write().is_some());
    }

    #[test]
    fn test_write_e_releases_on_err() {
        let counter = Counter::new();
        let result: Result<(), &str> = write_e(&counter, |n| {
            *n = 9;
            Err("stop")
        });
        assert_eq!(result, Err("stop"));
        assert!(counter.data.try_write().is_some());
        assert_eq!(*counter.data.read(), 9);
    }

    #[test]
    fn test_read_e_passes_value_through() {
        let counter = Counter::new();
        let result: Result<u64, ()> = read_e(&counter, |n| Ok(*n + 1));
        assert_eq!(result, Ok(1));
        assert!(counter.data.try_write().is_some());
    }

    #[test]
    fn test_write_releases_on_panic() {
        let counter = Counter::new();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            write(&counter, |_| panic!("boom"));
        }));
        assert!(outcome.is_err());
        assert!(counter.data.try_write().is_some());
        assert_eq!(counter.changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_writers_are_mutually_exclusive() {
        let counter = Arc::new(Counter::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        write(&*counter, |n| {
                            let seen = *n;
                            thread::yield_now();
                            *n = seen + 1;
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(read(&*counter, |n| *n), 4000);
    }
}
