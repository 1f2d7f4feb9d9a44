//! `DeepClone` implementations for std, parking_lot and crossbeam types

use super::DeepClone;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::{BuildHasher, Hash};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{
    AtomicBool, AtomicI32, AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering,
};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

// ============================================================================
// Scalars and immutable leaves
// ============================================================================

macro_rules! by_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl DeepClone for $t {
                #[inline]
                fn deep_clone(&self) -> Self {
                    self.clone()
                }
            }
        )*
    };
}

by_value!(
    bool, char, (), i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    String, PathBuf, Duration, Instant, SystemTime, &'static str, serde_json::Value,
);

macro_rules! atomic_by_value {
    ($($t:ident),* $(,)?) => {
        $(
            impl DeepClone for $t {
                fn deep_clone(&self) -> Self {
                    $t::new(self.load(Ordering::Relaxed))
                }
            }
        )*
    };
}

atomic_by_value!(AtomicBool, AtomicI32, AtomicI64, AtomicU32, AtomicU64, AtomicUsize);

// ============================================================================
// Owning pointers: fresh allocation, recurse into the target
// ============================================================================

impl<T: DeepClone> DeepClone for Box<T> {
    fn deep_clone(&self) -> Self {
        Box::new((**self).deep_clone())
    }
}

impl<T: DeepClone> DeepClone for Rc<T> {
    fn deep_clone(&self) -> Self {
        Rc::new((**self).deep_clone())
    }
}

impl<T: DeepClone> DeepClone for Arc<T> {
    fn deep_clone(&self) -> Self {
        Arc::new((**self).deep_clone())
    }
}

impl<T: DeepClone> DeepClone for Option<T> {
    fn deep_clone(&self) -> Self {
        self.as_ref().map(DeepClone::deep_clone)
    }
}

impl<T: DeepClone, E: DeepClone> DeepClone for Result<T, E> {
    fn deep_clone(&self) -> Self {
        match self {
            Ok(v) => Ok(v.deep_clone()),
            Err(e) => Err(e.deep_clone()),
        }
    }
}

// ============================================================================
// Sequences
// ============================================================================

impl<T: DeepClone> DeepClone for Vec<T> {
    fn deep_clone(&self) -> Self {
        let mut out = Vec::with_capacity(self.capacity());
        out.extend(self.iter().map(DeepClone::deep_clone));
        out
    }
}

impl<T: DeepClone> DeepClone for VecDeque<T> {
    fn deep_clone(&self) -> Self {
        let mut out = VecDeque::with_capacity(self.capacity());
        out.extend(self.iter().map(DeepClone::deep_clone));
        out
    }
}

impl<T: DeepClone, const N: usize> DeepClone for [T; N] {
    fn deep_clone(&self) -> Self {
        std::array::from_fn(|i| self[i].deep_clone())
    }
}

macro_rules! tuple_impl {
    ($($name:ident . $idx:tt),+) => {
        impl<$($name: DeepClone),+> DeepClone for ($($name,)+) {
            fn deep_clone(&self) -> Self {
                ($(self.$idx.deep_clone(),)+)
            }
        }
    };
}

tuple_impl!(A.0);
tuple_impl!(A.0, B.1);
tuple_impl!(A.0, B.1, C.2);
tuple_impl!(A.0, B.1, C.2, D.3);
tuple_impl!(A.0, B.1, C.2, D.3, E.4);

// ============================================================================
// Mappings: recurse over keys and values
// ============================================================================

impl<K, V, S> DeepClone for HashMap<K, V, S>
where
    K: DeepClone + Eq + Hash,
    V: DeepClone,
    S: BuildHasher + Clone,
{
    fn deep_clone(&self) -> Self {
        let mut out = HashMap::with_capacity_and_hasher(self.len(), self.hasher().clone());
        for (k, v) in self {
            out.insert(k.deep_clone(), v.deep_clone());
        }
        out
    }
}

impl<T, S> DeepClone for HashSet<T, S>
where
    T: DeepClone + Eq + Hash,
    S: BuildHasher + Clone,
{
    fn deep_clone(&self) -> Self {
        let mut out = HashSet::with_capacity_and_hasher(self.len(), self.hasher().clone());
        out.extend(self.iter().map(DeepClone::deep_clone));
        out
    }
}

impl<K: DeepClone + Ord, V: DeepClone> DeepClone for BTreeMap<K, V> {
    fn deep_clone(&self) -> Self {
        self.iter()
            .map(|(k, v)| (k.deep_clone(), v.deep_clone()))
            .collect()
    }
}

impl<T: DeepClone + Ord> DeepClone for BTreeSet<T> {
    fn deep_clone(&self) -> Self {
        self.iter().map(DeepClone::deep_clone).collect()
    }
}

// ============================================================================
// Function values: shared, never copied
// ============================================================================

macro_rules! fn_ptr_impl {
    ($($arg:ident),*) => {
        impl<R $(, $arg)*> DeepClone for fn($($arg),*) -> R {
            #[inline]
            fn deep_clone(&self) -> Self {
                *self
            }
        }
    };
}

fn_ptr_impl!();
fn_ptr_impl!(A);
fn_ptr_impl!(A, B);
fn_ptr_impl!(A, B, C);
fn_ptr_impl!(A, B, C, D);

// ============================================================================
// Channel handles: replaced by a fresh, unrelated, empty channel
// ============================================================================

impl<T> DeepClone for crossbeam_channel::Sender<T> {
    fn deep_clone(&self) -> Self {
        let (tx, _rx) = crossbeam_channel::bounded(0);
        tx
    }
}

impl<T> DeepClone for crossbeam_channel::Receiver<T> {
    fn deep_clone(&self) -> Self {
        let (_tx, rx) = crossbeam_channel::bounded(0);
        rx
    }
}

// ============================================================================
// Synchronization primitives: never copied, always fresh and unlocked
// ============================================================================

/// The copy is a new unlocked mutex holding `T::default()`
///
/// The value inside the source is dropped from the copy, so data that has to
/// survive a store round trip belongs in a field next to the lock, not in it.
impl<T: Default> DeepClone for parking_lot::Mutex<T> {
    fn deep_clone(&self) -> Self {
        parking_lot::Mutex::new(T::default())
    }
}

/// The copy holds `T::default()`; see the `Mutex` impl
impl<T: Default> DeepClone for parking_lot::RwLock<T> {
    fn deep_clone(&self) -> Self {
        parking_lot::RwLock::new(T::default())
    }
}

impl DeepClone for parking_lot::Condvar {
    fn deep_clone(&self) -> Self {
        parking_lot::Condvar::new()
    }
}

impl DeepClone for parking_lot::Once {
    fn deep_clone(&self) -> Self {
        parking_lot::Once::new()
    }
}

/// The copy holds `T::default()`; see the `parking_lot::Mutex` impl
impl<T: Default> DeepClone for std::sync::Mutex<T> {
    fn deep_clone(&self) -> Self {
        std::sync::Mutex::new(T::default())
    }
}

/// The copy holds `T::default()`; see the `parking_lot::Mutex` impl
impl<T: Default> DeepClone for std::sync::RwLock<T> {
    fn deep_clone(&self) -> Self {
        std::sync::RwLock::new(T::default())
    }
}

impl DeepClone for std::sync::Condvar {
    fn deep_clone(&self) -> Self {
        std::sync::Condvar::new()
    }
}

impl DeepClone for std::sync::Once {
    fn deep_clone(&self) -> Self {
        std::sync::Once::new()
    }
}
