//! Deep-copy engine
//!
//! Every value crossing a store boundary goes through [`DeepClone`], so a
//! caller never holds memory that aliases the store's container and the store
//! never keeps memory the caller can still reach.
//!
//! Copy logic is generated per type at compile time:
//!
//! - std, parking_lot and crossbeam types are covered in `impls`
//! - structs use [`impl_deep_clone!`](crate::impl_deep_clone)
//! - types whose `Clone` is already deep use
//!   [`deep_clone_via_clone!`](crate::deep_clone_via_clone)
//! - trait objects use [`Polymorphic`] or
//!   [`deep_clone_trait_object!`](crate::deep_clone_trait_object)
//!
//! ## Rules
//!
//! | Kind | Result |
//! |------|--------|
//! | scalars, `String` | copied by value |
//! | `Box`, `Rc`, `Arc` | new allocation, target copied recursively |
//! | `Option` | `None` stays `None` |
//! | `Vec`, `VecDeque`, arrays, tuples | new storage, element-wise copy |
//! | maps and sets | new mapping, keys and values copied |
//! | `fn` pointers, [`Shared`] | shared, treated as immutable |
//! | channel handles | fresh, unrelated, empty channel |
//! | `Mutex`, `RwLock`, `Condvar`, `Once` | fresh and unlocked, never copied |

mod impls;
mod macros;

use crate::error::Misuse;
use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

/// Produce an independent copy sharing no mutable storage with `self`
pub trait DeepClone: Sized {
    /// Deep copy
    fn deep_clone(&self) -> Self;
}

// ============================================================================
// Shared: explicitly aliased, immutable values
// ============================================================================

/// A value that is shared by reference across copies
///
/// Use this for closures and other immutable state that does not need
/// isolation. Deep-cloning a `Shared` hands out the same allocation.
pub struct Shared<T: ?Sized>(Arc<T>);

impl<T> Shared<T> {
    /// Wrap a value
    pub fn new(value: T) -> Self {
        Shared(Arc::new(value))
    }
}

impl<T: ?Sized> Shared<T> {
    /// Whether two handles point at the same allocation
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl<T: ?Sized> From<Arc<T>> for Shared<T> {
    fn from(inner: Arc<T>) -> Self {
        Shared(inner)
    }
}

impl<T: ?Sized> Deref for Shared<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> DeepClone for Shared<T> {
    fn deep_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shared").field(&&*self.0).finish()
    }
}

// ============================================================================
// Polymorphic values
// ============================================================================

/// Type-erased deep-clonable value
///
/// `Box<dyn Polymorphic>` copies the underlying value and keeps its dynamic
/// type. Use [`downcast_ref`](trait.Polymorphic.html#method.downcast_ref) on
/// the trait object to get the concrete value back.
pub trait Polymorphic: Any + Send + Sync {
    /// Copy into a new box with the same dynamic type
    fn deep_clone_boxed(&self) -> Box<dyn Polymorphic>;

    /// Upcast for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: DeepClone + Any + Send + Sync> Polymorphic for T {
    fn deep_clone_boxed(&self) -> Box<dyn Polymorphic> {
        Box::new(self.deep_clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn Polymorphic {
    /// Borrow the concrete value if it is a `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    /// Mutably borrow the concrete value if it is a `T`
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }
}

impl DeepClone for Box<dyn Polymorphic> {
    fn deep_clone(&self) -> Self {
        (**self).deep_clone_boxed()
    }
}

// ============================================================================
// Cloner: a copier bound to one type
// ============================================================================

/// Copy function built for a single type
///
/// Statically typed calls go through [`Cloner::copy`]. [`Cloner::copy_any`]
/// accepts a type-erased value and aborts if it is not a `T`; handing a copier
/// the wrong type is a caller bug, not a data condition.
pub struct Cloner<T> {
    _marker: PhantomData<fn(&T) -> T>,
}

/// Build the copier for `T`
pub fn copy_constructor<T: DeepClone + 'static>() -> Cloner<T> {
    Cloner {
        _marker: PhantomData,
    }
}

impl<T: DeepClone + 'static> Cloner<T> {
    /// Copy a value of the type this copier was built for
    #[inline]
    pub fn copy(&self, value: &T) -> T {
        value.deep_clone()
    }

    /// Copy a type-erased value
    ///
    /// # Panics
    ///
    /// Aborts with [`Misuse::CloneTypeMismatch`] if `value` is not a `T`.
    #[track_caller]
    pub fn copy_any(&self, value: &dyn Any) -> T {
        match value.downcast_ref::<T>() {
            Some(v) => v.deep_clone(),
            None => Misuse::CloneTypeMismatch {
                expected: type_name::<T>(),
                actual: (*value).type_id(),
            }
            .abort(),
        }
    }
}

impl<T> Clone for Cloner<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Cloner<T> {}

impl<T> fmt::Debug for Cloner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cloner<{}>", type_name::<T>())
    }
}
