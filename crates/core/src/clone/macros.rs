//! Macros generating `DeepClone` implementations

/// Implement [`DeepClone`](crate::clone::DeepClone) for a struct field by field
///
/// Every listed field must itself implement `DeepClone`. All fields must be
/// listed.
///
/// Lock fields (`Mutex<T>`, `RwLock<T>`) come out fresh and hold
/// `T::default()`: whatever was inside the source lock is not copied. Keep
/// data that must be preserved in ordinary fields beside the lock.
///
/// ```
/// use speicher_core::{impl_deep_clone, DeepClone};
///
/// struct Point { x: i32, y: i32, tags: Vec<String> }
/// impl_deep_clone!(Point { x, y, tags });
///
/// struct Pair(String, u8);
/// impl_deep_clone!(Pair(0, 1));
///
/// struct Boxed<T> { inner: Box<T> }
/// impl_deep_clone!(Boxed<T> { inner });
///
/// let p = Point { x: 1, y: 2, tags: vec!["a".into()] };
/// assert_eq!(p.deep_clone().tags, p.tags);
/// ```
#[macro_export]
macro_rules! impl_deep_clone {
    ($name:ident { $($field:ident),* $(,)? }) => {
        impl $crate::clone::DeepClone for $name {
            fn deep_clone(&self) -> Self {
                $name {
                    $($field: $crate::clone::DeepClone::deep_clone(&self.$field),)*
                }
            }
        }
    };
    ($name:ident < $($gen:ident),+ $(,)? > { $($field:ident),* $(,)? }) => {
        impl<$($gen: $crate::clone::DeepClone),+> $crate::clone::DeepClone for $name<$($gen),+> {
            fn deep_clone(&self) -> Self {
                $name {
                    $($field: $crate::clone::DeepClone::deep_clone(&self.$field),)*
                }
            }
        }
    };
    ($name:ident ( $($idx:tt),* $(,)? )) => {
        impl $crate::clone::DeepClone for $name {
            fn deep_clone(&self) -> Self {
                $name($($crate::clone::DeepClone::deep_clone(&self.$idx),)*)
            }
        }
    };
}

/// Implement [`DeepClone`](crate::clone::DeepClone) by delegating to `Clone`
///
/// Only correct when the type's `Clone` already shares no mutable storage,
/// e.g. plain enums and structs of owned scalars.
#[macro_export]
macro_rules! deep_clone_via_clone {
    ($($t:ty),+ $(,)?) => {
        $(
            impl $crate::clone::DeepClone for $t {
                #[inline]
                fn deep_clone(&self) -> Self {
                    ::core::clone::Clone::clone(self)
                }
            }
        )+
    };
}

/// Implement [`DeepClone`](crate::clone::DeepClone) for `Box<dyn Trait>`
///
/// The trait must expose a method returning `Box<dyn Trait>` that copies the
/// concrete value; the macro takes that method's name.
///
/// ```
/// use speicher_core::{deep_clone_trait_object, DeepClone};
///
/// trait Shape {
///     fn sides(&self) -> u32;
///     fn boxed_copy(&self) -> Box<dyn Shape>;
/// }
///
/// struct Square;
/// impl Shape for Square {
///     fn sides(&self) -> u32 { 4 }
///     fn boxed_copy(&self) -> Box<dyn Shape> { Box::new(Square) }
/// }
///
/// deep_clone_trait_object!(Shape, boxed_copy);
///
/// let shape: Box<dyn Shape> = Box::new(Square);
/// assert_eq!(shape.deep_clone().sides(), 4);
/// ```
#[macro_export]
macro_rules! deep_clone_trait_object {
    ($tr:path, $method:ident) => {
        impl $crate::clone::DeepClone for ::std::boxed::Box<dyn $tr> {
            fn deep_clone(&self) -> Self {
                (**self).$method()
            }
        }
    };
}
