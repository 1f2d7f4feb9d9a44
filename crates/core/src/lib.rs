//! Core types and traits for speicher
//!
//! This crate defines the pieces every other speicher crate builds on:
//! - StoreId: process-unique store identity
//! - Lockable: the view of a store that lock coordination needs
//! - DeepClone: the deep-copy engine used at every store boundary
//! - Error: recoverable errors and caller-contract violations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clone;
pub mod error;
pub mod traits;
pub mod types;

pub use clone::{copy_constructor, Cloner, DeepClone, Polymorphic, Shared};
pub use error::{Misuse, Result, SpeicherError};
pub use traits::Lockable;
pub use types::StoreId;

// Re-exported so downstream crates name the same lock type
pub use parking_lot::RawRwLock;
