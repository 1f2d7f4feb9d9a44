//! Store primitives for speicher
//!
//! Provides the two in-memory stores:
//! - **MapStore**: string-keyed values with copy-on-write transactions
//! - **ListStore**: ordered, index-addressed values
//!
//! ## Value Isolation
//!
//! Every value stored or returned is deep-cloned (see
//! [`speicher_core::DeepClone`]). A caller never holds a reference into a
//! store's contents except through a lock it holds.
//!
//! ## Persistence
//!
//! Stores opened with [`load_map`] or [`load_list`] are backed by a JSON
//! file and saved in the background after changes settle. Dropping the last
//! handle flushes a pending save. [`MapStore::ephemeral`] and
//! [`ListStore::ephemeral`] never touch disk.
//!
//! ## Queries
//!
//! `select()` returns a lazy [`Query`] that clones one element per pull and
//! can be narrowed with `filter`, `order_by` and `limit`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod list;
pub mod map;
pub mod query;
pub mod range;
mod store;

pub use list::{load_list, load_list_with, ListData, ListStore};
pub use map::{load_map, load_map_with, MapData, MapStore, MapTx};
pub use query::Query;
pub use range::RangeHandle;
pub use store::Storable;
