//! speicher - embeddable, thread-safe, JSON-persisted stores
//!
//! speicher keeps generic values in two kinds of store, a string-keyed
//! [`MapStore`] and an ordered [`ListStore`], each optionally backed by a JSON
//! file that is rewritten in the background after changes settle.
//!
//! # Quick Start
//!
//! ```
//! use speicher::{load_map_with, PersistConfig};
//!
//! let dir = tempfile::tempdir()?;
//! let users = load_map_with::<u32>(dir.path().join("users.json"), PersistConfig::for_testing())?;
//!
//! users.set("ada", &36);
//! assert_eq!(users.get("ada"), Some(36));
//!
//! // Several updates, applied together or not at all
//! users.transaction(|tx| {
//!     tx.set("bob", &41)?;
//!     tx.delete("ada")
//! })?;
//! assert!(!users.has("ada"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Holding Locks Across Stores
//!
//! A [`State`] tracks one caller's read and write interest per store, so the
//! same caller can re-enter or upgrade a lock without deadlocking itself:
//!
//! ```
//! use speicher::{ListStore, MapStore, State};
//!
//! let stock = MapStore::<u32>::ephemeral();
//! let orders = ListStore::<String>::ephemeral();
//! stock.set("widget", &3);
//!
//! let mut state = State::new();
//! state.lock(&*stock);
//! state.lock(&*orders);
//! if let Some(count) = stock.locked_mut(&mut state).get_mut("widget") {
//!     *count -= 1;
//! }
//! orders.locked_mut(&mut state).push(&"widget".to_string());
//! drop(state);
//!
//! assert_eq!(stock.get("widget"), Some(2));
//! assert_eq!(orders.len(), 1);
//! ```
//!
//! # Architecture
//!
//! - `speicher-core`: errors, store identity and the [`DeepClone`] engine
//! - `speicher-concurrency`: the lock [`State`] and staged transaction tables
//! - `speicher-durability`: JSON snapshots, [`PersistConfig`] and the
//!   debounced [`SaveScheduler`]
//! - `speicher-primitives`: the stores and the lazy [`Query`] pipeline

pub use speicher_concurrency::{
    read, read_e, write, write_e, ApplyResult, Guarded, PendingOperations, State,
    TransactionStatus,
};
pub use speicher_core::{
    copy_constructor, deep_clone_trait_object, deep_clone_via_clone, impl_deep_clone, Cloner,
    DeepClone, Lockable, Misuse, Polymorphic, Result, Shared, SpeicherError, StoreId,
};
pub use speicher_durability::{
    ConfigError, Persist, PersistConfig, SaveScheduler, SchedulerStats, CONFIG_FILE_NAME,
};
pub use speicher_primitives::{
    load_list, load_list_with, load_map, load_map_with, ListData, ListStore, MapData, MapStore,
    MapTx, Query, RangeHandle, Storable,
};
