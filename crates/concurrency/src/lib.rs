//! Concurrency layer for speicher
//!
//! This crate provides the two ways to make several operations atomic:
//! - State: per-caller recursive/upgradable lock coordination across stores
//! - Scoped helpers (`write`, `read`, ...): one hold for the length of a closure
//! - StagedChanges: the copy-on-write table behind Map transactions
//!
//! A transaction never consults a [`State`], and a `State` never stages
//! changes. Use a transaction for multi-step updates on one Map store; use a
//! `State` to hold locks on several stores at once.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod scope;
pub mod state;
pub mod transaction;

pub use scope::{read, read_e, write, write_e, Guarded};
pub use state::State;
pub use transaction::{
    ApplyResult, PendingOperations, Staged, StagedChanges, TransactionStatus,
};
