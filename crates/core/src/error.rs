//! Error types for speicher
//!
//! Errors come in two tiers:
//!
//! - [`SpeicherError`]: recoverable conditions (I/O, decoding, validation)
//!   returned to the direct caller through [`Result`].
//! - [`Misuse`]: a broken caller contract (unbalanced unlock, access without
//!   the lock, clone type mismatch). These are never returned; they abort the
//!   current thread through [`Misuse::abort`].

use crate::types::StoreId;
use std::any::TypeId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for speicher operations
pub type Result<T> = std::result::Result<T, SpeicherError>;

/// Recoverable errors
#[derive(Debug, Error)]
pub enum SpeicherError {
    /// The persistence file exists but could not be opened or read
    #[error("failed to open file '{}'", path.display())]
    Open {
        /// File that failed
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: io::Error,
    },

    /// The directory holding a persistence file could not be created
    #[error("failed to create directory '{}'", path.display())]
    CreateDir {
        /// Directory that failed
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: io::Error,
    },

    /// Writing a snapshot to disk failed
    #[error("failed to write file '{}'", path.display())]
    Write {
        /// File that failed
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: io::Error,
    },

    /// The persistence file is not a valid JSON document for the store type
    #[error("failed to decode json file '{}'", path.display())]
    Decode {
        /// File that failed
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: serde_json::Error,
    },

    /// The store contents could not be serialized
    #[error("failed to encode json file '{}'", path.display())]
    Encode {
        /// File that failed
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: serde_json::Error,
    },

    /// No loader is registered for the file extension
    #[error("unable to find loader for '{}'", path.display())]
    UnsupportedFormat {
        /// Requested path
        path: PathBuf,
    },

    /// A list index was outside `0..len`
    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// List length at the time of the call
        len: usize,
    },

    /// The transaction was already committed or rolled back
    #[error("transaction is {status}")]
    TransactionClosed {
        /// Terminal status of the transaction
        status: &'static str,
    },

    /// A background thread could not be started
    #[error("failed to spawn {what} thread")]
    Spawn {
        /// What the thread was for
        what: &'static str,
        /// Underlying cause
        #[source]
        source: io::Error,
    },

    /// Persistence configuration was rejected
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SpeicherError {
    /// Path associated with the error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            SpeicherError::Open { path, .. }
            | SpeicherError::CreateDir { path, .. }
            | SpeicherError::Write { path, .. }
            | SpeicherError::Decode { path, .. }
            | SpeicherError::Encode { path, .. }
            | SpeicherError::UnsupportedFormat { path } => Some(path),
            _ => None,
        }
    }
}

/// Caller contract violations
///
/// A `Misuse` means the calling code is broken, not that the data is in an
/// unexpected state. It is never returned as a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Misuse {
    /// `unlock` without a matching `lock`
    #[error("unlock called without matching lock on store {0}")]
    UnmatchedUnlock(StoreId),

    /// `read_unlock` without a matching `read_lock`
    #[error("read_unlock called without matching read_lock on store {0}")]
    UnmatchedReadUnlock(StoreId),

    /// Store contents accessed through a State that does not hold the lock
    #[error("store {store} accessed without holding its {mode} lock")]
    LockNotHeld {
        /// Store that was accessed
        store: StoreId,
        /// "read" or "write"
        mode: &'static str,
    },

    /// A copier was handed a value of a different type than it was built for
    #[error("clone type mismatch: expected {expected}, got {actual:?}")]
    CloneTypeMismatch {
        /// Type the copier was built for
        expected: &'static str,
        /// Type id of the value presented
        actual: TypeId,
    },
}

impl Misuse {
    /// Abort the current thread with this violation
    #[track_caller]
    pub fn abort(self) -> ! {
        panic!("speicher: {}", self)
    }
}
