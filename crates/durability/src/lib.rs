//! Durability layer for speicher
//!
//! This crate handles everything that touches disk:
//!
//! - JSON snapshots: whole-document load and atomic save
//! - Save scheduling: debounced background saves per store
//! - Configuration: persistence timers and output format (`speicher.toml`)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod json_file;
pub mod scheduler;

pub use config::{ConfigError, PersistConfig, CONFIG_FILE_NAME};
pub use json_file::{check_format, load_json, save_json};
pub use scheduler::{Persist, SaveScheduler, SchedulerStats};
