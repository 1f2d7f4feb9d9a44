//! Persistence configuration via `speicher.toml`
//!
//! Every file-backed store is opened with a [`PersistConfig`]. The default
//! suits interactive use; tests use [`PersistConfig::for_testing`] to keep
//! debounce timers short.

use serde::{Deserialize, Serialize};
use speicher_core::SpeicherError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "speicher.toml";

/// Errors from loading or validating a [`PersistConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying cause
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this structure
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("{0}")]
    Invalid(String),
}

impl From<ConfigError> for SpeicherError {
    fn from(e: ConfigError) -> Self {
        SpeicherError::Config(e.to_string())
    }
}

/// Persistence settings for one store
///
/// # Example
///
/// ```toml
/// # Debounce delay after the last change (ms)
/// quiet_period_ms = 500
/// # Upper bound on how stale the file may get under continuous writes (ms)
/// max_wait_ms = 5000
/// auto_save = true
/// pretty = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    /// Delay after the most recent change before a save runs
    pub quiet_period_ms: u64,
    /// Longest a pending change may wait for a save
    pub max_wait_ms: u64,
    /// Run the background scheduler; when false only explicit saves persist
    pub auto_save: bool,
    /// Pretty-print the JSON file
    pub pretty: bool,
}

impl Default for PersistConfig {
    fn default() -> Self {
        PersistConfig {
            quiet_period_ms: 500,
            max_wait_ms: 5000,
            auto_save: true,
            pretty: false,
        }
    }
}

impl PersistConfig {
    /// Short timers for tests
    pub fn for_testing() -> Self {
        PersistConfig {
            quiet_period_ms: 20,
            max_wait_ms: 200,
            ..Self::default()
        }
    }

    /// Set the quiet period
    pub fn with_quiet_period(mut self, period: Duration) -> Self {
        self.quiet_period_ms = period.as_millis() as u64;
        self
    }

    /// Set the max-wait ceiling
    pub fn with_max_wait(mut self, wait: Duration) -> Self {
        self.max_wait_ms = wait.as_millis() as u64;
        self
    }

    /// Enable or disable background saving
    pub fn with_auto_save(mut self, enabled: bool) -> Self {
        self.auto_save = enabled;
        self
    }

    /// Enable or disable pretty-printed output
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Quiet period as a `Duration`
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    /// Max-wait ceiling as a `Duration`
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quiet_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "quiet_period_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_wait_ms < self.quiet_period_ms {
            return Err(ConfigError::Invalid(format!(
                "max_wait_ms ({}) must be at least quiet_period_ms ({})",
                self.max_wait_ms, self.quiet_period_ms
            )));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: PersistConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Default config file content with comments
    pub fn default_toml() -> &'static str {
        r#"# speicher persistence configuration
#
# Delay after the last change before the file is rewritten (ms)
quiet_period_ms = 500

# Under continuous writes, the file is rewritten at least this often (ms)
max_wait_ms = 5000

# Save in the background; when false only explicit save() calls persist
auto_save = true

# Pretty-print JSON output
pretty = false
"#
    }
}
