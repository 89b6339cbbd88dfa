//! TOML configuration for the datastore.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::EngineError;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatastoreConfig {
    /// Storage backend selection.
    pub backend: BackendSection,
    /// Counter retry tuning.
    pub counter: CounterSection,
    /// Record storage behavior.
    pub records: RecordsSection,
}

impl DatastoreConfig {
    /// Parse a configuration from TOML text. Missing sections and fields
    /// take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, EngineError> {
        Ok(toml::from_str(text)?)
    }
}

/// Which storage backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-memory tables; data does not survive the process.
    Memory,
    /// File-backed tables under a data directory.
    File,
}

/// `[backend]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    /// Backend type: `"memory"` (default) or `"file"`.
    pub kind: BackendKind,
    /// Data directory for the file backend.
    pub path: Option<PathBuf>,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            kind: BackendKind::Memory,
            path: None,
        }
    }
}

/// `[counter]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CounterSection {
    /// Attempts before a counter operation fails terminally.
    pub max_retries: u32,
}

impl Default for CounterSection {
    fn default() -> Self {
        Self { max_retries: 100 }
    }
}

/// `[records]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RecordsSection {
    /// How many days back a record read falls when the current time slice
    /// of a time-sliced table has no value.
    pub slice_lookback_days: u32,
}

impl Default for RecordsSection {
    fn default() -> Self {
        Self {
            slice_lookback_days: 1,
        }
    }
}
