//! Error types for the datastore facade.

use tally_backend::BackendError;
use tally_counter::CounterError;
use tally_types::TableNameError;

/// Errors that can occur during datastore operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A table name failed resolution or validation.
    #[error(transparent)]
    Name(#[from] TableNameError),

    /// A backend operation failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// A counter operation failed.
    #[error("counter error: {0}")]
    Counter(#[from] CounterError),

    /// The configuration could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    /// The file backend was selected without a data directory.
    #[error("file backend requires a data directory path")]
    MissingDataDir,
}
