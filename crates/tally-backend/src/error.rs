//! Error types for backend operations.
//!
//! Every failure mode is a tagged variant decided here, at the adapter
//! boundary. Layers above match on variants, never on message text.

use tally_types::TableNameError;

/// Errors that can occur during backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// A conditional write presented a stale version token and lost the
    /// race. Recoverable by re-reading the cell and retrying.
    #[error("write contention on {table}/{key}: stale version token")]
    Contention {
        /// Table holding the contended cell.
        table: String,
        /// Key of the contended cell.
        key: String,
    },

    /// A conditional write targeted a cell that does not exist.
    #[error("cell absent: {table}/{key}")]
    CellAbsent {
        /// Table the cell was expected in.
        table: String,
        /// Key of the missing cell.
        key: String,
    },

    /// A create targeted a cell that already exists (creation race).
    #[error("cell already exists: {table}/{key}")]
    AlreadyExists {
        /// Table holding the cell.
        table: String,
        /// Key of the existing cell.
        key: String,
    },

    /// The table itself does not exist. Transient during concurrent table
    /// creation; recoverable by ensure-table-then-retry.
    #[error("table absent: {0}")]
    TableAbsent(String),

    /// The cell holds a value of the wrong kind for the requested
    /// operation (e.g. a blob where a counter was expected).
    #[error("unexpected value kind in {table}/{key}")]
    TypeMismatch {
        /// Table holding the cell.
        table: String,
        /// Key of the offending cell.
        key: String,
    },

    /// The table name is malformed. Never retried.
    #[error(transparent)]
    InvalidTableName(#[from] TableNameError),

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored cell could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] postcard::Error),
}

impl BackendError {
    /// Whether this failure is transient and worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::Contention { .. }
                | BackendError::CellAbsent { .. }
                | BackendError::AlreadyExists { .. }
                | BackendError::TableAbsent(_)
        )
    }
}
