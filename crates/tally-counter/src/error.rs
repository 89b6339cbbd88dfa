//! Error types for counter operations.

use tally_backend::BackendError;

/// Errors that can occur during counter operations.
///
/// Ordinary contention never surfaces here; it is absorbed by the retry
/// loop. [`CounterError::RetryExhausted`] is the only failure callers are
/// expected to handle explicitly.
#[derive(Debug, thiserror::Error)]
pub enum CounterError {
    /// The operation kept hitting transient failures until the configured
    /// retry budget ran out.
    #[error("counter '{key}' exceeded max retries ({attempts})")]
    RetryExhausted {
        /// Key of the counter that could not make progress.
        key: String,
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// A non-retryable backend failure.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}
