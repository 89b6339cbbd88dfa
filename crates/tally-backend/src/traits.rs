//! Core trait for versioned cell storage.

use tally_types::{CellSelector, CellValue, VersionToken, VersionedCell};

use crate::error::BackendError;

/// Trait for table-structured, versioned cell storage.
///
/// All implementations must be `Send + Sync` for use across async tasks.
/// The per-cell conditional write is the sole serialization mechanism the
/// layers above rely on; no operation here takes locks visible to callers.
#[async_trait::async_trait]
pub trait TableBackend: Send + Sync {
    /// Create the table if it does not exist. Idempotent.
    async fn ensure_table(&self, table: &str) -> Result<(), BackendError>;

    /// Check whether a table exists.
    async fn table_exists(&self, table: &str) -> Result<bool, BackendError>;

    /// Delete a table and everything in it. Deleting an absent table is not
    /// an error.
    async fn delete_table(&self, table: &str) -> Result<(), BackendError>;

    /// Read a cell with its current version token. Returns `None` if the
    /// cell does not exist; fails with [`BackendError::TableAbsent`] if the
    /// table does not.
    async fn get_cell(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
    ) -> Result<Option<VersionedCell>, BackendError>;

    /// Create a cell that must not yet exist.
    ///
    /// Fails with [`BackendError::AlreadyExists`] when another writer got
    /// there first.
    async fn create_cell(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
        value: CellValue,
    ) -> Result<VersionToken, BackendError>;

    /// Replace a cell's value if and only if `expected` is still its
    /// current version token.
    ///
    /// Fails with [`BackendError::Contention`] on a stale token and
    /// [`BackendError::CellAbsent`] if the cell vanished since the read.
    async fn conditional_write(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
        value: CellValue,
        expected: VersionToken,
    ) -> Result<VersionToken, BackendError>;

    /// Unconditionally write a cell, creating or replacing it.
    async fn put_cell(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
        value: CellValue,
    ) -> Result<VersionToken, BackendError>;

    /// Delete a cell. Deleting an absent cell is not an error.
    async fn delete_cell(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
    ) -> Result<(), BackendError>;
}
