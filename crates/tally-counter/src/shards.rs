//! Atomic add-or-create on individual counter shard cells.

use std::sync::Arc;

use tally_backend::{BackendError, TableBackend};
use tally_types::{CellSelector, CellValue, ShardNumber};
use tracing::debug;

/// How an atomic add landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The shard cell did not exist and was created with the amount.
    /// The caller must register the shard in the index.
    Created,
    /// The amount was folded into an existing shard cell.
    Updated,
}

/// Read-modify-write access to counter shard cells.
///
/// One logical counter is deliberately split into independent cells so
/// increments never serialize on a single hot record; the backend's
/// version token guards each cell's read-modify-write.
pub struct CounterShards {
    backend: Arc<dyn TableBackend>,
}

impl CounterShards {
    /// Create a shard store over the given backend.
    pub fn new(backend: Arc<dyn TableBackend>) -> Self {
        Self { backend }
    }

    /// Add `amount` to the shard cell, creating it if absent.
    ///
    /// Failure modes the caller is expected to retry: a creation race
    /// ([`BackendError::AlreadyExists`]), a stale version token
    /// ([`BackendError::Contention`]), the cell vanishing between read and
    /// write ([`BackendError::CellAbsent`]), and a missing table
    /// ([`BackendError::TableAbsent`]).
    pub async fn atomic_add(
        &self,
        table: &str,
        key: &str,
        shard: ShardNumber,
        amount: i64,
    ) -> Result<AddOutcome, BackendError> {
        let selector = CellSelector::Shard(shard);
        match self.backend.get_cell(table, key, selector).await? {
            None => {
                self.backend
                    .create_cell(table, key, selector, CellValue::Count(amount))
                    .await?;
                debug!(table, key, shard, amount, "created counter shard");
                Ok(AddOutcome::Created)
            }
            Some(cell) => {
                let current = as_count(&cell.value, table, key)?;
                self.backend
                    .conditional_write(
                        table,
                        key,
                        selector,
                        CellValue::Count(current.saturating_add(amount)),
                        cell.version,
                    )
                    .await?;
                Ok(AddOutcome::Updated)
            }
        }
    }

    /// Read one shard cell's value. `None` if the cell does not exist.
    pub async fn read(
        &self,
        table: &str,
        key: &str,
        shard: ShardNumber,
    ) -> Result<Option<i64>, BackendError> {
        match self
            .backend
            .get_cell(table, key, CellSelector::Shard(shard))
            .await?
        {
            Some(cell) => Ok(Some(as_count(&cell.value, table, key)?)),
            None => Ok(None),
        }
    }

    /// Delete one shard cell. Absent cells are not an error.
    pub async fn delete(
        &self,
        table: &str,
        key: &str,
        shard: ShardNumber,
    ) -> Result<(), BackendError> {
        self.backend
            .delete_cell(table, key, CellSelector::Shard(shard))
            .await
    }
}

fn as_count(value: &CellValue, table: &str, key: &str) -> Result<i64, BackendError> {
    match value {
        CellValue::Count(n) => Ok(*n),
        CellValue::Blob(_) => Err(BackendError::TypeMismatch {
            table: table.to_string(),
            key: key.to_string(),
        }),
    }
}
