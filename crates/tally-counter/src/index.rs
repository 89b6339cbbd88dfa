//! Shard index: which shard numbers exist for a counter key.
//!
//! Shard cells are independently addressed and have no built-in
//! enumeration, so a sibling table `{table}_shard_index` records, per
//! counter key, the set of shard numbers known to exist. The index is
//! eventually consistent with reality: a shard can exist physically before
//! its number lands here.

use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use tally_backend::{BackendError, TableBackend};
use tally_types::{CellSelector, CellValue, ShardNumber};
use tracing::debug;

/// Suffix appended to a counter table's name to form its index table.
pub const SHARD_INDEX_SUFFIX: &str = "_shard_index";

/// The index table name for a counter table.
pub fn index_table(table: &str) -> String {
    format!("{table}{SHARD_INDEX_SUFFIX}")
}

/// Per-key shard bookkeeping over the backend's cell primitives.
pub struct ShardIndex {
    backend: Arc<dyn TableBackend>,
}

impl ShardIndex {
    /// Create a shard index over the given backend.
    pub fn new(backend: Arc<dyn TableBackend>) -> Self {
        Self { backend }
    }

    /// Add `shard` to the set for `key`. Idempotent union.
    ///
    /// Makes a single conditional-write attempt; contention, creation
    /// races, and a missing index table surface to the caller, which owns
    /// the retry budget.
    pub async fn register(
        &self,
        table: &str,
        key: &str,
        shard: ShardNumber,
    ) -> Result<(), BackendError> {
        let index = index_table(table);
        match self.backend.get_cell(&index, key, CellSelector::Plain).await? {
            Some(cell) => {
                let mut shards = decode_shards(&cell.value, &index, key)?;
                if !shards.insert(shard) {
                    return Ok(());
                }
                self.backend
                    .conditional_write(
                        &index,
                        key,
                        CellSelector::Plain,
                        encode_shards(&shards)?,
                        cell.version,
                    )
                    .await?;
            }
            None => {
                let shards = BTreeSet::from([shard]);
                self.backend
                    .create_cell(&index, key, CellSelector::Plain, encode_shards(&shards)?)
                    .await?;
            }
        }
        debug!(table, key, shard, "registered counter shard");
        Ok(())
    }

    /// The set of shard numbers recorded for `key`.
    ///
    /// `None` when no entry exists, including when the index table itself
    /// has never been created.
    pub async fn list(
        &self,
        table: &str,
        key: &str,
    ) -> Result<Option<BTreeSet<ShardNumber>>, BackendError> {
        let index = index_table(table);
        match self.backend.get_cell(&index, key, CellSelector::Plain).await {
            Ok(Some(cell)) => Ok(Some(decode_shards(&cell.value, &index, key)?)),
            Ok(None) => Ok(None),
            Err(BackendError::TableAbsent(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove the entire index entry for `key`. Idempotent.
    pub async fn clear(&self, table: &str, key: &str) -> Result<(), BackendError> {
        let index = index_table(table);
        match self
            .backend
            .delete_cell(&index, key, CellSelector::Plain)
            .await
        {
            Ok(()) => Ok(()),
            Err(BackendError::TableAbsent(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn decode_shards(
    value: &CellValue,
    table: &str,
    key: &str,
) -> Result<BTreeSet<ShardNumber>, BackendError> {
    match value {
        CellValue::Blob(bytes) => Ok(postcard::from_bytes(bytes)?),
        CellValue::Count(_) => Err(BackendError::TypeMismatch {
            table: table.to_string(),
            key: key.to_string(),
        }),
    }
}

fn encode_shards(shards: &BTreeSet<ShardNumber>) -> Result<CellValue, BackendError> {
    Ok(CellValue::Blob(Bytes::from(postcard::to_allocvec(shards)?)))
}
