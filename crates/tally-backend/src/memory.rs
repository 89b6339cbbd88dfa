//! In-memory storage backend.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tally_types::{CellSelector, CellValue, VersionToken, VersionedCell, validate_table_name};
use tracing::debug;

use crate::error::BackendError;
use crate::traits::TableBackend;

type Table = HashMap<(String, CellSelector), VersionedCell>;

/// In-memory backend backed by a `RwLock<HashMap>` of tables.
///
/// Useful for testing and for single-process deployments. Tables must be
/// created before use; cell operations against an unknown table fail with
/// [`BackendError::TableAbsent`], the same race a managed service exposes
/// when a table is still being provisioned.
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Table>>,
    versions: AtomicU64,
}

impl MemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> VersionToken {
        VersionToken::new(self.versions.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait::async_trait]
impl TableBackend for MemoryBackend {
    async fn ensure_table(&self, table: &str) -> Result<(), BackendError> {
        validate_table_name(table)?;
        let mut tables = self.tables.write().expect("lock poisoned");
        if !tables.contains_key(table) {
            debug!(table, "created table");
            tables.insert(table.to_string(), Table::new());
        }
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, BackendError> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables.contains_key(table))
    }

    async fn delete_table(&self, table: &str) -> Result<(), BackendError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        if tables.remove(table).is_some() {
            debug!(table, "deleted table");
        }
        Ok(())
    }

    async fn get_cell(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
    ) -> Result<Option<VersionedCell>, BackendError> {
        let tables = self.tables.read().expect("lock poisoned");
        let cells = tables
            .get(table)
            .ok_or_else(|| BackendError::TableAbsent(table.to_string()))?;
        Ok(cells.get(&(key.to_string(), selector)).cloned())
    }

    async fn create_cell(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
        value: CellValue,
    ) -> Result<VersionToken, BackendError> {
        let version = self.next_version();
        let mut tables = self.tables.write().expect("lock poisoned");
        let cells = tables
            .get_mut(table)
            .ok_or_else(|| BackendError::TableAbsent(table.to_string()))?;

        let addr = (key.to_string(), selector);
        if cells.contains_key(&addr) {
            return Err(BackendError::AlreadyExists {
                table: table.to_string(),
                key: key.to_string(),
            });
        }
        debug!(table, key, %selector, "created cell");
        cells.insert(addr, VersionedCell { value, version });
        Ok(version)
    }

    async fn conditional_write(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
        value: CellValue,
        expected: VersionToken,
    ) -> Result<VersionToken, BackendError> {
        let version = self.next_version();
        let mut tables = self.tables.write().expect("lock poisoned");
        let cells = tables
            .get_mut(table)
            .ok_or_else(|| BackendError::TableAbsent(table.to_string()))?;

        let addr = (key.to_string(), selector);
        let Some(cell) = cells.get_mut(&addr) else {
            return Err(BackendError::CellAbsent {
                table: table.to_string(),
                key: key.to_string(),
            });
        };
        if cell.version != expected {
            return Err(BackendError::Contention {
                table: table.to_string(),
                key: key.to_string(),
            });
        }
        *cell = VersionedCell { value, version };
        Ok(version)
    }

    async fn put_cell(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
        value: CellValue,
    ) -> Result<VersionToken, BackendError> {
        let version = self.next_version();
        let mut tables = self.tables.write().expect("lock poisoned");
        let cells = tables
            .get_mut(table)
            .ok_or_else(|| BackendError::TableAbsent(table.to_string()))?;
        debug!(table, key, %selector, "put cell");
        cells.insert((key.to_string(), selector), VersionedCell { value, version });
        Ok(version)
    }

    async fn delete_cell(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
    ) -> Result<(), BackendError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        let cells = tables
            .get_mut(table)
            .ok_or_else(|| BackendError::TableAbsent(table.to_string()))?;
        if cells.remove(&(key.to_string(), selector)).is_some() {
            debug!(table, key, %selector, "deleted cell");
        }
        Ok(())
    }
}
