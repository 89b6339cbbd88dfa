//! [`Datastore`] — the facade tying backend, counters, and table cache
//! together.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use tally_backend::{
    BackendError, FileBackend, MemoryBackend, TableBackend, TableCache,
};
use tally_counter::{CounterConfig, ShardedCounter};
use tally_types::{CellSelector, CellValue, is_time_sliced, resolve_table_name};
use tracing::debug;

use crate::config::{BackendKind, DatastoreConfig};
use crate::error::EngineError;

/// Uniform datastore over one configured storage backend.
///
/// Record and table operations resolve time-sliced table names (names
/// containing strftime patterns, e.g. `events_%Y%m%d`) against the current
/// UTC time before touching the backend; counter operations delegate to
/// [`ShardedCounter`] under the same resolution.
pub struct Datastore {
    backend: Arc<dyn TableBackend>,
    counters: ShardedCounter,
    tables: TableCache,
    slice_lookback: Duration,
}

impl Datastore {
    /// Open a datastore for the configured backend.
    pub fn open(config: &DatastoreConfig) -> Result<Self, EngineError> {
        let backend: Arc<dyn TableBackend> = match config.backend.kind {
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
            BackendKind::File => {
                let path = config.backend.path.as_ref().ok_or(EngineError::MissingDataDir)?;
                Arc::new(FileBackend::new(path)?)
            }
        };
        debug!(kind = ?config.backend.kind, "opened datastore");
        Ok(Self::with_backend_config(
            backend,
            CounterConfig {
                max_retries: config.counter.max_retries,
                ..CounterConfig::default()
            },
            Duration::days(i64::from(config.records.slice_lookback_days)),
        ))
    }

    /// Build a datastore over an existing backend with default tuning.
    pub fn with_backend(backend: Arc<dyn TableBackend>) -> Self {
        Self::with_backend_config(backend, CounterConfig::default(), Duration::days(1))
    }

    fn with_backend_config(
        backend: Arc<dyn TableBackend>,
        counter_config: CounterConfig,
        slice_lookback: Duration,
    ) -> Self {
        Self {
            counters: ShardedCounter::with_config(backend.clone(), counter_config),
            backend,
            tables: TableCache::new(),
            slice_lookback,
        }
    }

    // ----- Table lifecycle -----

    /// Create a table if it does not exist. Idempotent; skips the backend
    /// round-trip when the table is already known to this instance.
    pub async fn create_table(&self, table: &str) -> Result<(), EngineError> {
        self.create_table_at(table, Utc::now()).await
    }

    /// [`create_table`](Self::create_table) with an explicit instant for
    /// time-sliced name resolution.
    pub async fn create_table_at(
        &self,
        table: &str,
        at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let name = resolve_table_name(table, at)?;
        if self.tables.contains(&name) {
            return Ok(());
        }
        self.backend.ensure_table(&name).await?;
        self.tables.insert(&name);
        Ok(())
    }

    /// Whether the table currently exists.
    pub async fn table_exists(&self, table: &str) -> Result<bool, EngineError> {
        let name = resolve_table_name(table, Utc::now())?;
        if self.tables.contains(&name) {
            return Ok(true);
        }
        let exists = self.backend.table_exists(&name).await?;
        if exists {
            self.tables.insert(&name);
        }
        Ok(exists)
    }

    /// Delete a table and everything in it. Absent tables are not an error.
    pub async fn delete_table(&self, table: &str) -> Result<(), EngineError> {
        let name = resolve_table_name(table, Utc::now())?;
        self.backend.delete_table(&name).await?;
        self.tables.invalidate(&name);
        Ok(())
    }

    /// Forget a cached table name, forcing the next operation to re-check
    /// the backend. Takes the resolved name as stored.
    pub fn invalidate_table(&self, table: &str) {
        self.tables.invalidate(table);
    }

    // ----- Records -----

    /// Store a record, replacing any previous value. The table must exist.
    pub async fn put_record(
        &self,
        table: &str,
        key: &str,
        data: Bytes,
    ) -> Result<(), EngineError> {
        self.put_record_at(table, key, data, Utc::now()).await
    }

    /// [`put_record`](Self::put_record) with an explicit instant for
    /// time-sliced name resolution.
    pub async fn put_record_at(
        &self,
        table: &str,
        key: &str,
        data: Bytes,
        at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let name = resolve_table_name(table, at)?;
        self.backend
            .put_cell(&name, key, CellSelector::Plain, CellValue::Blob(data))
            .await?;
        Ok(())
    }

    /// Fetch a record.
    ///
    /// For a time-sliced table, a miss in the current slice falls back to
    /// the previous slice (configured lookback). A table that does not
    /// exist reads as absent, not as an error.
    pub async fn get_record(&self, table: &str, key: &str) -> Result<Option<Bytes>, EngineError> {
        let now = Utc::now();
        if let Some(data) = self.get_record_slice(table, key, now).await? {
            return Ok(Some(data));
        }
        if is_time_sliced(table) {
            return self.get_record_slice(table, key, now - self.slice_lookback).await;
        }
        Ok(None)
    }

    async fn get_record_slice(
        &self,
        table: &str,
        key: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Bytes>, EngineError> {
        let name = resolve_table_name(table, at)?;
        match self.backend.get_cell(&name, key, CellSelector::Plain).await {
            Ok(Some(cell)) => match cell.value {
                CellValue::Blob(data) => Ok(Some(data)),
                CellValue::Count(_) => Err(BackendError::TypeMismatch {
                    table: name,
                    key: key.to_string(),
                }
                .into()),
            },
            Ok(None) => Ok(None),
            Err(BackendError::TableAbsent(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a record. Absent records and absent tables are not errors.
    pub async fn delete_record(&self, table: &str, key: &str) -> Result<(), EngineError> {
        let name = resolve_table_name(table, Utc::now())?;
        match self.backend.delete_cell(&name, key, CellSelector::Plain).await {
            Ok(()) | Err(BackendError::TableAbsent(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    // ----- Counters -----

    /// Add `amount` to a counter, spread over `shard_count` shards.
    pub async fn increment(
        &self,
        table: &str,
        key: &str,
        amount: i64,
        shard_count: u32,
    ) -> Result<(), EngineError> {
        let name = resolve_table_name(table, Utc::now())?;
        Ok(self.counters.increment(&name, key, amount, shard_count).await?)
    }

    /// Read a counter's value; see [`ShardedCounter::total`].
    pub async fn total(
        &self,
        table: &str,
        key: &str,
        sharded: bool,
    ) -> Result<Option<i64>, EngineError> {
        let name = resolve_table_name(table, Utc::now())?;
        Ok(self.counters.total(&name, key, sharded).await?)
    }

    /// Delete a counter's shards and index entry.
    pub async fn delete_counter(&self, table: &str, key: &str) -> Result<(), EngineError> {
        let name = resolve_table_name(table, Utc::now())?;
        Ok(self.counters.delete_counter(&name, key).await?)
    }
}
