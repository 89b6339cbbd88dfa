//! A [`TableBackend`] wrapper that injects write failures.
//!
//! `FlakyBackend` wraps any `Arc<dyn TableBackend>` and makes the first N
//! cell writes fail with the corresponding transient error: conditional
//! writes fail with [`BackendError::Contention`], creates with
//! [`BackendError::AlreadyExists`]. Reads pass through untouched.
//!
//! # Example
//!
//! ```ignore
//! // Every writer loses its first two races, then the backend behaves.
//! let flaky = FlakyBackend::new(inner).fail_writes(2);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tally_types::{CellSelector, CellValue, VersionToken, VersionedCell};

use crate::error::BackendError;
use crate::traits::TableBackend;

/// A [`TableBackend`] wrapper that fails a configured number of cell writes.
///
/// Useful for driving the retry loop in tests without real concurrency:
/// exhausting a retry budget deterministically, or proving that a bounded
/// number of contentions is absorbed.
pub struct FlakyBackend {
    inner: Arc<dyn TableBackend>,
    write_failures: AtomicU32,
}

impl FlakyBackend {
    /// Wrap an existing backend with no failures configured.
    pub fn new(inner: Arc<dyn TableBackend>) -> Self {
        Self {
            inner,
            write_failures: AtomicU32::new(0),
        }
    }

    /// Make the next `count` cell writes fail. `u32::MAX` means every write
    /// fails.
    pub fn fail_writes(self, count: u32) -> Self {
        self.write_failures.store(count, Ordering::Relaxed);
        self
    }

    /// Consume one failure from the budget, if any remains.
    fn take_failure(&self) -> bool {
        self.write_failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                if n == 0 {
                    None
                } else if n == u32::MAX {
                    Some(n)
                } else {
                    Some(n - 1)
                }
            })
            .is_ok()
    }
}

#[async_trait::async_trait]
impl TableBackend for FlakyBackend {
    async fn ensure_table(&self, table: &str) -> Result<(), BackendError> {
        self.inner.ensure_table(table).await
    }

    async fn table_exists(&self, table: &str) -> Result<bool, BackendError> {
        self.inner.table_exists(table).await
    }

    async fn delete_table(&self, table: &str) -> Result<(), BackendError> {
        self.inner.delete_table(table).await
    }

    async fn get_cell(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
    ) -> Result<Option<VersionedCell>, BackendError> {
        self.inner.get_cell(table, key, selector).await
    }

    async fn create_cell(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
        value: CellValue,
    ) -> Result<VersionToken, BackendError> {
        if self.take_failure() {
            return Err(BackendError::AlreadyExists {
                table: table.to_string(),
                key: key.to_string(),
            });
        }
        self.inner.create_cell(table, key, selector, value).await
    }

    async fn conditional_write(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
        value: CellValue,
        expected: VersionToken,
    ) -> Result<VersionToken, BackendError> {
        if self.take_failure() {
            return Err(BackendError::Contention {
                table: table.to_string(),
                key: key.to_string(),
            });
        }
        self.inner
            .conditional_write(table, key, selector, value, expected)
            .await
    }

    async fn put_cell(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
        value: CellValue,
    ) -> Result<VersionToken, BackendError> {
        self.inner.put_cell(table, key, selector, value).await
    }

    async fn delete_cell(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
    ) -> Result<(), BackendError> {
        self.inner.delete_cell(table, key, selector).await
    }
}

#[cfg(test)]
mod tests {
    use crate::memory::MemoryBackend;

    use super::*;

    #[tokio::test]
    async fn test_budgeted_failures_then_pass_through() {
        let inner = Arc::new(MemoryBackend::new());
        inner.ensure_table("test").await.unwrap();
        let flaky = FlakyBackend::new(inner).fail_writes(2);

        for _ in 0..2 {
            let result = flaky
                .create_cell("test", "k", CellSelector::Shard(1), CellValue::Count(1))
                .await;
            assert!(matches!(result, Err(BackendError::AlreadyExists { .. })));
        }

        // Budget spent; the third write reaches the inner backend.
        flaky
            .create_cell("test", "k", CellSelector::Shard(1), CellValue::Count(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reads_never_fail() {
        let inner = Arc::new(MemoryBackend::new());
        inner.ensure_table("test").await.unwrap();
        let flaky = FlakyBackend::new(inner).fail_writes(u32::MAX);

        assert!(
            flaky
                .get_cell("test", "k", CellSelector::Plain)
                .await
                .unwrap()
                .is_none()
        );
    }
}
