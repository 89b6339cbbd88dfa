//! Shared fixtures for counter tests.

use std::sync::Arc;
use std::time::Duration;

use tally_backend::{FlakyBackend, MemoryBackend, TableBackend};

use crate::backoff::BackoffPolicy;
use crate::counter::{CounterConfig, ShardedCounter};
use crate::index::index_table;

/// Counter table used throughout the suite.
pub const TABLE: &str = "test_counter";

/// A backoff policy fast enough for tests that walk the whole retry budget.
pub fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy {
        base: Duration::from_micros(50),
        floor: Duration::from_micros(10),
        cap: Duration::from_millis(2),
    }
}

/// Memory-backed coordinator with its tables pre-created.
pub async fn counter_fixture() -> (ShardedCounter, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    backend.ensure_table(TABLE).await.unwrap();
    backend.ensure_table(&index_table(TABLE)).await.unwrap();

    let counter = ShardedCounter::with_config(
        backend.clone(),
        CounterConfig {
            max_retries: 100,
            backoff: fast_backoff(),
        },
    );
    (counter, backend)
}

/// Coordinator over a backend whose first `failures` cell writes fail, with
/// the given retry budget.
pub async fn flaky_fixture(failures: u32, max_retries: u32) -> ShardedCounter {
    let inner = Arc::new(MemoryBackend::new());
    inner.ensure_table(TABLE).await.unwrap();
    inner.ensure_table(&index_table(TABLE)).await.unwrap();

    let backend = Arc::new(FlakyBackend::new(inner).fail_writes(failures));
    ShardedCounter::with_config(
        backend,
        CounterConfig {
            max_retries,
            backoff: fast_backoff(),
        },
    )
}
