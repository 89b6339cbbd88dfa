//! Sequential increment / total behavior.

use std::sync::Arc;

use tally_backend::{FileBackend, MemoryBackend};

use super::helpers::{TABLE, counter_fixture, fast_backoff};
use crate::counter::{CounterConfig, ShardedCounter};

#[tokio::test]
async fn test_sequential_increments_sum() {
    let (counter, _backend) = counter_fixture().await;

    for _ in 0..10 {
        counter.increment(TABLE, "hits", 1, 8).await.unwrap();
    }
    assert_eq!(counter.total(TABLE, "hits", true).await.unwrap(), Some(10));
}

#[tokio::test]
async fn test_single_shard_totals_agree() {
    let (counter, _backend) = counter_fixture().await;

    counter.increment(TABLE, "hits", 1, 1).await.unwrap();
    counter.increment(TABLE, "hits", 2, 1).await.unwrap();

    let sharded = counter.total(TABLE, "hits", true).await.unwrap();
    let plain = counter.total(TABLE, "hits", false).await.unwrap();
    assert_eq!(sharded, Some(3));
    assert_eq!(plain, Some(3));
}

#[tokio::test]
async fn test_mixed_amounts_across_shards() {
    let (counter, _backend) = counter_fixture().await;

    counter.increment(TABLE, "ctr", 3, 10).await.unwrap();
    counter.increment(TABLE, "ctr", 2, 10).await.unwrap();
    // Only the sharded total is deterministic; the default shard may or may
    // not have received a draw.
    assert_eq!(counter.total(TABLE, "ctr", true).await.unwrap(), Some(5));
}

#[tokio::test]
async fn test_negative_amounts() {
    let (counter, _backend) = counter_fixture().await;

    counter.increment(TABLE, "bal", 5, 1).await.unwrap();
    counter.increment(TABLE, "bal", -2, 1).await.unwrap();
    assert_eq!(counter.total(TABLE, "bal", false).await.unwrap(), Some(3));
}

#[tokio::test]
async fn test_total_absent_before_any_write() {
    let (counter, _backend) = counter_fixture().await;

    assert_eq!(counter.total(TABLE, "nothing", true).await.unwrap(), None);
    assert_eq!(counter.total(TABLE, "nothing", false).await.unwrap(), None);
}

#[tokio::test]
async fn test_zero_shard_count_clamped_to_one() {
    let (counter, _backend) = counter_fixture().await;

    counter.increment(TABLE, "hits", 1, 0).await.unwrap();
    assert_eq!(counter.total(TABLE, "hits", false).await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_counters_are_isolated_by_key() {
    let (counter, _backend) = counter_fixture().await;

    counter.increment(TABLE, "a", 1, 4).await.unwrap();
    counter.increment(TABLE, "b", 10, 4).await.unwrap();

    assert_eq!(counter.total(TABLE, "a", true).await.unwrap(), Some(1));
    assert_eq!(counter.total(TABLE, "b", true).await.unwrap(), Some(10));
}

#[tokio::test]
async fn test_missing_tables_created_on_first_increment() {
    // No tables pre-created: the first attempt hits TableAbsent and the
    // coordinator provisions both the counter and index tables.
    let backend = Arc::new(MemoryBackend::new());
    let counter = ShardedCounter::with_config(
        backend,
        CounterConfig {
            max_retries: 10,
            backoff: fast_backoff(),
        },
    );

    counter.increment(TABLE, "hits", 1, 4).await.unwrap();
    assert_eq!(counter.total(TABLE, "hits", true).await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_file_backend_end_to_end() {
    let dir = tempfile::TempDir::new().unwrap();
    let backend = Arc::new(FileBackend::new(dir.path()).unwrap());
    let counter = ShardedCounter::with_config(
        backend,
        CounterConfig {
            max_retries: 10,
            backoff: fast_backoff(),
        },
    );

    for _ in 0..5 {
        counter.increment(TABLE, "hits", 1, 3).await.unwrap();
    }
    assert_eq!(counter.total(TABLE, "hits", true).await.unwrap(), Some(5));
}
