//! [`ShardedCounter`] — the coordinator for increment, aggregate read, and
//! delete over shard cells and the shard index.

use std::sync::Arc;

use rand::Rng;
use tally_backend::{BackendError, TableBackend};
use tally_types::ShardNumber;
use tracing::{debug, warn};

use crate::backoff::BackoffPolicy;
use crate::error::CounterError;
use crate::index::{ShardIndex, index_table};
use crate::shards::{AddOutcome, CounterShards};

/// The shard read by non-sharded `total` calls.
///
/// Increments with `shard_count = 1` always land here, so a counter that is
/// never sharded reads back identically through either path.
pub const DEFAULT_SHARD: ShardNumber = 1;

/// Configuration for a [`ShardedCounter`].
#[derive(Debug, Clone, Copy)]
pub struct CounterConfig {
    /// Attempts before an operation fails with
    /// [`CounterError::RetryExhausted`].
    pub max_retries: u32,
    /// Delay policy between attempts.
    pub backoff: BackoffPolicy,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            max_retries: 100,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Coordinates sharded counter operations over a backend.
///
/// Holds no state beyond its configuration: arbitrarily many instances and
/// callers may operate on the same counters concurrently, coordinated only
/// by the backend's per-cell version tokens.
pub struct ShardedCounter {
    backend: Arc<dyn TableBackend>,
    shards: CounterShards,
    index: ShardIndex,
    config: CounterConfig,
}

/// What the retry loop should do after one attempt.
enum Step {
    Done,
    /// Retry the same shard: its cell exists, the write lost the race.
    RetrySameShard,
    /// Retry with a fresh shard draw.
    RetryFresh,
    /// The shard cell was written; only the index entry is still missing.
    RetryRegister,
}

impl ShardedCounter {
    /// Create a coordinator with default configuration.
    pub fn new(backend: Arc<dyn TableBackend>) -> Self {
        Self::with_config(backend, CounterConfig::default())
    }

    /// Create a coordinator with the given configuration.
    pub fn with_config(backend: Arc<dyn TableBackend>, config: CounterConfig) -> Self {
        Self {
            shards: CounterShards::new(backend.clone()),
            index: ShardIndex::new(backend.clone()),
            backend,
            config,
        }
    }

    /// Add `amount` to the counter, spreading writes over `shard_count`
    /// shards.
    ///
    /// Picks a shard uniformly at random, adds to its cell, and registers
    /// newly created shards in the index. Transient failures (write
    /// contention, creation races, a missing table) are retried with
    /// backoff until the configured budget is exhausted.
    pub async fn increment(
        &self,
        table: &str,
        key: &str,
        amount: i64,
        shard_count: u32,
    ) -> Result<(), CounterError> {
        let shard_count = shard_count.max(1);
        let mut pinned: Option<ShardNumber> = None;
        let mut unregistered: Option<ShardNumber> = None;

        for attempt in 1..=self.config.max_retries {
            let step = if let Some(shard) = unregistered {
                // The amount already landed in a new shard cell; only the
                // index write is outstanding. Never re-apply the amount.
                self.try_register(table, key, shard).await?
            } else {
                let shard = pinned
                    .take()
                    .unwrap_or_else(|| rand::rng().random_range(1..=shard_count));
                match self.try_add(table, key, shard, amount).await? {
                    Step::RetrySameShard => {
                        pinned = Some(shard);
                        Step::RetrySameShard
                    }
                    Step::RetryRegister => {
                        unregistered = Some(shard);
                        // Attempt the index write right away; backing off
                        // first would only widen the unindexed window.
                        self.try_register(table, key, shard).await?
                    }
                    step => step,
                }
            };

            if matches!(step, Step::Done) {
                return Ok(());
            }

            debug!(table, key, attempt, "retrying counter increment");
            self.config.backoff.wait(attempt).await;
        }

        warn!(
            table,
            key,
            attempts = self.config.max_retries,
            "counter increment exhausted its retry budget"
        );
        Err(CounterError::RetryExhausted {
            key: key.to_string(),
            attempts: self.config.max_retries,
        })
    }

    /// One attempt at landing the amount in a shard cell.
    async fn try_add(
        &self,
        table: &str,
        key: &str,
        shard: ShardNumber,
        amount: i64,
    ) -> Result<Step, CounterError> {
        match self.shards.atomic_add(table, key, shard, amount).await {
            Ok(AddOutcome::Updated) => Ok(Step::Done),
            Ok(AddOutcome::Created) => Ok(Step::RetryRegister),
            // Stale token on an existing cell: re-read the same cell and
            // recompute rather than re-drawing.
            Err(BackendError::Contention { .. }) => Ok(Step::RetrySameShard),
            // Creation race, or the cell vanished between read and write.
            Err(BackendError::AlreadyExists { .. }) | Err(BackendError::CellAbsent { .. }) => {
                Ok(Step::RetryFresh)
            }
            Err(BackendError::TableAbsent(_)) => {
                self.ensure_tables(table).await?;
                Ok(Step::RetryFresh)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// One attempt at registering a freshly created shard in the index.
    async fn try_register(
        &self,
        table: &str,
        key: &str,
        shard: ShardNumber,
    ) -> Result<Step, CounterError> {
        match self.index.register(table, key, shard).await {
            Ok(()) => Ok(Step::Done),
            Err(BackendError::TableAbsent(_)) => {
                // The index table is provisioned lazily; another caller may
                // be mid-creation.
                self.backend.ensure_table(&index_table(table)).await?;
                Ok(Step::RetryRegister)
            }
            Err(e) if e.is_retryable() => Ok(Step::RetryRegister),
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_tables(&self, table: &str) -> Result<(), CounterError> {
        self.backend.ensure_table(table).await?;
        self.backend.ensure_table(&index_table(table)).await?;
        Ok(())
    }

    /// Read the counter's value.
    ///
    /// With `sharded` false, reads only the default shard ([`DEFAULT_SHARD`])
    /// and returns `None` if it was never written. With `sharded` true, sums
    /// every shard recorded in the index, treating individually absent
    /// shards as 0. A shard created after the index listing is missed by
    /// that read: accepted weak consistency, not an error.
    pub async fn total(
        &self,
        table: &str,
        key: &str,
        sharded: bool,
    ) -> Result<Option<i64>, CounterError> {
        if !sharded {
            return match self.shards.read(table, key, DEFAULT_SHARD).await {
                Ok(value) => Ok(value),
                Err(BackendError::TableAbsent(_)) => Ok(None),
                Err(e) => Err(e.into()),
            };
        }

        let Some(shards) = self.index.list(table, key).await? else {
            return Ok(None);
        };
        let mut sum = 0i64;
        for shard in shards {
            match self.shards.read(table, key, shard).await {
                Ok(Some(value)) => sum = sum.saturating_add(value),
                Ok(None) => {}
                Err(BackendError::TableAbsent(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Some(sum))
    }

    /// Delete every shard cell recorded for the counter, then clear its
    /// index entry.
    ///
    /// Cell deletions are best-effort: an individual failure is logged and
    /// the loop continues, so re-running delete converges. Not atomic: a
    /// crash mid-loop leaves a stale index until the next delete.
    pub async fn delete_counter(&self, table: &str, key: &str) -> Result<(), CounterError> {
        let Some(shards) = self.index.list(table, key).await? else {
            debug!(table, key, "no shard index entry, nothing to delete");
            return Ok(());
        };

        for shard in shards {
            match self.shards.delete(table, key, shard).await {
                Ok(()) | Err(BackendError::TableAbsent(_)) => {}
                Err(e) => {
                    warn!(table, key, shard, error = %e, "failed to delete counter shard, continuing");
                }
            }
        }
        self.index.clear(table, key).await?;
        debug!(table, key, "deleted counter");
        Ok(())
    }
}
