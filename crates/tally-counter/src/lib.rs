//! Distributed sharded counters.
//!
//! A logical counter is spread over N independent shard cells so that
//! concurrent increments never serialize on a single hot record. This crate
//! provides the pieces and their coordinator:
//!
//! - [`BackoffPolicy`] — randomized, capped exponential retry delays.
//! - [`CounterShards`] — atomic add-or-create on one shard cell.
//! - [`ShardIndex`] — which shard numbers exist for a counter key.
//! - [`ShardedCounter`] — increment / total / delete with a bounded retry
//!   loop over the above.

mod backoff;
mod counter;
mod error;
mod index;
mod shards;

#[cfg(test)]
mod tests;

pub use backoff::BackoffPolicy;
pub use counter::{CounterConfig, DEFAULT_SHARD, ShardedCounter};
pub use error::CounterError;
pub use index::{ShardIndex, index_table};
pub use shards::{AddOutcome, CounterShards};
