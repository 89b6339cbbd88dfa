//! Backend adapter trait and storage backend implementations.
//!
//! This crate defines the [`TableBackend`] trait (versioned cell storage
//! with per-cell conditional writes) along with two concrete backends:
//!
//! - [`MemoryBackend`] — in-memory tables backed by a `RwLock<HashMap>`.
//! - [`FileBackend`] — file-based tables, one postcard-encoded cell per file.
//!
//! [`FlakyBackend`] wraps any backend with failure injection for tests, and
//! [`TableCache`] tracks known-existing tables so callers can skip repeated
//! existence round-trips.

mod cache;
mod error;
mod file;
mod flaky;
mod memory;
mod traits;

pub use cache::TableCache;
pub use error::BackendError;
pub use file::FileBackend;
pub use flaky::FlakyBackend;
pub use memory::MemoryBackend;
pub use traits::TableBackend;
