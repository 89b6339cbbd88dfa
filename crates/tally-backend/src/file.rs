//! File-based storage backend.
//!
//! Each table is a directory; each cell is one postcard-encoded file at
//! `{root}/{table}/{hex(key)[0..2]}/{hex(key)}/{selector}`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use rand::Rng;
use tally_types::{CellSelector, CellValue, VersionToken, VersionedCell, validate_table_name};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::BackendError;
use crate::traits::TableBackend;

/// File-based backend with one file per cell.
///
/// Writes are atomic: data is written to a temporary file first, then
/// renamed into place, so a crash never leaves a half-written cell.
/// Read-modify-write sections are serialized by a single async mutex,
/// the single-process stand-in for a managed service's server-side
/// conditional write. Version tokens are drawn at random per write.
pub struct FileBackend {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Create a new file backend rooted at the given directory.
    ///
    /// The directory is created if it does not exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, BackendError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn table_dir(&self, table: &str) -> Result<PathBuf, BackendError> {
        // Validation doubles as path hygiene: names are alphanumeric plus
        // underscore, so they cannot escape the root directory.
        validate_table_name(table)?;
        Ok(self.root.join(table))
    }

    fn cell_path(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
    ) -> Result<PathBuf, BackendError> {
        let hex = hex_encode(key.as_bytes());
        let fanout = if hex.len() >= 2 { &hex[0..2] } else { "00" };
        Ok(self
            .table_dir(table)?
            .join(fanout)
            .join(&hex)
            .join(selector.to_string()))
    }

    async fn require_table(&self, table: &str) -> Result<PathBuf, BackendError> {
        let dir = self.table_dir(table)?;
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(BackendError::TableAbsent(table.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BackendError::TableAbsent(table.to_string()))
            }
            Err(e) => Err(BackendError::Io(e)),
        }
    }

    async fn read_cell(&self, path: &Path) -> Result<Option<VersionedCell>, BackendError> {
        match tokio::fs::read(path).await {
            Ok(data) => Ok(Some(postcard::from_bytes(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BackendError::Io(e)),
        }
    }

    /// Atomic write: temp file in the same directory, then rename.
    async fn write_cell(&self, path: &Path, cell: &VersionedCell) -> Result<(), BackendError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let encoded = postcard::to_allocvec(cell)?;
        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &encoded).await?;
        tokio::fs::rename(&tmp_path, path).await?;
        Ok(())
    }

    fn fresh_version() -> VersionToken {
        VersionToken::new(rand::rng().random())
    }
}

#[async_trait::async_trait]
impl TableBackend for FileBackend {
    async fn ensure_table(&self, table: &str) -> Result<(), BackendError> {
        let dir = self.table_dir(table)?;
        tokio::fs::create_dir_all(&dir).await?;
        debug!(table, "ensured table directory");
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, BackendError> {
        let dir = self.table_dir(table)?;
        match tokio::fs::metadata(&dir).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BackendError::Io(e)),
        }
    }

    async fn delete_table(&self, table: &str) -> Result<(), BackendError> {
        let dir = self.table_dir(table)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(table, "deleted table directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BackendError::Io(e)),
        }
    }

    async fn get_cell(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
    ) -> Result<Option<VersionedCell>, BackendError> {
        self.require_table(table).await?;
        let path = self.cell_path(table, key, selector)?;
        self.read_cell(&path).await
    }

    async fn create_cell(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
        value: CellValue,
    ) -> Result<VersionToken, BackendError> {
        let _guard = self.write_lock.lock().await;
        self.require_table(table).await?;
        let path = self.cell_path(table, key, selector)?;

        if tokio::fs::try_exists(&path).await? {
            return Err(BackendError::AlreadyExists {
                table: table.to_string(),
                key: key.to_string(),
            });
        }
        let version = Self::fresh_version();
        self.write_cell(&path, &VersionedCell { value, version })
            .await?;
        debug!(table, key, %selector, "created cell file");
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
        let _guard = self.write_lock.lock().await;
        self.require_table(table).await?;
        let path = self.cell_path(table, key, selector)?;

        let Some(current) = self.read_cell(&path).await? else {
            return Err(BackendError::CellAbsent {
                table: table.to_string(),
                key: key.to_string(),
            });
        };
        if current.version != expected {
            return Err(BackendError::Contention {
                table: table.to_string(),
                key: key.to_string(),
            });
        }
        let version = Self::fresh_version();
        self.write_cell(&path, &VersionedCell { value, version })
            .await?;
        Ok(version)
    }

    async fn put_cell(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
        value: CellValue,
    ) -> Result<VersionToken, BackendError> {
        let _guard = self.write_lock.lock().await;
        self.require_table(table).await?;
        let path = self.cell_path(table, key, selector)?;

        let version = Self::fresh_version();
        self.write_cell(&path, &VersionedCell { value, version })
            .await?;
        debug!(table, key, %selector, "put cell file");
        Ok(version)
    }

    async fn delete_cell(
        &self,
        table: &str,
        key: &str,
        selector: CellSelector,
    ) -> Result<(), BackendError> {
        self.require_table(table).await?;
        let path = self.cell_path(table, key, selector)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(table, key, %selector, "deleted cell file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BackendError::Io(e)),
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
