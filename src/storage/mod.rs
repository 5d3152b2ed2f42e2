//! File persistence layer
//!
//! Asset bytes live at `{base_dir}/{session}/{filename}`. Uploads are staged
//! in a temporary file next to their destination and renamed into place only
//! after verification, so readers never observe a partial write. A file being
//! replaced is set aside under a backup name until its replacement's record
//! is committed.

pub mod hasher;


pub use hasher::{digest_bytes, digest_file, ContentDigest};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::core::error::{Result, StorageError, VaultError};

/// An opened asset ready for streaming
#[derive(Debug)]
pub struct AssetFile {
    pub file: tokio::fs::File,
    pub len: u64,
}

/// Filesystem operations the pipeline and retrieval path depend on
#[async_trait]
pub trait AssetStorage: Send + Sync + 'static {
    /// Root of the on-disk layout
    fn base_dir(&self) -> &Path;

    /// Directory holding one session's files
    fn session_dir(&self, session: &str) -> PathBuf {
        self.base_dir().join(session)
    }

    /// Final location of an asset
    fn asset_path(&self, session: &str, filename: &str) -> PathBuf {
        self.session_dir(session).join(filename)
    }

    /// Scratch location for an upload in flight, in the same directory as the
    /// final file so the publishing rename stays on one filesystem
    fn staging_path(&self, session: &str, filename: &str) -> PathBuf {
        self.session_dir(session)
            .join(format!(".{}.{}.tmp", filename, uuid::Uuid::now_v7().simple()))
    }

    /// Where a replaced file waits until the new record is committed
    fn backup_path(&self, dest: &Path) -> PathBuf {
        let name = dest.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        dest.with_file_name(format!(".{}.{}.bak", name, uuid::Uuid::now_v7().simple()))
    }

    /// Create the session directory if absent; no-op if it already exists
    async fn ensure_session_directory(&self, session: &str) -> Result<PathBuf>;

    /// Write the full payload to `path`, replacing any existing file, and flush
    /// it to disk
    async fn write_asset(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// Open a regular file for streaming
    async fn read_asset(&self, path: &Path) -> Result<AssetFile>;

    /// On-disk byte count
    async fn stat_size(&self, path: &Path) -> Result<u64>;

    /// Re-read `path` from disk and hash it
    async fn hash_asset(&self, path: &Path) -> Result<ContentDigest> {
        digest_file(path).await
    }

    /// Atomically move a verified staging file over the final path
    async fn publish(&self, staged: &Path, dest: &Path) -> Result<()>;

    /// Rename an existing `dest` to a backup path and return it; `None` when
    /// there is nothing at `dest`
    async fn set_aside(&self, dest: &Path) -> Result<Option<PathBuf>>;

    /// Delete a file that no record points to; a missing file is not an error
    async fn discard(&self, path: &Path) -> Result<()>;
}

/// Local filesystem storage
#[derive(Debug, Clone)]
pub struct LocalAssetStorage {
    base_dir: PathBuf,
}

impl LocalAssetStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Create the base directory itself and clear staging files left by a
    /// previous run (at startup)
    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_dir).await.map_err(|e| {
            StorageError::DirectoryCreationFailed {
                path: self.base_dir.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        let removed = self.sweep_staging().await?;
        if removed > 0 {
            tracing::info!(removed, "removed leftover staging files");
        }
        Ok(())
    }

    /// Delete `.*.tmp` files in every session directory
    ///
    /// Only safe while no upload is in flight.
    pub async fn sweep_staging(&self) -> Result<usize> {
        let read_failed = |path: &Path, e: std::io::Error| StorageError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let mut removed = 0;
        let mut sessions = tokio::fs::read_dir(&self.base_dir)
            .await
            .map_err(|e| read_failed(self.base_dir.as_path(), e))?;
        while let Some(session) = sessions
            .next_entry()
            .await
            .map_err(|e| read_failed(self.base_dir.as_path(), e))?
        {
            let dir = session.path();
            if !session.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }

            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| read_failed(dir.as_path(), e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| read_failed(dir.as_path(), e))?
            {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with('.') && name.ends_with(".tmp") {
                    self.discard(&entry.path()).await?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl AssetStorage for LocalAssetStorage {
    fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    async fn ensure_session_directory(&self, session: &str) -> Result<PathBuf> {
        let dir = self.session_dir(session);

        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => return Ok(dir),
            Ok(_) => {
                return Err(StorageError::NotADirectory {
                    path: dir.display().to_string(),
                }
                .into())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StorageError::DirectoryCreationFailed {
                    path: dir.display().to_string(),
                    reason: e.to_string(),
                }
                .into())
            }
        }

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::DirectoryCreationFailed {
                path: dir.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        tracing::info!(session, dir = %dir.display(), "created session directory");
        Ok(dir)
    }

    async fn write_asset(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let failed = |e: std::io::Error| StorageError::WriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let mut file = tokio::fs::File::create(path).await.map_err(failed)?;
        file.write_all(bytes).await.map_err(failed)?;
        file.sync_all().await.map_err(failed)?;

        tracing::trace!(path = %path.display(), bytes = bytes.len(), "wrote asset bytes");
        Ok(())
    }

    async fn read_asset(&self, path: &Path) -> Result<AssetFile> {
        let missing = || VaultError::ContentMissing {
            path: path.display().to_string(),
        };

        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(missing()),
            Err(e) => {
                return Err(StorageError::ReadFailed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
                .into())
            }
        };
        if !meta.is_file() {
            return Err(missing());
        }

        let file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(missing()),
            Err(e) => {
                return Err(StorageError::ReadFailed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
                .into())
            }
        };

        Ok(AssetFile {
            file,
            len: meta.len(),
        })
    }

    async fn stat_size(&self, path: &Path) -> Result<u64> {
        let meta = tokio::fs::metadata(path).await.map_err(|e| StorageError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(meta.len())
    }

    async fn publish(&self, staged: &Path, dest: &Path) -> Result<()> {
        tokio::fs::rename(staged, dest).await.map_err(|e| StorageError::PublishFailed {
            from: staged.display().to_string(),
            to: dest.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    async fn set_aside(&self, dest: &Path) -> Result<Option<PathBuf>> {
        let backup = self.backup_path(dest);
        match tokio::fs::rename(dest, &backup).await {
            Ok(()) => {
                tracing::debug!(dest = %dest.display(), backup = %backup.display(), "set aside");
                Ok(Some(backup))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::PublishFailed {
                from: dest.display().to_string(),
                to: backup.display().to_string(),
                reason: e.to_string(),
            }
            .into()),
        }
    }

    async fn discard(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed unreferenced file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::WriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
            .into()),
        }
    }
}
