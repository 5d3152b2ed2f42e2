//! Write-verify-commit pipeline
//!
//! One upload moves through
//! `Received → DirectoryEnsured → Written → Hashed → VerifiedSize → Committed`,
//! or stops in `Failed` at the first error. Metadata is committed last and
//! only after the bytes on disk have been re-read, hashed and size-checked.
//!
//! Bytes are staged in a temporary file beside the destination and renamed
//! into place after verification. The file being replaced is set aside until
//! the new record commits; if the commit fails it is renamed back, so the
//! previous file and its record stay consistent. Publishing and committing
//! run in their own task and finish even if the caller goes away.

mod locks;
pub mod retrieval;

#[cfg(test)]
mod tests;

pub use locks::{SessionGuard, SessionLocks};
pub use retrieval::{AssetReader, RetrievedAsset};

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::core::error::{IntegrityError, Result, VaultError};
use crate::core::utils::{asset_key, mime_for_filename, validate_segment};
use crate::db::{AssetFields, AssetRecord, MetadataStore, UpsertOutcome};
use crate::storage::{AssetStorage, ContentDigest};

/// Position of an upload in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStage {
    Received,
    DirectoryEnsured,
    Written,
    Hashed,
    VerifiedSize,
    Committed,
    Failed,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadStage::Received => "received",
            UploadStage::DirectoryEnsured => "directory_ensured",
            UploadStage::Written => "written",
            UploadStage::Hashed => "hashed",
            UploadStage::VerifiedSize => "verified_size",
            UploadStage::Committed => "committed",
            UploadStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub session: String,
    pub asset_key: String,
    pub path: String,
    pub outcome: UpsertOutcome,
    pub record: AssetRecord,
}

/// Tracks the current stage of one upload for diagnostics
struct StageTracker<'a> {
    session: &'a str,
    filename: &'a str,
    stage: UploadStage,
}

impl<'a> StageTracker<'a> {
    fn new(session: &'a str, filename: &'a str) -> Self {
        Self {
            session,
            filename,
            stage: UploadStage::Received,
        }
    }

    fn advance(&mut self, next: UploadStage) {
        tracing::debug!(
            session = self.session,
            filename = self.filename,
            from = %self.stage,
            to = %next,
            "upload stage"
        );
        self.stage = next;
    }
}

/// Staging file that is deleted on drop unless it was published
struct StagedFile {
    path: PathBuf,
    armed: bool,
}

impl StagedFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed staging file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove staging file"
            ),
        }
    }
}

/// Everything the publish-and-commit step needs, owned so it can move into a task
struct PendingCommit {
    session: String,
    key: String,
    staged: StagedFile,
    dest: PathBuf,
    fields: AssetFields,
    superseded: Option<PathBuf>,
}

/// Orchestrates uploads against a metadata store and a storage backend
#[derive(Clone)]
pub struct UploadPipeline {
    store: MetadataStore,
    storage: Arc<dyn AssetStorage>,
    locks: SessionLocks,
}

impl UploadPipeline {
    pub fn new(store: MetadataStore, storage: Arc<dyn AssetStorage>, locks: SessionLocks) -> Self {
        Self { store, storage, locks }
    }

    /// Store `body` as `{session}/{filename}` and commit its record
    ///
    /// `body` is `None` when the request carried no payload, which is a
    /// client error; an empty payload is a valid zero-byte asset.
    pub async fn upload(
        &self,
        session: &str,
        filename: &str,
        body: Option<&[u8]>,
    ) -> Result<UploadReceipt> {
        let mut tracker = StageTracker::new(session, filename);

        match self.run(&mut tracker, body).await {
            Ok(receipt) => {
                tracing::info!(
                    session,
                    asset = %receipt.asset_key,
                    size = receipt.record.size,
                    updated = receipt.record.updated,
                    outcome = ?receipt.outcome,
                    "upload committed"
                );
                Ok(receipt)
            }
            Err(e) => {
                let failed_at = tracker.stage;
                tracker.advance(UploadStage::Failed);
                if e.is_client_error() {
                    tracing::info!(session, filename, error = %e, "upload rejected");
                } else {
                    tracing::warn!(session, filename, %failed_at, error = %e, "upload failed");
                }
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        tracker: &mut StageTracker<'_>,
        body: Option<&[u8]>,
    ) -> Result<UploadReceipt> {
        let session = tracker.session;
        let filename = tracker.filename;

        validate_segment("session", session)?;
        validate_segment("filename", filename)?;
        let bytes = body.ok_or_else(|| VaultError::invalid("request body is required"))?;
        let key = asset_key(filename);
        if key.is_empty() {
            return Err(VaultError::invalid(format!(
                "filename has an empty asset key: {}",
                filename
            )));
        }

        let guard = self.locks.acquire(session).await;

        let prior = match self.store.find_by_session(session).await? {
            Some(document) => {
                let prior = document.asset(key).cloned();
                match &prior {
                    Some(record) => tracing::info!(
                        session,
                        asset = key,
                        updated = record.updated,
                        "asset exists, overwriting"
                    ),
                    None => tracing::debug!(session, asset = key, "new asset in existing session"),
                }
                prior
            }
            None => {
                tracing::info!(session, "no document for session, creating");
                None
            }
        };

        self.storage.ensure_session_directory(session).await?;
        tracker.advance(UploadStage::DirectoryEnsured);

        let dest = self.storage.asset_path(session, filename);
        let staged = StagedFile::new(self.storage.staging_path(session, filename));
        let digest = self.write_and_verify(tracker, staged.path(), bytes).await?;

        let path = dest.display().to_string();
        let fields = AssetFields {
            path: path.clone(),
            modified: Utc::now(),
            size: digest.bytes,
            mime: mime_for_filename(filename).to_string(),
            hash: digest.hash,
        };

        // A different filename with the same stem leaves the old file unreferenced
        let superseded = prior
            .filter(|p| p.path != path)
            .map(|p| PathBuf::from(p.path));

        let pending = PendingCommit {
            session: session.to_string(),
            key: key.to_string(),
            staged,
            dest,
            fields,
            superseded,
        };
        let pipeline = self.clone();
        let (record, outcome) = tokio::spawn(async move {
            let _guard = guard;
            pipeline.publish_and_commit(pending).await
        })
        .await
        .map_err(|e| VaultError::Internal(format!("commit task failed: {}", e)))??;
        tracker.advance(UploadStage::Committed);

        Ok(UploadReceipt {
            session: session.to_string(),
            asset_key: key.to_string(),
            path,
            outcome,
            record,
        })
    }

    /// Persist, re-read and size-check the staged bytes
    async fn write_and_verify(
        &self,
        tracker: &mut StageTracker<'_>,
        staged: &Path,
        bytes: &[u8],
    ) -> Result<ContentDigest> {
        self.storage.write_asset(staged, bytes).await?;
        tracker.advance(UploadStage::Written);

        let digest = self.storage.hash_asset(staged).await?;
        tracker.advance(UploadStage::Hashed);

        let expected = bytes.len() as u64;
        let on_disk = self.storage.stat_size(staged).await?;
        for actual in [on_disk, digest.bytes] {
            if actual != expected {
                return Err(IntegrityError::SizeMismatch {
                    path: staged.display().to_string(),
                    expected,
                    actual,
                }
                .into());
            }
        }
        tracker.advance(UploadStage::VerifiedSize);

        Ok(digest)
    }

    /// Swap the verified file into place and commit its record, undoing the
    /// swap if the commit fails
    async fn publish_and_commit(
        &self,
        pending: PendingCommit,
    ) -> Result<(AssetRecord, UpsertOutcome)> {
        let PendingCommit {
            session,
            key,
            staged,
            dest,
            fields,
            superseded,
        } = pending;

        let backup = self.storage.set_aside(&dest).await?;
        if let Err(e) = self.storage.publish(staged.path(), &dest).await {
            self.restore(backup, &dest).await;
            return Err(e);
        }
        staged.disarm();

        let committed = match self.store.upsert_asset(&session, &key, &fields).await {
            Ok(committed) => committed,
            Err(e) => {
                tracing::error!(
                    session = %session,
                    asset = %key,
                    path = %fields.path,
                    error = %e,
                    "metadata commit failed, restoring previous file"
                );
                self.restore(backup, &dest).await;
                return Err(e);
            }
        };

        if let Some(backup) = backup {
            self.discard_quietly(&backup).await;
        }
        if let Some(previous) = superseded {
            self.discard_quietly(&previous).await;
        }
        Ok(committed)
    }

    /// Move a set-aside file back to `dest`, or clear `dest` if nothing was there
    async fn restore(&self, backup: Option<PathBuf>, dest: &Path) {
        match backup {
            Some(backup) => {
                if let Err(e) = self.storage.publish(&backup, dest).await {
                    tracing::error!(
                        backup = %backup.display(),
                        dest = %dest.display(),
                        error = %e,
                        "failed to restore previous file"
                    );
                }
            }
            None => self.discard_quietly(dest).await,
        }
    }

    async fn discard_quietly(&self, path: &Path) {
        if let Err(e) = self.storage.discard(path).await {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to remove unreferenced file"
            );
        }
    }
}
