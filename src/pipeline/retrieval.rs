//! Retrieval path
//!
//! Resolves `{session}/{filename}` through the metadata store before touching
//! the filesystem. A file on disk without a committed record is never served.

use std::path::Path;
use std::sync::Arc;

use crate::core::error::{Result, VaultError};
use crate::core::utils::{asset_key, validate_segment};
use crate::db::{AssetRecord, MetadataStore, SessionDocument, SessionSummary};
use crate::storage::{AssetFile, AssetStorage};

/// An asset resolved through its record and opened for streaming
#[derive(Debug)]
pub struct RetrievedAsset {
    pub asset_key: String,
    pub record: AssetRecord,
    pub file: AssetFile,
}

/// Read-side access to sessions and their assets
#[derive(Clone)]
pub struct AssetReader {
    store: MetadataStore,
    storage: Arc<dyn AssetStorage>,
}

impl AssetReader {
    pub fn new(store: MetadataStore, storage: Arc<dyn AssetStorage>) -> Self {
        Self { store, storage }
    }

    /// Fetch a session's full document
    pub async fn session_document(&self, session: &str) -> Result<SessionDocument> {
        validate_segment("session", session)?;

        self.store
            .find_by_session(session)
            .await?
            .ok_or_else(|| VaultError::SessionNotFound {
                session: session.to_string(),
            })
    }

    /// Open the bytes recorded for `filename`'s asset key
    ///
    /// The filename only selects the key; the bytes come from the path in
    /// the record, which is the file written by the last committed upload.
    pub async fn open(&self, session: &str, filename: &str) -> Result<RetrievedAsset> {
        validate_segment("filename", filename)?;
        let document = self.session_document(session).await?;

        let key = asset_key(filename);
        let record = document.asset(key).cloned().ok_or_else(|| VaultError::AssetNotFound {
            session: session.to_string(),
            asset_key: key.to_string(),
        })?;

        let file = match self.storage.read_asset(Path::new(&record.path)).await {
            Ok(file) => file,
            Err(e) => {
                if matches!(e, VaultError::ContentMissing { .. }) {
                    tracing::warn!(
                        session,
                        asset = key,
                        path = %record.path,
                        "record exists but file is missing"
                    );
                }
                return Err(e);
            }
        };

        if file.len != record.size {
            tracing::warn!(
                session,
                asset = key,
                recorded = record.size,
                on_disk = file.len,
                "file size differs from record"
            );
        }

        Ok(RetrievedAsset {
            asset_key: key.to_string(),
            record,
            file,
        })
    }

    /// Every known session with its asset count
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        self.store.list_sessions().await
    }
}
