//! Service context
//!
//! Owns the database pool, the storage backend and the per-session lock
//! table, and hands out the pipeline and reader that share them.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::core::config::VaultConfig;
use crate::core::error::Result;
use crate::core::utils::format_file_size;
use crate::db::migration::MigrationManager;
use crate::db::{create_database_pool, MetadataStore, WalCheckpointManager};
use crate::pipeline::{AssetReader, SessionLocks, UploadPipeline};
use crate::storage::{AssetStorage, LocalAssetStorage};

/// Interval between passive WAL checkpoints
const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(300);

/// Everything a running service needs
pub struct VaultContext {
    config: VaultConfig,
    store: MetadataStore,
    storage: Arc<dyn AssetStorage>,
    locks: SessionLocks,
    checkpoint: WalCheckpointManager,
    checkpoint_task: JoinHandle<()>,
}

impl VaultContext {
    /// Open the database, apply migrations and prepare the file root
    pub async fn open(config: VaultConfig) -> Result<Self> {
        let pool = create_database_pool(&config.database_config()).await?;

        let result = MigrationManager::new(pool.clone())
            .with_embedded_migrations()
            .migrate()
            .await?;
        if result.applied > 0 {
            tracing::info!(
                applied = ?result.applied_versions,
                version = result.current_version,
                "applied schema migrations"
            );
        }

        let storage = LocalAssetStorage::new(&config.base_dir);
        storage.init().await?;

        let checkpoint = WalCheckpointManager::new(pool.clone(), CHECKPOINT_INTERVAL);
        let checkpoint_task = checkpoint.start();

        tracing::info!(
            database = %config.database_path.display(),
            base_dir = %config.base_dir.display(),
            max_upload = %format_file_size(config.max_upload_bytes as u64),
            "vault context ready"
        );

        Ok(Self {
            config,
            store: MetadataStore::new(pool),
            storage: Arc::new(storage),
            locks: SessionLocks::new(),
            checkpoint,
            checkpoint_task,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn pipeline(&self) -> UploadPipeline {
        UploadPipeline::new(self.store.clone(), Arc::clone(&self.storage), self.locks.clone())
    }

    pub fn reader(&self) -> AssetReader {
        AssetReader::new(self.store.clone(), Arc::clone(&self.storage))
    }

    /// Stop background work, checkpoint the WAL and close the pool
    pub async fn close(self) {
        self.checkpoint_task.abort();
        if let Err(e) = self.checkpoint.full_checkpoint().await {
            tracing::warn!(error = %e, "final WAL checkpoint failed");
        }
        self.store.pool().close().await;
        tracing::info!("vault context closed");
    }
}
