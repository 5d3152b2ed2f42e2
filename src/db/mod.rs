//! Database module for Session Vault
//!
//! SQLite connectivity (WAL mode) for the asset metadata store, plus schema
//! migrations.

pub mod metadata;
pub mod migration;


pub use metadata::{
    AssetFields, AssetRecord, MetadataStore, SessionDocument, SessionSummary, UpsertOutcome,
};

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::core::error::{Result, StorageError};

/// SQLite `synchronous` pragma
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynchronousMode {
    /// May lose the last commits on power loss
    Off,
    /// Durable in WAL mode except across power loss
    #[default]
    Normal,
    /// fsync on every commit
    Full,
}

impl SynchronousMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "off" => Some(Self::Off),
            "normal" => Some(Self::Normal),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

/// SQLite connection pool configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database file path
    pub db_path: PathBuf,

    /// Maximum number of connections
    pub max_connections: u32,

    /// Minimum number of connections
    pub min_connections: u32,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,

    /// Whether to enable WAL mode
    pub enable_wal: bool,

    /// Synchronous mode
    pub synchronous: SynchronousMode,

    /// Busy timeout in milliseconds
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("metadata.db"),
            max_connections: 8,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
            enable_wal: true,
            synchronous: SynchronousMode::Normal,
            busy_timeout_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    /// Create a new DatabaseConfig with the specified path
    pub fn with_path(db_path: PathBuf) -> Self {
        Self {
            db_path,
            ..Default::default()
        }
    }

    /// Set WAL mode
    pub fn with_wal(mut self, enable: bool) -> Self {
        self.enable_wal = enable;
        self
    }

    /// Set maximum connections
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set synchronous mode
    pub fn with_synchronous(mut self, mode: SynchronousMode) -> Self {
        self.synchronous = mode;
        self
    }

    /// Set how long a connection waits on a locked database
    pub fn with_busy_timeout(mut self, millis: u32) -> Self {
        self.busy_timeout_ms = millis;
        self
    }
}

/// Create a database connection pool with the given configuration
///
/// The parent directory of the database file is created if missing.
pub async fn create_database_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            StorageError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                reason: e.to_string(),
            }
        })?;
    }

    let connect_options = SqliteConnectOptions::new()
        .filename(&config.db_path)
        .create_if_missing(true)
        .journal_mode(if config.enable_wal {
            SqliteJournalMode::Wal
        } else {
            SqliteJournalMode::Delete
        })
        .synchronous(match config.synchronous {
            SynchronousMode::Off => SqliteSynchronous::Off,
            SynchronousMode::Normal => SqliteSynchronous::Normal,
            SynchronousMode::Full => SqliteSynchronous::Full,
        })
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms as u64))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect_with(connect_options)
        .await?;

    tracing::info!(
        "Database pool created: {:?} (WAL: {}, synchronous: {:?}, connections: {})",
        config.db_path,
        config.enable_wal,
        config.synchronous,
        config.max_connections
    );

    Ok(pool)
}

/// WAL checkpoint manager for periodic checkpointing
pub struct WalCheckpointManager {
    pool: SqlitePool,
    checkpoint_interval: Duration,
}

impl WalCheckpointManager {
    /// Create a new WAL checkpoint manager
    pub fn new(pool: SqlitePool, checkpoint_interval: Duration) -> Self {
        Self {
            pool,
            checkpoint_interval,
        }
    }

    /// Start periodic checkpointing in a background task
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let pool = self.pool.clone();
        let interval = self.checkpoint_interval;

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if pool.is_closed() {
                    break;
                }

                // PASSIVE does not block writers
                if let Err(e) = sqlx::query("PRAGMA wal_checkpoint(PASSIVE)")
                    .execute(&pool)
                    .await
                {
                    tracing::warn!("WAL checkpoint failed: {}", e);
                }
            }
        })
    }

    /// Execute a full checkpoint (called on shutdown)
    pub async fn full_checkpoint(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
