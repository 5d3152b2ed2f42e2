//! Error types for Session Vault
//!
//! Every stage of the upload pipeline and the retrieval path reports failure
//! through these types; nothing is swallowed into an error-shaped success value.

use thiserror::Error;

/// Result type alias for Session Vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Main error type for Session Vault
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Session not found: {session}")]
    SessionNotFound { session: String },

    #[error("Asset not found: {session}/{asset_key}")]
    AssetNotFound { session: String, asset_key: String },

    #[error("Asset content missing at {path}")]
    ContentMissing { path: String },

    #[error("Integrity check failed: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database internal error: {0}")]
    DatabaseInternal(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A background task ended without producing a result
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Shorthand for an [`VaultError::InvalidRequest`]
    pub fn invalid(reason: impl Into<String>) -> Self {
        VaultError::InvalidRequest { reason: reason.into() }
    }

    /// Session, asset key, or recorded file is absent
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            VaultError::SessionNotFound { .. }
                | VaultError::AssetNotFound { .. }
                | VaultError::ContentMissing { .. }
        )
    }

    /// The caller sent something we refuse to process
    pub fn is_client_error(&self) -> bool {
        matches!(self, VaultError::InvalidRequest { .. })
    }
}

/// Post-write verification failures
#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("size mismatch for {path}: expected {expected} bytes, found {actual}")]
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("digest computation failed for {path}: {reason}")]
    DigestFailed { path: String, reason: String },
}

/// File persistence errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory {path}: {reason}")]
    DirectoryCreationFailed { path: String, reason: String },

    #[error("Path exists but is not a directory: {path}")]
    NotADirectory { path: String },

    #[error("Write failed: {path}, reason: {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("File read failed: {path}, reason: {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("Failed to publish {from} as {to}: {reason}")]
    PublishFailed {
        from: String,
        to: String,
        reason: String,
    },
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Migration failed: {reason}")]
    MigrationFailed { reason: String },

    #[error("Session already exists: {session}")]
    SessionExists { session: String },

    #[error("Store inconsistent: {count} documents found for session {session}")]
    Inconsistent { session: String, count: usize },
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                DatabaseError::QueryFailed { reason: db_err.to_string() }
            }
            sqlx::Error::PoolTimedOut => {
                DatabaseError::ConnectionFailed { reason: "Pool timed out".to_string() }
            }
            sqlx::Error::PoolClosed => {
                DatabaseError::ConnectionFailed { reason: "Pool closed".to_string() }
            }
            _ => DatabaseError::QueryFailed { reason: err.to_string() }
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("Config parse failed: {reason}")]
    ParseFailed { reason: String },

    #[error("Invalid config value: {field} = {value}")]
    InvalidValue { field: String, value: String },
}
