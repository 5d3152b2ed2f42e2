//! Configuration module for Session Vault
//!
//! Handles service configuration:
//! - Listen address and port
//! - Metadata database location and pool tuning
//! - Base directory for asset files
//! - Upload limits and logging
//!
//! Values come from built-in defaults, an optional JSON file, and finally
//! environment overrides.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use crate::core::error::{ConfigError, Result};
use crate::db::{DatabaseConfig, SynchronousMode};
use crate::logging::{LogLevel, LoggingConfig};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8080;

/// Default request body limit (64 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Environment variable names
pub const ENV_PORT: &str = "PORT";
pub const ENV_BIND: &str = "VAULT_BIND";
pub const ENV_DB_PATH: &str = "VAULT_DB_PATH";
pub const ENV_BASE_DIR: &str = "VAULT_BASE_DIR";
pub const ENV_MAX_UPLOAD_BYTES: &str = "VAULT_MAX_UPLOAD_BYTES";
pub const ENV_LOG_LEVEL: &str = "VAULT_LOG_LEVEL";
pub const ENV_DB_MAX_CONNECTIONS: &str = "VAULT_DB_MAX_CONNECTIONS";
pub const ENV_DB_BUSY_TIMEOUT_MS: &str = "VAULT_DB_BUSY_TIMEOUT_MS";
pub const ENV_DB_SYNCHRONOUS: &str = "VAULT_DB_SYNCHRONOUS";

/// Connection pool tuning for the metadata database
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub busy_timeout_ms: u32,
    pub enable_wal: bool,
    pub synchronous: SynchronousMode,
}

impl Default for PoolSettings {
    fn default() -> Self {
        let defaults = DatabaseConfig::default();
        Self {
            max_connections: defaults.max_connections,
            busy_timeout_ms: defaults.busy_timeout_ms,
            enable_wal: defaults.enable_wal,
            synchronous: defaults.synchronous,
        }
    }
}

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Port the HTTP layer listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Interface to bind
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// SQLite file holding session documents
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Root of the `{base_dir}/{session}/{filename}` layout
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Largest accepted upload body
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Metadata pool tuning
    #[serde(default)]
    pub pool: PoolSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "session-vault", "session-vault")
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_database_path() -> PathBuf {
    data_dir().join("metadata.db")
}

fn default_base_dir() -> PathBuf {
    data_dir().join("files")
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            database_path: default_database_path(),
            base_dir: default_base_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            pool: PoolSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl VaultConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read a JSON config file, then apply environment overrides
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let content = tokio::fs::read_to_string(path).await?;
        let mut config: VaultConfig = serde_json::from_str(&content).map_err(|e| {
            ConfigError::ParseFailed {
                reason: format!("{}: {}", path.display(), e),
            }
        })?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(ENV_PORT) {
            self.port = parse_value(ENV_PORT, &port)?;
        }
        if let Some(bind) = lookup(ENV_BIND) {
            self.bind_address = parse_value(ENV_BIND, &bind)?;
        }
        if let Some(db_path) = lookup(ENV_DB_PATH) {
            self.database_path = PathBuf::from(db_path);
        }
        if let Some(base_dir) = lookup(ENV_BASE_DIR) {
            self.base_dir = PathBuf::from(base_dir);
        }
        if let Some(limit) = lookup(ENV_MAX_UPLOAD_BYTES) {
            self.max_upload_bytes = parse_value(ENV_MAX_UPLOAD_BYTES, &limit)?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level =
                LogLevel::parse(&level).ok_or_else(|| invalid(ENV_LOG_LEVEL, &level))?;
        }
        if let Some(max) = lookup(ENV_DB_MAX_CONNECTIONS) {
            let max: u32 = parse_value(ENV_DB_MAX_CONNECTIONS, &max)?;
            if max == 0 {
                return Err(invalid(ENV_DB_MAX_CONNECTIONS, "0").into());
            }
            self.pool.max_connections = max;
        }
        if let Some(timeout) = lookup(ENV_DB_BUSY_TIMEOUT_MS) {
            self.pool.busy_timeout_ms = parse_value(ENV_DB_BUSY_TIMEOUT_MS, &timeout)?;
        }
        if let Some(mode) = lookup(ENV_DB_SYNCHRONOUS) {
            self.pool.synchronous =
                SynchronousMode::parse(&mode).ok_or_else(|| invalid(ENV_DB_SYNCHRONOUS, &mode))?;
        }
        Ok(())
    }

    /// Socket address for the HTTP listener
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Pool settings for the metadata database
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::with_path(self.database_path.clone())
            .with_max_connections(self.pool.max_connections.max(1))
            .with_busy_timeout(self.pool.busy_timeout_ms)
            .with_wal(self.pool.enable_wal)
            .with_synchronous(self.pool.synchronous)
    }
}

fn invalid(field: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn parse_value<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(field, value).into())
}
