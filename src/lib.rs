//! Session Vault - session-scoped binary asset store
//!
//! This crate provides:
//! - Content hashing of stored bytes (BLAKE3)
//! - File persistence under `{base_dir}/{session}/{filename}`
//! - One metadata document per session in SQLite (WAL mode)
//! - A write-verify-commit upload pipeline with per-session serialization
//! - Record-driven retrieval and an HTTP surface over both

pub mod asset;
pub mod context;
pub mod core;
pub mod db;
pub mod logging;
pub mod pipeline;
pub mod storage;

// Re-export commonly used items
pub use asset::{AssetError, AssetServer};
pub use context::VaultContext;
pub use core::config::VaultConfig;
pub use core::error::{Result, VaultError};
pub use db::{AssetRecord, DatabaseConfig, MetadataStore, SessionDocument};
pub use pipeline::{AssetReader, UploadPipeline, UploadReceipt, UploadStage};
pub use storage::{AssetStorage, LocalAssetStorage};
