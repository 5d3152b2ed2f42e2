//! Session Vault Core Module
//!
//! This module contains the shared foundations:
//! - Configuration management
//! - Error types and handling
//! - Utility functions (key derivation, content types, name validation)

pub mod config;
pub mod error;
pub mod utils;

// Re-export commonly used items
pub use config::VaultConfig;
pub use error::{Result, VaultError};
