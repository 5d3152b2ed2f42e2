//! Session Vault - session-scoped binary asset store
//!
//! Main entry point for the HTTP service.
//!
//! Usage: `session-vault [config.json]`. Environment variables override
//! values from the file (or the built-in defaults when no file is given).

use std::path::PathBuf;

use anyhow::Context;
use session_vault::asset::{shutdown_signal, AssetServer};
use session_vault::logging::LoggingSystem;
use session_vault::{VaultConfig, VaultContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => VaultConfig::load(&path)
            .await
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => VaultConfig::from_env().context("reading configuration from environment")?,
    };

    // Kept alive for the whole process so file output is flushed on exit
    let _logging_system = match LoggingSystem::init(config.logging.clone()) {
        Ok(system) => {
            tracing::info!(
                level = %system.log_level(),
                directory = ?system.log_directory(),
                "logging system initialized"
            );
            Some(system)
        }
        Err(e) => {
            eprintln!("Failed to initialize logging system: {}. Using basic logging.", e);
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                )
                .init();
            None
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting session vault");

    let context = VaultContext::open(config)
        .await
        .context("opening metadata store and file root")?;

    let server = AssetServer::new(&context);
    let served = server.start(shutdown_signal()).await;

    context.close().await;
    served.context("serving HTTP")?;

    tracing::info!("session vault stopped");
    Ok(())
}
