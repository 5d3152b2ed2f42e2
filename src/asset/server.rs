//! Asset server implementation
//!
//! Binds the HTTP surface to a [`VaultContext`]:
//! - `GET /` service info and session index
//! - `GET /:session` session document
//! - `PUT|POST /:session/:filename` upload
//! - `GET /:session/:filename` streamed download

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::error::AssetError;
use super::routes::{
    audit_middleware, fetch_asset, health, service_index, session_document, upload_asset,
};
use crate::context::VaultContext;
use crate::pipeline::{AssetReader, UploadPipeline};

/// Shared state for the handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: UploadPipeline,
    pub reader: AssetReader,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(context: &VaultContext) -> Self {
        Self {
            pipeline: context.pipeline(),
            reader: context.reader(),
            max_upload_bytes: context.config().max_upload_bytes,
        }
    }
}

/// HTTP front end for the vault
pub struct AssetServer {
    state: AppState,
    addr: SocketAddr,
}

impl AssetServer {
    pub fn new(context: &VaultContext) -> Self {
        Self {
            state: AppState::new(context),
            addr: context.config().listen_addr(),
        }
    }

    /// Address the server binds to
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Build the router with all routes and middleware
    pub fn build_router(&self) -> Router {
        let state = self.state.clone();

        Router::new()
            .route("/", get(service_index))
            .route("/health", get(health))
            .route("/:session", get(session_document))
            .route(
                "/:session/:filename",
                get(fetch_asset).put(upload_asset).post(upload_asset),
            )
            .layer(DefaultBodyLimit::max(state.max_upload_bytes))
            .layer(middleware::from_fn(audit_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Serve until `shutdown` resolves
    pub async fn start<F>(&self, shutdown: F) -> Result<(), AssetError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| AssetError::BindFailed {
                reason: format!("{}: {}", self.addr, e),
            })?;

        let local = listener
            .local_addr()
            .map_err(|e| AssetError::BindFailed { reason: e.to_string() })?;
        tracing::info!(addr = %local, "asset server listening");

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| AssetError::Internal { reason: e.to_string() })?;

        tracing::info!("asset server stopped");
        Ok(())
    }
}

/// Resolves on Ctrl-C (and SIGTERM on unix)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
