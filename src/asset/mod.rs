//! HTTP layer
//!
//! Thin axum surface over the upload pipeline and the retrieval path:
//! - JSON session index and session documents
//! - Uploads answered with the committed record
//! - Downloads streamed from disk with the recorded content type

mod error;
mod routes;
mod server;

pub use error::{AssetError, ErrorBody, ErrorDetail};
pub use routes::{ServiceInfo, UploadResponse};
pub use server::{shutdown_signal, AppState, AssetServer};
