//! Asset server routes and middleware
//!
//! Handlers for the session index, session documents, uploads and streamed
//! downloads, plus the request audit middleware.

use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, Path, State},
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use super::error::AssetError;
use super::server::AppState;
use crate::db::{SessionDocument, SessionSummary, UpsertOutcome};
use crate::pipeline::UploadReceipt;

/// Body of `GET /`
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub sessions: Vec<SessionSummary>,
}

/// Body returned by a successful upload
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub session: String,
    pub asset_key: String,
    pub path: String,
    pub updated: u64,
    pub size: u64,
    pub hash: String,
    pub mime: String,
    pub modified: DateTime<Utc>,
}

impl From<UploadReceipt> for UploadResponse {
    fn from(receipt: UploadReceipt) -> Self {
        Self {
            session: receipt.session,
            asset_key: receipt.asset_key,
            path: receipt.path,
            updated: receipt.record.updated,
            size: receipt.record.size,
            hash: receipt.record.hash,
            mime: receipt.record.mime,
            modified: receipt.record.modified,
        }
    }
}

/// Logs method, path, status and latency of every request
pub async fn audit_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let latency_ms = started.elapsed().as_millis() as u64;
    if status.is_server_error() {
        tracing::warn!(%method, %path, status = status.as_u16(), latency_ms, "request");
    } else {
        tracing::info!(%method, %path, status = status.as_u16(), latency_ms, "request");
    }

    response
}

/// Route: GET /
pub async fn service_index(State(state): State<AppState>) -> Result<Json<ServiceInfo>, AssetError> {
    let sessions = state.reader.list_sessions().await?;
    Ok(Json(ServiceInfo {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions,
    }))
}

/// Route: GET /:session
pub async fn session_document(
    State(state): State<AppState>,
    Path(session): Path<String>,
) -> Result<Json<SessionDocument>, AssetError> {
    let document = state.reader.session_document(&session).await?;
    Ok(Json(document))
}

/// Route: PUT|POST /:session/:filename
///
/// A request with neither `Content-Length` nor `Transfer-Encoding` carries
/// no body and is rejected; `Content-Length: 0` stores an empty asset.
pub async fn upload_asset(
    State(state): State<AppState>,
    Path((session, filename)): Path<(String, String)>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), AssetError> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AssetError::PayloadTooLarge {
                limit: state.max_upload_bytes,
            }
        } else {
            AssetError::BadBody {
                reason: rejection.body_text(),
            }
        }
    })?;

    let declared = headers.contains_key(header::CONTENT_LENGTH)
        || headers.contains_key(header::TRANSFER_ENCODING);
    let payload = (declared || !body.is_empty()).then_some(body.as_ref());

    let receipt = state.pipeline.upload(&session, &filename, payload).await?;
    let status = match receipt.outcome {
        UpsertOutcome::Created => StatusCode::CREATED,
        UpsertOutcome::Overwritten => StatusCode::OK,
    };

    Ok((status, Json(UploadResponse::from(receipt))))
}

/// Route: GET /:session/:filename
///
/// Streams the bytes recorded for the filename's asset key.
pub async fn fetch_asset(
    State(state): State<AppState>,
    Path((session, filename)): Path<(String, String)>,
) -> Result<Response, AssetError> {
    let asset = state.reader.open(&session, &filename).await?;

    tracing::debug!(
        session = %session,
        asset = %asset.asset_key,
        size = asset.file.len,
        "streaming asset"
    );

    let stream = ReaderStream::new(asset.file.file);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, asset.record.mime)
        .header(header::CONTENT_LENGTH, asset.file.len)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .map_err(|e| AssetError::Internal { reason: e.to_string() })
}

/// Route: GET /health
pub async fn health() -> impl IntoResponse {
    "OK"
}
