//! HTTP ingress: multipart upload in, JSON out.
//!
//! Routes:
//!
//! * `POST /ingest` — multipart `file` + `file_type`, answers
//!   `{ "extracted_text": ... }`.
//! * `POST /submit` — same upload, then runs skill evaluation on the
//!   extracted text and answers the full [`SkillEvaluation`].
//! * `GET /health` — liveness probe.
//!
//! Malformed requests (missing parts, unknown `file_type`) answer 400
//! with `{ "error": ... }`; pipeline and provider failures answer 500 in
//! the same shape.

use crate::error::IngestError;
use crate::ingest::IngestionPipeline;
use crate::providers::TextCompleter;
use crate::skills;
use crate::submission::{FileKind, SubmissionFile};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Uploads up to 512 MiB; videos dominate and compressed lectures can be
/// hundreds of megabytes.
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestionPipeline>,
    pub completer: Arc<dyn TextCompleter>,
}

/// Error envelope for every non-2xx response.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Internal(m) => {
                error!("request failed: {m}");
                (StatusCode::INTERNAL_SERVER_ERROR, m)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            // The client sent something we refuse by design, not a fault.
            IngestError::UnsupportedFormat(_) => ApiError::BadRequest(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Build the router with all routes and middleware attached.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ingest", post(ingest))
        .route("/submit", post(submit))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(addr: std::net::SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {addr}");
    axum::serve(listener, router(state)).await
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Pull `file` and `file_type` out of the multipart form.
///
/// The kind string is parsed before any bytes are staged, so an
/// unsupported format is rejected without touching the filesystem.
async fn read_submission(mut multipart: Multipart) -> Result<SubmissionFile, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut kind_str: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("unreadable multipart body: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("unreadable file part: {e}")))?;
                upload = Some((name, bytes.to_vec()));
            }
            Some("file_type") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("unreadable file_type: {e}")))?;
                kind_str = Some(value);
            }
            _ => {} // unknown parts are ignored
        }
    }

    let (name, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;
    let kind_str =
        kind_str.ok_or_else(|| ApiError::BadRequest("Missing required field: file_type".to_string()))?;
    let kind = FileKind::parse(&kind_str).map_err(ApiError::from)?;
    Ok(SubmissionFile::new(name, kind, bytes))
}

async fn ingest(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let file = read_submission(multipart).await?;
    let output = state.pipeline.ingest(file).await?;
    Ok(Json(json!({ "extracted_text": output.extracted_text })))
}

async fn submit(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<skills::SkillEvaluation>, ApiError> {
    let file = read_submission(multipart).await?;
    let output = state.pipeline.ingest(file).await?;
    let evaluation = skills::evaluate(&output.extracted_text, &state.completer).await?;
    Ok(Json(evaluation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_maps_to_bad_request() {
        let api: ApiError = IngestError::UnsupportedFormat("xyz".into()).into();
        assert!(matches!(api, ApiError::BadRequest(_)));
    }

    #[test]
    fn other_ingest_errors_map_to_internal() {
        let api: ApiError = IngestError::Timeout { secs: 600 }.into();
        assert!(matches!(api, ApiError::Internal(_)));
        let api: ApiError = IngestError::VideoDecode { detail: "bad moov atom".into() }.into();
        assert!(matches!(api, ApiError::Internal(_)));
    }
}
