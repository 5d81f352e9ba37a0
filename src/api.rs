//! HTTP interface.
//!
//! Routes are thin adapters: they authenticate the owner header, validate the
//! request shape, and delegate to the ingestion and chat services. All tenant
//! scoping happens below this layer.

use crate::{
    chat::{ChatError, ChatRequest, ChatResponse, ChatService},
    config::get_config,
    processing::{IngestError, IngestionService, UploadedDocument},
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{delete, get, post},
};
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::json;
use std::{convert::Infallible, sync::Arc};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Document ingestion pipeline.
    pub ingestion: Arc<IngestionService>,
    /// Chat answering service.
    pub chat: Arc<ChatService>,
}

/// Error surfaced to HTTP clients as a JSON body with an `error` field.
#[derive(Debug)]
pub enum ApiError {
    /// The request itself is malformed; nothing was attempted downstream.
    BadRequest(String),
    /// A downstream dependency failed while serving a valid request.
    Service(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Service(message) => (StatusCode::BAD_GATEWAY, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(error: IngestError) -> Self {
        tracing::error!(error = %error, "Ingestion failed");
        Self::Service(error.to_string())
    }
}

impl From<ChatError> for ApiError {
    fn from(error: ChatError) -> Self {
        tracing::error!(error = %error, "Chat request failed");
        Self::Service(error.to_string())
    }
}

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    let config = get_config();
    Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/chat", post(chat))
        .route("/chat/stream", post(chat_stream))
        .route("/files", get(list_files).delete(delete_all_files))
        .route("/files/:name", delete(delete_file))
        .route("/metrics", get(metrics))
        // Multipart framing and multiple files add overhead beyond the per-file cap.
        .layer(DefaultBodyLimit::max(config.max_file_bytes * 8))
        .with_state(state)
}

/// Pull the tenant identity from the `X-Owner-Id` header.
fn require_owner(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-owner-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|owner| !owner.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest("Missing X-Owner-Id header".to_string()))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Response body for a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Human-readable summary.
    pub message: String,
    /// Number of documents that produced chunks.
    pub files_processed: usize,
    /// Total chunks committed across all documents.
    pub chunks_created: usize,
}

async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let owner_id = require_owner(&headers)?;
    let config = get_config();

    let mut documents = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| ApiError::BadRequest(format!("Invalid multipart body: {error}")))?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if !name.to_ascii_lowercase().ends_with(".pdf") {
            return Err(ApiError::BadRequest(format!(
                "Only PDF files are supported, got: {name}"
            )));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|error| ApiError::BadRequest(format!("Failed to read {name}: {error}")))?;
        if bytes.len() > config.max_file_bytes {
            return Err(ApiError::BadRequest(format!(
                "File {name} exceeds the {} byte limit",
                config.max_file_bytes
            )));
        }
        documents.push(UploadedDocument {
            name,
            bytes: bytes.to_vec(),
        });
    }

    if documents.is_empty() {
        return Err(ApiError::BadRequest("No files provided".to_string()));
    }

    let outcome = state.ingestion.ingest(&owner_id, documents).await?;
    Ok(Json(UploadResponse {
        message: format!("Successfully processed {} files", outcome.files_processed),
        files_processed: outcome.files_processed,
        chunks_created: outcome.chunks_created,
    }))
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let owner_id = require_owner(&headers)?;
    request.validate().map_err(ApiError::BadRequest)?;
    let response = state.chat.answer(&owner_id, &request).await?;
    Ok(Json(response))
}

async fn chat_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let owner_id = require_owner(&headers)?;
    request.validate().map_err(ApiError::BadRequest)?;

    let events = state
        .chat
        .clone()
        .stream_events(owner_id, request)
        .map(|event| {
            Ok::<_, Infallible>(
                Event::default()
                    .json_data(&event)
                    .unwrap_or_else(|_| Event::default().data("{\"type\":\"error\"}")),
            )
        });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn list_files(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let owner_id = require_owner(&headers)?;
    let files = state.ingestion.list_documents(&owner_id).await?;
    Ok(Json(json!({ "files": files })))
}

async fn delete_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let owner_id = require_owner(&headers)?;
    let deleted = state.ingestion.delete_document(&owner_id, &name).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

async fn delete_all_files(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let owner_id = require_owner(&headers)?;
    let deleted = state.ingestion.delete_all_documents(&owner_id).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

async fn metrics(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let snapshot = state.ingestion.metrics_snapshot();
    let total_points = state
        .ingestion
        .collection_count()
        .await
        .map_err(ApiError::from)?;
    Ok(Json(json!({
        "documents_ingested": snapshot.documents_ingested,
        "chunks_ingested": snapshot.chunks_ingested,
        "total_points": total_points,
    })))
}
