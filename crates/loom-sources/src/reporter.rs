//! The reporter HTTP surface (§6.2): the boundary external collectors push
//! observations through, and the surface `loomctl status`/`/health`
//! tooling reads from. Routes are mounted under `/api/v1`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use loom_core::LoomError;
use loom_ingest::{Flusher, IngestionBuffer, IngestionEntry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::health::{self, StatusSnapshot};
use crate::manager::SourceManager;
use crate::source::SourceDescriptor;

#[derive(Clone)]
pub struct ReporterState {
    pub buffer: Arc<IngestionBuffer>,
    pub flusher: Arc<Flusher>,
    pub sources: Arc<SourceManager>,
}

/// Builds the reporter's axum router, ready to be served with
/// `axum::serve` by the binary that owns the listener (`loomctl serve`).
pub fn router(state: ReporterState) -> Router {
    Router::new()
        .route("/api/v1/events", post(create_event).get(list_events))
        .route("/api/v1/events/send", post(send_events))
        .route("/api/v1/sources", get(list_sources).post(create_source))
        .route("/api/v1/sources/:id", axum::routing::put(replace_source).delete(delete_source))
        .route("/api/v1/status", get(status))
        .route("/api/v1/health", get(health_all))
        .route("/api/v1/health/live", get(health_live))
        .route("/api/v1/health/ready", get(health_ready))
        .route("/api/v1/sources/:id/webhook", post(webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `{code, message, details?}` error envelope (§6.2).
pub struct ApiError {
    code: &'static str,
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn validation(message: impl Into<String>) -> Self {
        Self { code: "VALIDATION_ERROR", status: StatusCode::UNPROCESSABLE_ENTITY, message: message.into() }
    }
}

impl From<LoomError> for ApiError {
    fn from(error: LoomError) -> Self {
        let status = match &error {
            LoomError::Storage { kind, .. } => match kind {
                loom_core::StorageErrorKind::NotFound => StatusCode::NOT_FOUND,
                loom_core::StorageErrorKind::Conflict => StatusCode::CONFLICT,
                loom_core::StorageErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                loom_core::StorageErrorKind::Invalid => StatusCode::UNPROCESSABLE_ENTITY,
            },
            LoomError::Source(_) => StatusCode::BAD_REQUEST,
            LoomError::Serde(_) | LoomError::Yaml(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let code = match status {
            StatusCode::NOT_FOUND => "NOT_FOUND",
            StatusCode::CONFLICT => "CONFLICT",
            StatusCode::SERVICE_UNAVAILABLE => "SERVICE_UNAVAILABLE",
            StatusCode::UNPROCESSABLE_ENTITY => "VALIDATION_ERROR",
            StatusCode::BAD_REQUEST => "BAD_REQUEST",
            _ => "INTERNAL_ERROR",
        };
        Self { code, status, message: error.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "code": self.code, "message": self.message })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct CreateEventRequest {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(rename = "sourceId")]
    source_id: String,
    payload: Value,
}

async fn create_event(
    State(state): State<ReporterState>,
    Json(request): Json<CreateEventRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.event_type.trim().is_empty() {
        return Err(ApiError::validation("type must not be empty"));
    }
    if request.source_id.trim().is_empty() {
        return Err(ApiError::validation("sourceId must not be empty"));
    }

    let entry = IngestionEntry::new(request.event_type, request.source_id, request.payload);
    state.buffer.enqueue(entry.clone()).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[derive(Debug, Deserialize)]
struct ListEventsQuery {
    status: Option<String>,
    limit: Option<usize>,
}

async fn list_events(
    State(state): State<ReporterState>,
    Query(query): Query<ListEventsQuery>,
) -> Json<Vec<IngestionEntry>> {
    let limit = query.limit.unwrap_or(100);
    let mut entries = state.buffer.peek(usize::MAX);
    if let Some(status) = query.status {
        entries.retain(|entry| format!("{:?}", entry.metadata.state).eq_ignore_ascii_case(&status));
    }
    entries.truncate(limit);
    Json(entries)
}

#[derive(Debug, Deserialize, Default)]
struct SendEventsRequest {
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Serialize)]
struct SendEventsResponse {
    sent: usize,
    failed: usize,
    buffered: usize,
}

async fn send_events(
    State(state): State<ReporterState>,
    body: Option<Json<SendEventsRequest>>,
) -> ApiResult<Json<SendEventsResponse>> {
    let force = body.map(|Json(request)| request.force).unwrap_or(false);

    let report = if force || state.flusher.is_healthy() {
        state.flusher.run_once().await?
    } else {
        Default::default()
    };

    Ok(Json(SendEventsResponse {
        sent: report.acked.len(),
        failed: report.dead_lettered.len(),
        buffered: state.buffer.len(),
    }))
}

async fn list_sources(State(state): State<ReporterState>) -> Json<Vec<SourceDescriptor>> {
    Json(state.sources.list())
}

async fn create_source(
    State(state): State<ReporterState>,
    Json(descriptor): Json<SourceDescriptor>,
) -> ApiResult<impl IntoResponse> {
    state.sources.create(descriptor.clone())?;
    Ok((StatusCode::CREATED, Json(descriptor)))
}

async fn replace_source(
    State(state): State<ReporterState>,
    Path(id): Path<String>,
    Json(descriptor): Json<SourceDescriptor>,
) -> ApiResult<Json<SourceDescriptor>> {
    state.sources.replace(&id, descriptor.clone())?;
    Ok(Json(descriptor))
}

async fn delete_source(State(state): State<ReporterState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.sources.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn webhook(
    State(state): State<ReporterState>,
    Path(id): Path<String>,
    headers: axum::http::HeaderMap,
    body: bytes::Bytes,
) -> ApiResult<Json<serde_json::Value>> {
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|value| value.to_str().ok());
    let accepted = state.sources.handle_webhook(&id, signature, &body).await?;
    Ok(Json(serde_json::json!({ "accepted": accepted })))
}

fn snapshot(state: &ReporterState) -> StatusSnapshot {
    health::aggregate(state.flusher.connectivity(), state.buffer.snapshot(), state.sources.list())
}

async fn status(State(state): State<ReporterState>) -> Json<StatusSnapshot> {
    Json(snapshot(&state))
}

async fn health_all(State(state): State<ReporterState>) -> Json<serde_json::Value> {
    let snapshot = snapshot(&state);
    Json(serde_json::json!({ "status": snapshot.level, "checks": snapshot.checks }))
}

async fn health_live(State(state): State<ReporterState>) -> Response {
    health_gate(&state)
}

async fn health_ready(State(state): State<ReporterState>) -> Response {
    health_gate(&state)
}

fn health_gate(state: &ReporterState) -> Response {
    let snapshot = snapshot(state);
    let status = if snapshot.is_ready() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(serde_json::json!({ "status": snapshot.level, "checks": snapshot.checks }))).into_response()
}
