//! HTTP surface.
//!
//! JSON over HTTP per the public contract: `POST /analyze` accepts raw
//! text, a multipart file upload, or a URL; `GET /task_status/{id}` and
//! `GET /result/{id}` poll queued work; `GET /health` reports liveness.
//! Every error leaves as `{error, code, message}` with the status the
//! error kind maps to.

use crate::config::{Config, ForceMode};
use crate::dispatch::{AnalyzeInput, AnalyzeResponse, Dispatcher};
use crate::error::{CaseStrainerError, ErrorBody};
use crate::progress::ResultStore;
use crate::queue::JobQueue;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router, extract::FromRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
    pub queue: Arc<dyn JobQueue>,
    pub store: Arc<ResultStore>,
}

/// Error wrapper carrying the typed body and status mapping.
pub struct ApiError(pub CaseStrainerError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody::from_error(&self.0))).into_response()
    }
}

impl From<CaseStrainerError> for ApiError {
    fn from(err: CaseStrainerError) -> Self {
        Self(err)
    }
}

/// JSON request body for `POST /analyze`.
#[derive(Debug, Deserialize)]
struct AnalyzeBody {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
    url: Option<String>,
    force_mode: Option<String>,
}

#[derive(Debug, Serialize)]
struct TaskStatusBody {
    status: &'static str,
    phase: &'static str,
    percent: u8,
    heartbeat_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state.config.max_input_bytes + 64 * 1024;

    Router::new()
        .route("/analyze", post(analyze))
        .route("/task_status/:task_id", get(task_status))
        .route("/task_cancel/:task_id", post(task_cancel))
        .route("/result/:result_id", get(result))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn parse_force_mode(raw: Option<&str>) -> Result<Option<ForceMode>, ApiError> {
    match raw {
        None | Some("") => Ok(None),
        Some(s) => ForceMode::parse(s)
            .map(Some)
            .map_err(|e| ApiError(CaseStrainerError::Input(e))),
    }
}

/// `POST /analyze`, branching on the request content type: multipart file
/// uploads and JSON bodies share one route.
async fn analyze(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
) -> Result<Response, ApiError> {
    // Declared-size precheck so oversize uploads map to 413 before any
    // body bytes are read.
    let limit = state.config.max_input_bytes + 64 * 1024;
    if let Some(declared) = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
    {
        if declared > limit {
            return Err(ApiError(CaseStrainerError::InputTooLarge {
                bytes: declared,
                limit: state.config.max_input_bytes,
            }));
        }
    }

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let (input, force_mode) = if content_type.starts_with("multipart/form-data") {
        read_multipart(state.clone(), request).await?
    } else {
        read_json(&state, request).await?
    };

    match state.dispatcher.analyze(input, force_mode).await? {
        AnalyzeResponse::Immediate(result) => Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "mode": "immediate", "result": result })),
        )
            .into_response()),
        AnalyzeResponse::Queued { task_id } => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "mode": "queued", "task_id": task_id })),
        )
            .into_response()),
    }
}

async fn read_json(
    state: &AppState,
    request: Request<axum::body::Body>,
) -> Result<(AnalyzeInput, Option<ForceMode>), ApiError> {
    let limit = state.config.max_input_bytes + 64 * 1024;
    let bytes = axum::body::to_bytes(request.into_body(), limit)
        .await
        .map_err(|e| ApiError(CaseStrainerError::Input(format!("unreadable body: {e}"))))?;
    let body: AnalyzeBody = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError(CaseStrainerError::Input(format!("malformed JSON body: {e}"))))?;

    let force_mode = parse_force_mode(body.force_mode.as_deref())?;
    let input = match body.kind.as_str() {
        "text" => AnalyzeInput::Text {
            text: body.text.ok_or_else(|| {
                ApiError(CaseStrainerError::Input(
                    "type \"text\" requires a text field".into(),
                ))
            })?,
        },
        "url" => AnalyzeInput::Url {
            url: body.url.ok_or_else(|| {
                ApiError(CaseStrainerError::Input(
                    "type \"url\" requires a url field".into(),
                ))
            })?,
        },
        other => {
            return Err(ApiError(CaseStrainerError::Input(format!(
                "unknown input type {other:?}; expected \"text\" or \"url\""
            ))));
        }
    };
    Ok((input, force_mode))
}

async fn read_multipart(
    state: AppState,
    request: Request<axum::body::Body>,
) -> Result<(AnalyzeInput, Option<ForceMode>), ApiError> {
    let mut multipart = Multipart::from_request(request, &state)
        .await
        .map_err(|e| ApiError(CaseStrainerError::Input(format!("malformed multipart: {e}"))))?;

    let mut file: Option<(Vec<u8>, String)> = None;
    let mut force_mode_raw: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError(CaseStrainerError::Input(format!("malformed multipart: {e}"))))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError(CaseStrainerError::Input(format!("unreadable file field: {e}")))
                })?;
                file = Some((bytes.to_vec(), mime));
            }
            "force_mode" => {
                force_mode_raw = field.text().await.ok();
            }
            other => {
                debug!(field = other, "ignoring unknown multipart field");
            }
        }
    }

    let (bytes, mime) = file.ok_or_else(|| {
        ApiError(CaseStrainerError::Input(
            "multipart upload requires a file field".into(),
        ))
    })?;
    let force_mode = parse_force_mode(force_mode_raw.as_deref())?;
    Ok((AnalyzeInput::File { bytes, mime }, force_mode))
}

/// `GET /task_status/{task_id}`
async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskStatusBody>, ApiError> {
    let job = state
        .queue
        .get(&task_id)
        .await?
        .ok_or_else(|| ApiError(CaseStrainerError::NotFound(format!("task {task_id}"))))?;
    Ok(Json(TaskStatusBody {
        status: job.status.as_str(),
        phase: job.phase.as_str(),
        percent: job.percent,
        heartbeat_at: job.heartbeat_at,
        result_id: job.result_id,
        error: job.error,
    }))
}

/// `POST /task_cancel/{task_id}` requests cooperative cancellation.
async fn task_cancel(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .queue
        .get(&task_id)
        .await?
        .ok_or_else(|| ApiError(CaseStrainerError::NotFound(format!("task {task_id}"))))?;
    state.queue.cancel(&task_id).await?;
    Ok(Json(
        serde_json::json!({ "task_id": task_id, "status": "cancel_requested" }),
    ))
}

/// `GET /result/{result_id}`
async fn result(
    State(state): State<AppState>,
    Path(result_id): Path<String>,
) -> Result<Response, ApiError> {
    let result = state
        .store
        .get(&result_id)?
        .ok_or_else(|| ApiError(CaseStrainerError::NotFound(format!("result {result_id}"))))?;
    Ok(Json(result).into_response())
}

/// `GET /health`
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::casestrainer_version(),
    }))
}
