//! System handlers: health, OpenAPI, events.

use crate::api::AppState;
use crate::api::routes::BackendTestResponse;
use crate::types::Event;
use axum::{
    Json,
    extract::{Path, State},
    response::{
        IntoResponse,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

/// GET /health - Health check
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy")
    )
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let backends: Vec<&str> = state
        .manager
        .backends()
        .all()
        .iter()
        .map(|b| b.name())
        .collect();

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "backends": backends,
    }))
}

/// POST /backends/:name/test - Validate a backend's configuration
#[utoipa::path(
    post,
    path = "/api/v1/backends/{name}/test",
    tag = "system",
    params(
        ("name" = String, Path, description = "Backend instance name")
    ),
    responses(
        (status = 200, description = "Validation result", body = BackendTestResponse),
        (status = 400, description = "Unknown backend", body = crate::error::ApiError),
        (status = 502, description = "Backend unreachable", body = crate::error::ApiError)
    )
)]
pub async fn test_backend(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.manager.test_backend(&name).await {
        Ok(failures) => Json(BackendTestResponse {
            name,
            valid: failures.is_empty(),
            failures,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/api/v1/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI 3.1 specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}

/// SSE event name for a queue event
pub(crate) fn event_name(event: &Event) -> &'static str {
    match event {
        Event::QueueUpdated { .. } => "queue_updated",
        Event::PendingReleasesUpdated => "pending_releases_updated",
        Event::TrackingStopped { .. } => "tracking_stopped",
        Event::DownloadIgnored { .. } => "download_ignored",
        Event::DownloadFailed { .. } => "download_failed",
        Event::BackendUnavailable { .. } => "backend_unavailable",
        Event::Shutdown => "shutdown",
    }
}

/// GET /events - Server-sent events stream
#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "system",
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream")
    )
)]
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let receiver = state.manager.subscribe();
    let stream = BroadcastStream::new(receiver);

    let sse_stream = stream.filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json_data) => Some(Ok(SseEvent::default()
                .event(event_name(&event))
                .data(json_data))),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize event to JSON");
                None
            }
        },
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE client lagged");
            Some(Ok(SseEvent::default().event("error").data(format!(
                r#"{{"error":"lagged","skipped":{}}}"#,
                skipped
            ))))
        }
    });

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}
