//! Queue handlers: reading the merged queue and removing rows.

use super::{BulkRemoveRequest, QueueQuery, QueueResource, QueueResponse};
use crate::actions::RemovalOptions;
use crate::api::AppState;
use crate::error::ApiError;
use crate::types::QueueId;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

/// GET /queue - One page of the merged queue
#[utoipa::path(
    get,
    path = "/api/v1/queue",
    tag = "queue",
    params(
        ("page" = Option<usize>, Query, description = "Page number, 1-based (default: 1)"),
        ("pageSize" = Option<usize>, Query, description = "Records per page (default: 10)"),
        ("sortKey" = Option<String>, Query, description = "Sort column (default: timeleft)"),
        ("sortDirection" = Option<String>, Query, description = "ascending or descending"),
        ("includeUnknownArtistItems" = Option<bool>, Query, description = "Keep rows with no matched artist"),
        ("includeArtist" = Option<bool>, Query, description = "Embed the matched artist"),
        ("includeAlbum" = Option<bool>, Query, description = "Embed the matched albums"),
        ("artistIds" = Option<String>, Query, description = "Comma separated artist ids"),
        ("protocol" = Option<String>, Query, description = "usenet or torrent"),
        ("quality" = Option<String>, Query, description = "Comma separated quality ids")
    ),
    responses(
        (status = 200, description = "One page of the queue", body = QueueResponse),
        (status = 400, description = "Invalid query parameters", body = crate::error::ApiError)
    )
)]
pub async fn get_queue(
    State(state): State<AppState>,
    Query(query): Query<QueueQuery>,
) -> impl IntoResponse {
    let filter = match query.filter() {
        Ok(filter) => filter,
        Err(message) => {
            return (StatusCode::BAD_REQUEST, Json(ApiError::validation(message))).into_response();
        }
    };

    let page = state.manager.get_queue(&query.paging(), &filter);
    let info = page.info();
    let records = page
        .records
        .iter()
        .map(|entry| QueueResource::from_entry(entry, query.include_artist, query.include_album))
        .collect();

    let response = QueueResponse {
        page: info.page,
        page_size: info.page_size,
        sort_key: info.sort_key,
        sort_direction: info.sort_direction,
        total_records: info.total_records,
        records,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// DELETE /queue/:id - Remove one queue row
#[utoipa::path(
    delete,
    path = "/api/v1/queue/{id}",
    tag = "queue",
    params(
        ("id" = i64, Path, description = "Queue row id"),
        ("removeFromClient" = Option<bool>, Query, description = "Remove the download and its data from the backend (default: true)"),
        ("blocklist" = Option<bool>, Query, description = "Blocklist the release or mark the download as failed"),
        ("skipRedownload" = Option<bool>, Query, description = "Do not search for a replacement after marking as failed"),
        ("changeCategory" = Option<bool>, Query, description = "Move the download to the imported category instead of removing it")
    ),
    responses(
        (status = 200, description = "Queue row removed"),
        (status = 400, description = "Backend no longer configured", body = crate::error::ApiError),
        (status = 404, description = "Queue row not found", body = crate::error::ApiError),
        (status = 501, description = "Backend cannot perform the requested step", body = crate::error::ApiError),
        (status = 502, description = "Backend failed", body = crate::error::ApiError)
    )
)]
pub async fn remove_queue_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(options): Query<RemovalOptions>,
) -> impl IntoResponse {
    match state.manager.remove_queue_item(QueueId(id), options).await {
        Ok(()) => (StatusCode::OK, Json(json!({}))).into_response(),
        Err(e) => {
            tracing::warn!(queue_id = id, error = %e, "Failed to remove queue item");
            e.into_response()
        }
    }
}

/// DELETE /queue/bulk - Remove several queue rows
///
/// Unknown ids are skipped and per-row failures are logged; the response is always `{}`.
#[utoipa::path(
    delete,
    path = "/api/v1/queue/bulk",
    tag = "queue",
    params(
        ("removeFromClient" = Option<bool>, Query, description = "Remove the downloads and their data from the backend (default: true)"),
        ("blocklist" = Option<bool>, Query, description = "Blocklist the releases or mark the downloads as failed"),
        ("skipRedownload" = Option<bool>, Query, description = "Do not search for replacements after marking as failed"),
        ("changeCategory" = Option<bool>, Query, description = "Move the downloads to the imported category instead of removing them")
    ),
    request_body = BulkRemoveRequest,
    responses(
        (status = 200, description = "Bulk removal processed")
    )
)]
pub async fn remove_queue_items(
    State(state): State<AppState>,
    Query(options): Query<RemovalOptions>,
    Json(request): Json<BulkRemoveRequest>,
) -> impl IntoResponse {
    let report = state
        .manager
        .remove_queue_items(&request.ids, options)
        .await;

    if !report.failed.is_empty() {
        tracing::warn!(
            failed = report.failed.len(),
            removed = report.removed.len(),
            "Bulk queue removal finished with failures"
        );
    }

    (StatusCode::OK, Json(json!({})))
}
