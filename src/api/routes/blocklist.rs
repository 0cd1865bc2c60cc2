//! Blocklist handlers.

use super::{BlocklistQuery, BlocklistResponse};
use crate::api::AppState;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};

/// GET /blocklist - Blocklisted releases, newest first
#[utoipa::path(
    get,
    path = "/api/v1/blocklist",
    tag = "blocklist",
    params(
        ("limit" = Option<i64>, Query, description = "Maximum number of entries to return"),
        ("offset" = Option<i64>, Query, description = "Number of entries to skip")
    ),
    responses(
        (status = 200, description = "Blocklist entries", body = BlocklistResponse),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn list_blocklist(
    State(state): State<AppState>,
    Query(query): Query<BlocklistQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(50).clamp(1, 1000) as usize;
    let offset = query.offset.unwrap_or(0).max(0) as usize;

    match state.manager.list_blocklist(limit, offset).await {
        Ok((items, total)) => (
            StatusCode::OK,
            Json(BlocklistResponse {
                items,
                total,
                limit,
                offset,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list blocklist");
            e.into_response()
        }
    }
}
