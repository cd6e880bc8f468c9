//! Upload queue status for operators.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use sgpi_core::document::DocumentStatus;
use sgpi_db::models::status::DocumentStatusId;
use sgpi_db::repositories::DocumentRepo;

use crate::error::AppResult;
use crate::middleware::caller::Caller;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct QueueStatus {
    /// Documents per status name; every status is present.
    pub counts: BTreeMap<&'static str, i64>,
    /// ERROR documents with no attempts left.
    pub dead_letter: i64,
    /// Whether the worker is draining right now.
    pub draining: bool,
}

/// GET /uploads/queue
pub async fn queue_status(
    State(state): State<AppState>,
    _caller: Caller,
) -> AppResult<impl IntoResponse> {
    let mut counts: BTreeMap<&'static str, i64> = [
        DocumentStatus::Pending,
        DocumentStatus::Uploading,
        DocumentStatus::Completed,
        DocumentStatus::Error,
    ]
    .into_iter()
    .map(|s| (s.name(), 0))
    .collect();

    for row in DocumentRepo::status_counts(&state.pool).await? {
        if let Some(status) = DocumentStatusId::from_id(row.status_id) {
            *counts.entry(DocumentStatus::from(status).name()).or_default() += row.count;
        }
    }

    let dead_letter = DocumentRepo::dead_letter_count(&state.pool).await?;

    Ok(Json(DataResponse {
        data: QueueStatus {
            counts,
            dead_letter,
            draining: state.uploads.is_draining(),
        },
    }))
}
