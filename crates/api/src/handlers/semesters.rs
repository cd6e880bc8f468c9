//! Handlers for the academic semester calendar.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use sgpi_core::error::CoreError;
use sgpi_core::semester::label_for_date;
use sgpi_db::models::semester::CreateSemester;
use sgpi_db::repositories::SemesterRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::caller::{Caller, RequireCoordinator};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSemesterRequest {
    /// Defaults to the semester today falls in.
    #[serde(default)]
    pub label: Option<String>,
}

// ---------------------------------------------------------------------------
// POST /semesters
// ---------------------------------------------------------------------------

/// Open a semester as the single active one.
///
/// Its root container is resolved on the remote provider first; a provider
/// failure leaves the previous active semester untouched.
pub async fn create_semester(
    State(state): State<AppState>,
    RequireCoordinator(caller): RequireCoordinator,
    Json(body): Json<CreateSemesterRequest>,
) -> AppResult<impl IntoResponse> {
    let label = match body.label {
        Some(label) => label.trim().to_string(),
        None => label_for_date(Utc::now().date_naive()),
    };
    if label.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Semester label must not be empty".into(),
        )));
    }

    if SemesterRepo::find_by_label(&state.pool, &label).await?.is_some() {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Semester '{label}' already exists"
        ))));
    }

    let root_id = state.resolver.resolve_semester_root(&label).await?;
    let semester = SemesterRepo::create_active(
        &state.pool,
        &CreateSemester {
            label,
            remote_root_id: Some(root_id),
        },
    )
    .await?;

    tracing::info!(
        semester_id = semester.id,
        label = %semester.label,
        user_id = %caller.user_id,
        "Semester opened"
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: semester })))
}

// ---------------------------------------------------------------------------
// GET /semesters/active
// ---------------------------------------------------------------------------

/// The active semester, or `null` when none has been opened yet.
pub async fn get_active(
    State(state): State<AppState>,
    _caller: Caller,
) -> AppResult<impl IntoResponse> {
    let semester = SemesterRepo::find_active(&state.pool).await?;
    Ok(Json(DataResponse { data: semester }))
}
