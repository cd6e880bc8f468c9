//! Handlers for discipline reference data.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use sgpi_core::error::CoreError;
use sgpi_db::models::discipline::CreateDiscipline;
use sgpi_db::repositories::DisciplineRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::caller::{Caller, RequireCoordinator};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /disciplines
pub async fn list_disciplines(
    State(state): State<AppState>,
    _caller: Caller,
) -> AppResult<impl IntoResponse> {
    let items = DisciplineRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: items }))
}

/// POST /disciplines
pub async fn create_discipline(
    State(state): State<AppState>,
    _coordinator: RequireCoordinator,
    Json(body): Json<CreateDiscipline>,
) -> AppResult<impl IntoResponse> {
    let input = CreateDiscipline {
        name: body.name.trim().to_string(),
        course_level: body.course_level.trim().to_string(),
    };
    if input.name.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Discipline name must not be empty".into(),
        )));
    }

    let created = DisciplineRepo::create(&state.pool, &input).await?;
    tracing::info!(discipline_id = created.id, name = %created.name, "Discipline created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: created })))
}
