//! Handlers for submission packages: creation with remote hierarchy
//! provisioning, renaming, retention-guarded deletion and bulk download.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use sgpi_cloud::hierarchy::HierarchyRequest;
use sgpi_core::error::CoreError;
use sgpi_core::retention::check_package_deletion;
use sgpi_core::types::DbId;
use sgpi_db::models::package::{CreatePackage, UpdatePackage};
use sgpi_db::repositories::{DisciplineRepo, DocumentRepo, PackageRepo, SemesterRepo};

use super::{ensure_can_manage, ensure_package_exists, remove_staged_file, trash_remote};
use crate::error::{AppError, AppResult};
use crate::middleware::caller::{Caller, RequireCoordinator};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePackageRequest {
    pub title: String,
    pub discipline_id: DbId,
}

fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Package title must not be empty".into(),
        )));
    }
    Ok(title.to_string())
}

// ---------------------------------------------------------------------------
// POST /packages
// ---------------------------------------------------------------------------

/// Create a package in the active semester.
///
/// The semester, discipline and package containers are provisioned on the
/// remote provider before the row is inserted. Provider failures surface
/// here as 502 and nothing is persisted.
pub async fn create_package(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<CreatePackageRequest>,
) -> AppResult<impl IntoResponse> {
    let title = validate_title(&body.title)?;

    let semester = SemesterRepo::find_active(&state.pool).await?.ok_or_else(|| {
        AppError::Core(CoreError::Validation(
            "No active semester; a coordinator must open one first".into(),
        ))
    })?;

    let discipline = DisciplineRepo::find_by_id(&state.pool, body.discipline_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Discipline",
            id: body.discipline_id,
        }))?;

    let provisioned = state
        .resolver
        .provision(&HierarchyRequest {
            semester_label: &semester.label,
            semester_root_id: semester.remote_root_id.as_deref(),
            discipline_name: &discipline.name,
            package_title: &title,
        })
        .await?;

    if semester.remote_root_id.is_none() {
        SemesterRepo::set_remote_root(&state.pool, semester.id, &provisioned.semester_root_id)
            .await?;
    }

    let package = PackageRepo::create(
        &state.pool,
        &CreatePackage {
            title,
            owner_id: caller.user_id.clone(),
            semester_id: semester.id,
            discipline_id: discipline.id,
            remote_folder_id: provisioned.package.id,
            remote_folder_link: provisioned.package.view_link,
        },
    )
    .await?;

    tracing::info!(
        package_id = package.id,
        container_id = %package.remote_folder_id,
        discipline_container_id = %provisioned.discipline_container_id,
        user_id = %caller.user_id,
        "Package created"
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: package })))
}

// ---------------------------------------------------------------------------
// PUT /packages/{id}
// ---------------------------------------------------------------------------

/// Rename a package, remotely first and then locally.
pub async fn update_package(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<DbId>,
    Json(body): Json<UpdatePackage>,
) -> AppResult<impl IntoResponse> {
    let package = ensure_package_exists(&state.pool, id).await?;
    ensure_can_manage(&caller, &package)?;
    let title = validate_title(&body.title)?;

    if !package.remote_folder_id.is_empty() {
        state
            .storage
            .rename_object(&package.remote_folder_id, &title)
            .await?;
    }

    let updated = PackageRepo::update_title(&state.pool, id, &title)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Package",
            id,
        }))?;

    tracing::info!(package_id = id, title = %updated.title, "Package renamed");
    Ok(Json(DataResponse { data: updated }))
}

// ---------------------------------------------------------------------------
// DELETE /packages/{id}
// ---------------------------------------------------------------------------

/// Delete a package and its documents, subject to the retention rule.
///
/// The remote container is trashed (not destroyed) before the rows go.
pub async fn delete_package(
    State(state): State<AppState>,
    RequireCoordinator(caller): RequireCoordinator,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let package = ensure_package_exists(&state.pool, id).await?;

    let document_count = DocumentRepo::count_by_package(&state.pool, id).await?;
    check_package_deletion(package.created_at, document_count, Utc::now())?;

    trash_remote(state.storage.as_ref(), &package.remote_folder_id).await?;

    let documents = DocumentRepo::list_by_package(&state.pool, id).await?;
    PackageRepo::delete(&state.pool, id).await?;
    for path in documents.iter().filter_map(|d| d.local_staging_path.as_deref()) {
        remove_staged_file(path).await;
    }

    tracing::info!(
        package_id = id,
        container_id = %package.remote_folder_id,
        document_count,
        user_id = %caller.user_id,
        "Package deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// GET /packages/{id}/archive
// ---------------------------------------------------------------------------

/// Stream every COMPLETED document of a package as one zip.
///
/// An empty package is rejected before the response starts.
pub async fn download_archive(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<DbId>,
) -> AppResult<Response> {
    let package = ensure_package_exists(&state.pool, id).await?;
    ensure_can_manage(&caller, &package)?;

    let archive = state.archives.prepare(id).await?;
    let disposition = format!("attachment; filename=\"{}\"", archive.file_name());

    tracing::info!(
        package_id = id,
        entries = archive.entries().len(),
        user_id = %caller.user_id,
        "Streaming package archive"
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(archive.into_stream()))
        .map_err(|e| AppError::InternalError(e.to_string()))
}
