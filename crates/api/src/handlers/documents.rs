//! Handlers for documents: staged uploads, link documents, status, deletion
//! and operator retry of dead-lettered uploads.

use std::path::{Path as FsPath, PathBuf};

use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use sgpi_core::document::{DocumentPayload, DocumentStatus, SHORTCUT_MIME_TYPE};
use sgpi_core::error::CoreError;
use sgpi_core::links::{link_document_name, validate_link_url, LINK_EXTENSION};
use sgpi_core::naming::staged_file_name;
use sgpi_core::types::DbId;
use sgpi_db::models::document::{CreateDocument, CreateLinkDocument, Document, DocumentView};
use sgpi_db::repositories::DocumentRepo;
use tokio::io::AsyncWriteExt;

use super::{ensure_can_manage, ensure_package_exists, remove_staged_file, trash_remote};
use crate::error::{AppError, AppResult};
use crate::middleware::caller::{Caller, RequireCoordinator};
use crate::response::DataResponse;
use crate::state::AppState;

/// Files accepted in one multipart request.
const MAX_FILES_PER_REQUEST: usize = 20;

/// MIME type recorded when the client does not send one.
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn ensure_document_exists(pool: &sqlx::PgPool, id: DbId) -> AppResult<Document> {
    DocumentRepo::find_by_id(pool, id).await?.ok_or_else(|| {
        AppError::Core(CoreError::NotFound {
            entity: "Document",
            id,
        })
    })
}

/// Load a document and check the caller may act on its package.
async fn ensure_document_access(
    state: &AppState,
    caller: &Caller,
    id: DbId,
) -> AppResult<Document> {
    let document = ensure_document_exists(&state.pool, id).await?;
    let package = ensure_package_exists(&state.pool, document.package_id).await?;
    ensure_can_manage(caller, &package)?;
    Ok(document)
}

/// Browsers often send `.url` shortcuts as octet-stream; recognise them by
/// extension so the worker extracts their target.
fn effective_mime_type(file_name: &str, declared: Option<&str>) -> String {
    let declared = declared.map(str::trim).filter(|m| !m.is_empty());
    if file_name.to_ascii_lowercase().ends_with(LINK_EXTENSION)
        && declared.map_or(true, |m| m == DEFAULT_MIME_TYPE)
    {
        return SHORTCUT_MIME_TYPE.to_string();
    }
    declared.unwrap_or(DEFAULT_MIME_TYPE).to_string()
}

/// Stream one multipart field into a new file in the staging area.
///
/// Returns the staged path and its size. A field over `limit` bytes, or any
/// I/O failure, removes the partial file.
async fn stage_field(
    field: &mut Field<'_>,
    staging_dir: &FsPath,
    original_name: &str,
    limit: u64,
) -> AppResult<(PathBuf, u64)> {
    let path = staging_dir.join(staged_file_name(
        original_name,
        Utc::now().timestamp_millis(),
    ));
    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to create staged file: {e}")))?;

    let mut size: u64 = 0;
    let written: AppResult<()> = async {
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            size += chunk.len() as u64;
            if size > limit {
                return Err(AppError::BadRequest(format!(
                    "File '{original_name}' exceeds the upload limit of {limit} bytes"
                )));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| AppError::InternalError(format!("Failed to write staged file: {e}")))?;
        }
        file.flush()
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to flush staged file: {e}")))
    }
    .await;

    drop(file);
    match written {
        Ok(()) => Ok((path, size)),
        Err(e) => {
            remove_staged_file(&path.to_string_lossy()).await;
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// POST /packages/{id}/documents
// ---------------------------------------------------------------------------

/// Stage uploaded files and queue them for relocation.
///
/// Every `file` (or `files`) field is streamed to the staging area first.
/// Only when all parts are staged are their PENDING rows inserted, in one
/// transaction, and the worker woken. A bad part fails the whole request
/// and leaves neither rows nor staged files behind. Returns 201 with the
/// created documents.
pub async fn upload_documents(
    State(state): State<AppState>,
    caller: Caller,
    Path(package_id): Path<DbId>,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let package = ensure_package_exists(&state.pool, package_id).await?;
    ensure_can_manage(&caller, &package)?;

    let staging_dir = state.pipeline.staging_dir.clone();
    tokio::fs::create_dir_all(&staging_dir)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to create staging dir: {e}")))?;

    let mut staged: Vec<CreateDocument> = Vec::new();
    if let Err(e) = stage_all(
        multipart,
        &staging_dir,
        state.pipeline.max_upload_bytes,
        package_id,
        &caller.user_id,
        &mut staged,
    )
    .await
    {
        discard_staged(&staged).await;
        return Err(e);
    }

    if staged.is_empty() {
        return Err(AppError::BadRequest(
            "Missing required 'file' field".into(),
        ));
    }

    let documents = match DocumentRepo::insert_pending_batch(&state.pool, &staged).await {
        Ok(documents) => documents,
        Err(e) => {
            discard_staged(&staged).await;
            return Err(e.into());
        }
    };

    for document in &documents {
        tracing::info!(
            document_id = document.id,
            package_id,
            size_bytes = document.size_bytes,
            user_id = %caller.user_id,
            "Document staged"
        );
    }
    state.uploads.notify();

    let created: Vec<DocumentView> = documents.into_iter().map(Into::into).collect();
    Ok((StatusCode::CREATED, Json(DataResponse { data: created })))
}

/// Stream every file part to disk, pushing one row description per part.
/// On error, `staged` holds the parts written so far.
async fn stage_all(
    mut multipart: Multipart,
    staging_dir: &FsPath,
    max_bytes: u64,
    package_id: DbId,
    uploaded_by: &str,
    staged: &mut Vec<CreateDocument>,
) -> AppResult<()> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if !matches!(field.name(), Some("file" | "files")) {
            continue;
        }
        if staged.len() >= MAX_FILES_PER_REQUEST {
            return Err(AppError::BadRequest(format!(
                "At most {MAX_FILES_PER_REQUEST} files per request"
            )));
        }

        let original_name = field
            .file_name()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::BadRequest("Every file part needs a filename".into()))?
            .to_string();
        let mime_type = effective_mime_type(&original_name, field.content_type());

        let (path, size) = stage_field(&mut field, staging_dir, &original_name, max_bytes).await?;
        staged.push(CreateDocument {
            package_id,
            original_name,
            mime_type,
            size_bytes: size as i64,
            local_staging_path: path.to_string_lossy().into_owned(),
            uploaded_by: uploaded_by.to_string(),
        });
    }
    Ok(())
}

async fn discard_staged(staged: &[CreateDocument]) {
    for doc in staged {
        remove_staged_file(&doc.local_staging_path).await;
    }
}

// ---------------------------------------------------------------------------
// POST /packages/{id}/links
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub title: String,
    pub url: String,
}

/// Add an external link to a package. Links need no relocation and are
/// COMPLETED on creation.
pub async fn add_link(
    State(state): State<AppState>,
    caller: Caller,
    Path(package_id): Path<DbId>,
    Json(body): Json<CreateLinkRequest>,
) -> AppResult<impl IntoResponse> {
    let package = ensure_package_exists(&state.pool, package_id).await?;
    ensure_can_manage(&caller, &package)?;

    let title = body.title.trim();
    if title.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Link title must not be empty".into(),
        )));
    }
    let url = body.url.trim();
    validate_link_url(url)?;

    let document = DocumentRepo::insert_link(
        &state.pool,
        &CreateLinkDocument {
            package_id,
            name: link_document_name(title),
            url: url.to_string(),
            uploaded_by: caller.user_id.clone(),
        },
    )
    .await?;

    tracing::info!(document_id = document.id, package_id, "Link document added");
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: DocumentView::from(document),
        }),
    ))
}

// ---------------------------------------------------------------------------
// GET /documents/{id}
// ---------------------------------------------------------------------------

pub async fn get_document(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let document = ensure_document_access(&state, &caller, id).await?;
    Ok(Json(DataResponse {
        data: DocumentView::from(document),
    }))
}

// ---------------------------------------------------------------------------
// DELETE /documents/{id}
// ---------------------------------------------------------------------------

/// Delete a document: trash its remote object, drop its staged file and
/// remove the row. Refused while the worker is uploading it.
pub async fn delete_document(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let document = ensure_document_access(&state, &caller, id).await?;

    if document.status() == DocumentStatus::Uploading {
        return Err(AppError::Core(CoreError::Conflict(
            "Document is being uploaded; try again shortly".into(),
        )));
    }

    if let DocumentPayload::RemoteObject(object_id) = document.payload() {
        trash_remote(state.storage.as_ref(), &object_id).await?;
    }

    DocumentRepo::delete(&state.pool, id).await?;
    if let Some(path) = document.local_staging_path.as_deref() {
        remove_staged_file(path).await;
    }

    tracing::info!(
        document_id = id,
        package_id = document.package_id,
        user_id = %caller.user_id,
        "Document deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// POST /documents/{id}/retry
// ---------------------------------------------------------------------------

/// Give a failed document a fresh set of upload attempts.
pub async fn retry_document(
    State(state): State<AppState>,
    RequireCoordinator(caller): RequireCoordinator,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let Some(document) = DocumentRepo::reset_for_retry(&state.pool, id).await? else {
        ensure_document_exists(&state.pool, id).await?;
        return Err(AppError::Core(CoreError::Conflict(
            "Only documents in ERROR can be retried".into(),
        )));
    };

    tracing::info!(
        document_id = id,
        package_id = document.package_id,
        user_id = %caller.user_id,
        "Document requeued by operator"
    );
    state.uploads.notify();
    Ok(Json(DataResponse {
        data: DocumentView::from(document),
    }))
}
