use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use sgpi_cloud::StorageError;
use sgpi_core::error::CoreError;
use sgpi_pipeline::archive::ArchiveError;
use sgpi_pipeline::ledger::LedgerError;

/// PostgreSQL SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Errors returned by HTTP handlers.
///
/// Every variant renders as `{ "error": <message>, "code": <CODE> }`.
/// Retention refusals also carry `age_years` and `document_count` so the
/// client can explain why the package is kept.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The remote provider failed while the caller was waiting on it
    /// (hierarchy provisioning, rename, trash).
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

/// Status, machine code and client-facing message of an error.
type Rendered = (StatusCode, &'static str, String);

fn internal() -> Rendered {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn render_core(err: &CoreError) -> Rendered {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::RetentionPeriod { .. } => {
            (StatusCode::BAD_REQUEST, "RETENTION_PERIOD", err.to_string())
        }
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

/// `RowNotFound` is 404 and violations of the named `uq_*` constraints are
/// 409. Anything else is logged and hidden behind a 500.
fn render_sqlx(err: &sqlx::Error) -> Rendered {
    if let sqlx::Error::RowNotFound = err {
        return (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        );
    }

    let duplicate = err.as_database_error().and_then(|db| {
        let constraint = db.constraint()?;
        (db.code().as_deref() == Some(UNIQUE_VIOLATION) && constraint.starts_with("uq_"))
            .then(|| constraint.to_string())
    });
    match duplicate {
        Some(constraint) => (
            StatusCode::CONFLICT,
            "CONFLICT",
            format!("Duplicate value violates unique constraint: {constraint}"),
        ),
        None => {
            tracing::error!(error = %err, "Database error");
            internal()
        }
    }
}

impl AppError {
    fn render(&self) -> Rendered {
        match self {
            AppError::Core(err) => render_core(err),
            AppError::Database(err) => render_sqlx(err),
            AppError::Storage(err) => {
                // Provider messages can include ids and quota details.
                tracing::error!(error = %err, "Remote storage request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "STORAGE_ERROR",
                    "The remote storage provider could not complete the request".to_string(),
                )
            }
            AppError::Archive(ArchiveError::PackageNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Package with id {id} not found"),
            ),
            AppError::Archive(err @ ArchiveError::NothingToDownload(_)) => {
                (StatusCode::NOT_FOUND, "NOTHING_TO_DOWNLOAD", err.to_string())
            }
            AppError::Archive(ArchiveError::Ledger(LedgerError::Database(err))) => {
                render_sqlx(err)
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.render();
        let mut body = json!({ "error": message, "code": code });

        if let AppError::Core(CoreError::RetentionPeriod {
            age_years,
            document_count,
        }) = &self
        {
            body["age_years"] = json!(age_years);
            body["document_count"] = json!(document_count);
        }

        (status, axum::Json(body)).into_response()
    }
}
