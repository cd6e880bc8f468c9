//! Document ledger row and DTOs.

use serde::Serialize;
use sgpi_core::document::{DocumentPayload, DocumentStatus};
use sgpi_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use crate::models::status::{DocumentStatusId, StatusId};

/// A row from the `documents` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Document {
    pub id: DbId,
    pub package_id: DbId,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub status_id: StatusId,
    pub retry_count: i32,
    pub error_log: Option<String>,
    /// Staged file path; `None` only once the document is COMPLETED.
    pub local_staging_path: Option<String>,
    #[serde(skip)]
    pub remote_object_id: String,
    pub remote_view_link: Option<String>,
    pub remote_download_link: Option<String>,
    pub external_redirect_link: Option<String>,
    pub uploaded_by: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Document {
    /// Domain status. Rows always reference a seeded status, anything else
    /// is reported as `Error`.
    pub fn status(&self) -> DocumentStatus {
        DocumentStatusId::from_id(self.status_id)
            .map(DocumentStatus::from)
            .unwrap_or(DocumentStatus::Error)
    }

    /// Where this document's bytes live.
    pub fn payload(&self) -> DocumentPayload {
        let link = self
            .external_redirect_link
            .as_deref()
            .or(self.remote_view_link.as_deref());
        DocumentPayload::from_columns(&self.remote_object_id, link)
    }
}

/// DTO for a freshly staged upload.
#[derive(Debug, Clone)]
pub struct CreateDocument {
    pub package_id: DbId,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub local_staging_path: String,
    pub uploaded_by: String,
}

/// DTO for a pure link document.
#[derive(Debug, Clone)]
pub struct CreateLinkDocument {
    pub package_id: DbId,
    /// Already suffixed with `.url`.
    pub name: String,
    pub url: String,
    pub uploaded_by: String,
}

/// Remote metadata recorded when an upload becomes durable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedUpload {
    pub remote_object_id: String,
    pub view_link: String,
    pub download_link: String,
    pub external_redirect_link: Option<String>,
}

/// Number of documents in one status.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusCount {
    pub status_id: StatusId,
    pub count: i64,
}

/// Serialized view of a document for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    #[serde(flatten)]
    pub row: Document,
    pub status: DocumentStatus,
    pub payload: DocumentPayload,
    pub dead_letter: bool,
}

impl From<Document> for DocumentView {
    fn from(row: Document) -> Self {
        let status = row.status();
        Self {
            payload: row.payload(),
            dead_letter: status.is_dead_letter(row.retry_count),
            status,
            row,
        }
    }
}
