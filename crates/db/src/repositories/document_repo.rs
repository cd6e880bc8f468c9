//! Repository for the `documents` table (the document ledger).
//!
//! Status transitions are guarded in SQL: `complete` and `fail` only touch a
//! row that is currently UPLOADING, so a stale worker can never overwrite a
//! newer outcome.

use sgpi_core::document::{DocumentPayload, MAX_UPLOAD_ATTEMPTS, SHORTCUT_MIME_TYPE};
use sgpi_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::document::{
    CompletedUpload, CreateDocument, CreateLinkDocument, Document, StatusCount,
};
use crate::models::status::DocumentStatusId;

const COLUMNS: &str = "id, package_id, original_name, mime_type, size_bytes, status_id, \
                       retry_count, error_log, local_staging_path, remote_object_id, \
                       remote_view_link, remote_download_link, external_redirect_link, \
                       uploaded_by, created_at, updated_at";

/// Note appended to `error_log` when an UPLOADING row is found abandoned.
pub const INTERRUPTED_NOTE: &str = "upload interrupted before completion";

/// Ledger operations on documents.
pub struct DocumentRepo;

impl DocumentRepo {
    /// Insert a staged upload in PENDING status.
    pub async fn insert_pending(
        executor: impl sqlx::PgExecutor<'_>,
        input: &CreateDocument,
    ) -> Result<Document, sqlx::Error> {
        let query = format!(
            "INSERT INTO documents
                (package_id, original_name, mime_type, size_bytes, status_id,
                 local_staging_path, remote_object_id, uploaded_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        let payload = DocumentPayload::Unresolved;
        sqlx::query_as::<_, Document>(&query)
            .bind(input.package_id)
            .bind(&input.original_name)
            .bind(&input.mime_type)
            .bind(input.size_bytes)
            .bind(DocumentStatusId::Pending.id())
            .bind(&input.local_staging_path)
            .bind(payload.column_value())
            .bind(&input.uploaded_by)
            .fetch_one(executor)
            .await
    }

    /// Insert several staged uploads in one transaction: either every row
    /// is created or none is.
    pub async fn insert_pending_batch(
        pool: &PgPool,
        inputs: &[CreateDocument],
    ) -> Result<Vec<Document>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            created.push(Self::insert_pending(&mut *tx, input).await?);
        }
        tx.commit().await?;
        Ok(created)
    }

    /// Insert a pure link document. Links have no bytes to relocate, so they
    /// are born COMPLETED with size 0.
    pub async fn insert_link(
        pool: &PgPool,
        input: &CreateLinkDocument,
    ) -> Result<Document, sqlx::Error> {
        let query = format!(
            "INSERT INTO documents
                (package_id, original_name, mime_type, size_bytes, status_id,
                 remote_object_id, remote_view_link, remote_download_link,
                 external_redirect_link, uploaded_by)
             VALUES ($1, $2, $3, 0, $4, $5, $6, $6, $6, $7)
             RETURNING {COLUMNS}"
        );
        let payload = DocumentPayload::ExternalLink(input.url.clone());
        sqlx::query_as::<_, Document>(&query)
            .bind(input.package_id)
            .bind(&input.name)
            .bind(SHORTCUT_MIME_TYPE)
            .bind(DocumentStatusId::Completed.id())
            .bind(payload.column_value())
            .bind(&input.url)
            .bind(&input.uploaded_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Document>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM documents WHERE id = $1");
        sqlx::query_as::<_, Document>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Oldest eligible document without claiming it.
    ///
    /// Eligible means PENDING, or ERROR with attempts left. Dead-lettered
    /// rows are never returned.
    pub async fn next_eligible(pool: &PgPool) -> Result<Option<Document>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM documents
             WHERE status_id = $1 OR (status_id = $2 AND retry_count < $3)
             ORDER BY created_at ASC, id ASC
             LIMIT 1"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(DocumentStatusId::Pending.id())
            .bind(DocumentStatusId::Error.id())
            .bind(MAX_UPLOAD_ATTEMPTS)
            .fetch_optional(pool)
            .await
    }

    /// Atomically claim the oldest eligible document by marking it UPLOADING.
    ///
    /// Uses `FOR UPDATE SKIP LOCKED` so concurrent claimers never get the
    /// same row.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<Document>, sqlx::Error> {
        let query = format!(
            "UPDATE documents \
             SET status_id = $1, updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM documents \
                 WHERE status_id = $2 OR (status_id = $3 AND retry_count < $4) \
                 ORDER BY created_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(DocumentStatusId::Uploading.id())
            .bind(DocumentStatusId::Pending.id())
            .bind(DocumentStatusId::Error.id())
            .bind(MAX_UPLOAD_ATTEMPTS)
            .fetch_optional(pool)
            .await
    }

    /// Mark an UPLOADING document COMPLETED, record its remote metadata and
    /// release the staging path in the same statement.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        upload: &CompletedUpload,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE documents SET
                status_id = $2,
                remote_object_id = $3,
                remote_view_link = $4,
                remote_download_link = $5,
                external_redirect_link = $6,
                local_staging_path = NULL,
                updated_at = NOW()
             WHERE id = $1 AND status_id = $7",
        )
        .bind(id)
        .bind(DocumentStatusId::Completed.id())
        .bind(&upload.remote_object_id)
        .bind(&upload.view_link)
        .bind(&upload.download_link)
        .bind(&upload.external_redirect_link)
        .bind(DocumentStatusId::Uploading.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark an UPLOADING document ERROR, append `message` to its error log
    /// and count the attempt. The staging path is left untouched.
    pub async fn fail(pool: &PgPool, id: DbId, message: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE documents SET
                status_id = $2,
                retry_count = retry_count + 1,
                error_log = CASE WHEN error_log IS NULL OR error_log = '' THEN $3
                                 ELSE error_log || E'\\n' || $3 END,
                updated_at = NOW()
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(DocumentStatusId::Error.id())
        .bind(message)
        .bind(DocumentStatusId::Uploading.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move UPLOADING rows not touched since `older_than` to ERROR, counting
    /// the interrupted attempt. Returns the number of rows requeued.
    pub async fn requeue_stale(pool: &PgPool, older_than: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE documents SET
                status_id = $1,
                retry_count = retry_count + 1,
                error_log = CASE WHEN error_log IS NULL OR error_log = '' THEN $2
                                 ELSE error_log || E'\\n' || $2 END,
                updated_at = NOW()
             WHERE status_id = $3 AND updated_at < $4",
        )
        .bind(DocumentStatusId::Error.id())
        .bind(INTERRUPTED_NOTE)
        .bind(DocumentStatusId::Uploading.id())
        .bind(older_than)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Operator reset of an ERROR document: back to PENDING with a fresh
    /// attempt budget. Returns `None` if the document is not in ERROR.
    pub async fn reset_for_retry(pool: &PgPool, id: DbId) -> Result<Option<Document>, sqlx::Error> {
        let query = format!(
            "UPDATE documents SET status_id = $2, retry_count = 0, updated_at = NOW()
             WHERE id = $1 AND status_id = $3
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(id)
            .bind(DocumentStatusId::Pending.id())
            .bind(DocumentStatusId::Error.id())
            .fetch_optional(pool)
            .await
    }

    /// All documents of a package in creation order.
    pub async fn list_by_package(
        pool: &PgPool,
        package_id: DbId,
    ) -> Result<Vec<Document>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM documents WHERE package_id = $1 ORDER BY created_at, id"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(package_id)
            .fetch_all(pool)
            .await
    }

    /// COMPLETED documents of a package in creation order.
    pub async fn completed_for_package(
        pool: &PgPool,
        package_id: DbId,
    ) -> Result<Vec<Document>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM documents
             WHERE package_id = $1 AND status_id = $2
             ORDER BY created_at, id"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(package_id)
            .bind(DocumentStatusId::Completed.id())
            .fetch_all(pool)
            .await
    }

    pub async fn count_by_package(pool: &PgPool, package_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents WHERE package_id = $1")
            .bind(package_id)
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    /// Staging paths still referenced by a document.
    pub async fn staged_paths(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT local_staging_path FROM documents WHERE local_staging_path IS NOT NULL",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(path,)| path).collect())
    }

    /// Number of documents per status.
    pub async fn status_counts(pool: &PgPool) -> Result<Vec<StatusCount>, sqlx::Error> {
        sqlx::query_as::<_, StatusCount>(
            "SELECT status_id, COUNT(*) AS count FROM documents GROUP BY status_id ORDER BY status_id",
        )
        .fetch_all(pool)
        .await
    }

    /// Number of ERROR documents that exhausted their attempts.
    pub async fn dead_letter_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM documents WHERE status_id = $1 AND retry_count >= $2",
        )
        .bind(DocumentStatusId::Error.id())
        .bind(MAX_UPLOAD_ATTEMPTS)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Delete a document row. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
