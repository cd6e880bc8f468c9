//! Document ledger interface used by the upload worker and the archive
//! assembler, and its PostgreSQL implementation.

use async_trait::async_trait;
use sgpi_core::types::{DbId, Timestamp};
use sgpi_db::models::document::{CompletedUpload, Document, StatusCount};
use sgpi_db::models::package::Package;
use sgpi_db::repositories::{DocumentRepo, PackageRepo};
use sgpi_db::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persisted document state. The ledger is the only source of truth for
/// what is eligible for upload; nothing is queued in memory.
#[async_trait]
pub trait DocumentLedger: Send + Sync {
    /// Oldest eligible document, without claiming it.
    async fn next_eligible(&self) -> Result<Option<Document>, LedgerError>;

    /// Claim the oldest eligible document by marking it UPLOADING.
    async fn claim_next(&self) -> Result<Option<Document>, LedgerError>;

    /// Remote container of a package, if the package exists and has one.
    async fn package_container(&self, package_id: DbId) -> Result<Option<String>, LedgerError>;

    /// UPLOADING -> COMPLETED, releasing the staging path. Returns `false`
    /// if the document was no longer UPLOADING.
    async fn complete(&self, id: DbId, upload: &CompletedUpload) -> Result<bool, LedgerError>;

    /// UPLOADING -> ERROR, appending `message` and counting the attempt.
    async fn fail(&self, id: DbId, message: &str) -> Result<bool, LedgerError>;

    /// Move UPLOADING rows untouched since `older_than` to ERROR.
    async fn requeue_stale(&self, older_than: Timestamp) -> Result<u64, LedgerError>;

    async fn find_package(&self, id: DbId) -> Result<Option<Package>, LedgerError>;

    /// COMPLETED documents of a package in creation order.
    async fn completed_documents(&self, package_id: DbId) -> Result<Vec<Document>, LedgerError>;

    async fn status_counts(&self) -> Result<Vec<StatusCount>, LedgerError>;
}

/// [`DocumentLedger`] over the `documents` and `packages` tables.
#[derive(Clone)]
pub struct PgLedger {
    pool: DbPool,
}

impl PgLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentLedger for PgLedger {
    async fn next_eligible(&self) -> Result<Option<Document>, LedgerError> {
        Ok(DocumentRepo::next_eligible(&self.pool).await?)
    }

    async fn claim_next(&self) -> Result<Option<Document>, LedgerError> {
        Ok(DocumentRepo::claim_next(&self.pool).await?)
    }

    async fn package_container(&self, package_id: DbId) -> Result<Option<String>, LedgerError> {
        Ok(PackageRepo::container_id(&self.pool, package_id).await?)
    }

    async fn complete(&self, id: DbId, upload: &CompletedUpload) -> Result<bool, LedgerError> {
        Ok(DocumentRepo::complete(&self.pool, id, upload).await?)
    }

    async fn fail(&self, id: DbId, message: &str) -> Result<bool, LedgerError> {
        Ok(DocumentRepo::fail(&self.pool, id, message).await?)
    }

    async fn requeue_stale(&self, older_than: Timestamp) -> Result<u64, LedgerError> {
        Ok(DocumentRepo::requeue_stale(&self.pool, older_than).await?)
    }

    async fn find_package(&self, id: DbId) -> Result<Option<Package>, LedgerError> {
        Ok(PackageRepo::find_by_id(&self.pool, id).await?)
    }

    async fn completed_documents(&self, package_id: DbId) -> Result<Vec<Document>, LedgerError> {
        Ok(DocumentRepo::completed_for_package(&self.pool, package_id).await?)
    }

    async fn status_counts(&self) -> Result<Vec<StatusCount>, LedgerError> {
        Ok(DocumentRepo::status_counts(&self.pool).await?)
    }
}
