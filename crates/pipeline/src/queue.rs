//! Upload queue worker.
//!
//! Relocates staged files to remote storage one document at a time. A
//! single actor task owns the drain loop; [`UploadQueueHandle::notify`]
//! wakes it. Signals that arrive while a drain is running collapse into
//! one follow-up pass.
//!
//! Per document:
//!
//! ```text
//! claim (UPLOADING) -> resolve container -> upload -> extract redirect
//!   ok  -> complete (COMPLETED, staging path cleared) -> delete staged file
//!   err -> fail (ERROR, retry_count + 1), staged file kept
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sgpi_cloud::{RemoteStorage, StorageError};
use sgpi_core::document::{is_shortcut_mime, MAX_UPLOAD_ATTEMPTS};
use sgpi_core::naming::sanitize_filename;
use sgpi_core::types::{DbId, Timestamp};
use sgpi_db::models::document::{CompletedUpload, Document};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::extract::{extract_from_file, LinkExtractor};
use crate::ledger::{DocumentLedger, LedgerError};

/// Lower bound for the periodic stale-upload recheck.
const MIN_RECHECK_PERIOD: Duration = Duration::from_millis(100);

/// Why a single document could not be uploaded.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Package {package_id} has no remote container")]
    MissingContainer { package_id: DbId },

    #[error("Document {document_id} has no staged file")]
    MissingStagedFile { document_id: DbId },

    #[error("Upload into container {container_id} failed: {source}")]
    Storage {
        container_id: String,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl UploadError {
    fn container_id(&self) -> Option<&str> {
        match self {
            Self::Storage { container_id, .. } => Some(container_id),
            _ => None,
        }
    }
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub completed: usize,
    /// Failed attempts, not distinct documents.
    pub failed: usize,
}

/// The drain loop and its collaborators.
pub struct UploadQueue {
    ledger: Arc<dyn DocumentLedger>,
    storage: Arc<dyn RemoteStorage>,
    extractor: Arc<dyn LinkExtractor>,
}

impl UploadQueue {
    pub fn new(
        ledger: Arc<dyn DocumentLedger>,
        storage: Arc<dyn RemoteStorage>,
        extractor: Arc<dyn LinkExtractor>,
    ) -> Self {
        Self {
            ledger,
            storage,
            extractor,
        }
    }

    /// Start the actor task.
    ///
    /// The task drains once at startup, again on every notification, and
    /// every `stale_after` on its own. Each pass first requeues UPLOADING
    /// rows untouched for `stale_after`: the actor is the only uploader, so
    /// between passes any UPLOADING row belongs to an attempt that died.
    /// A drain in progress finishes its current document before the task
    /// stops.
    pub fn spawn(
        self,
        stale_after: Duration,
        cancel: CancellationToken,
    ) -> (UploadQueueHandle, JoinHandle<()>) {
        let handle = UploadQueueHandle {
            signal: Arc::new(Notify::new()),
            draining: Arc::new(AtomicBool::new(false)),
        };
        let task = tokio::spawn(self.run(handle.clone(), stale_after, cancel));
        (handle, task)
    }

    async fn run(self, handle: UploadQueueHandle, stale_after: Duration, cancel: CancellationToken) {
        tracing::info!(
            stale_after_secs = stale_after.as_secs(),
            "Upload queue worker started"
        );

        let period = stale_after.max(MIN_RECHECK_PERIOD);
        let mut recheck = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        recheck.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        // Startup sweep.
        handle.notify();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Upload queue worker stopping");
                    break;
                }
                _ = handle.signal.notified() => {
                    self.pass(&handle, stale_after, &cancel).await;
                }
                _ = recheck.tick() => {
                    self.pass(&handle, stale_after, &cancel).await;
                }
            }
        }
    }

    /// One actor pass: requeue abandoned uploads, then drain.
    async fn pass(&self, handle: &UploadQueueHandle, stale_after: Duration, cancel: &CancellationToken) {
        handle.draining.store(true, Ordering::SeqCst);

        let cutoff = chrono::Duration::from_std(stale_after)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age));
        if let Some(cutoff) = cutoff {
            match self.requeue_stale(cutoff).await {
                Ok(0) => {}
                Ok(requeued) => tracing::warn!(requeued, "Requeued interrupted uploads"),
                Err(e) => tracing::error!(error = %e, "Failed to requeue interrupted uploads"),
            }
        }

        let result = self.drain_until(cancel).await;
        handle.draining.store(false, Ordering::SeqCst);

        match result {
            Ok(report) if report.completed + report.failed > 0 => {
                tracing::info!(
                    completed = report.completed,
                    failed = report.failed,
                    "Upload queue drained"
                );
            }
            Ok(_) => tracing::debug!("Upload queue empty"),
            Err(e) => tracing::error!(error = %e, "Upload queue drain aborted"),
        }
    }

    /// Move abandoned UPLOADING rows back into the retry path.
    pub async fn requeue_stale(&self, older_than: Timestamp) -> Result<u64, LedgerError> {
        self.ledger.requeue_stale(older_than).await
    }

    /// Process eligible documents until none are left.
    pub async fn drain(&self) -> Result<DrainReport, LedgerError> {
        self.drain_until(&CancellationToken::new()).await
    }

    /// Like [`drain`](Self::drain), but stops claiming once `cancel` fires.
    ///
    /// Only ledger failures abort the pass; every per-document failure is
    /// recorded on that document and the loop moves on.
    pub async fn drain_until(&self, cancel: &CancellationToken) -> Result<DrainReport, LedgerError> {
        let mut report = DrainReport::default();

        while !cancel.is_cancelled() {
            let Some(doc) = self.ledger.claim_next().await? else {
                break;
            };

            tracing::debug!(
                document_id = doc.id,
                package_id = doc.package_id,
                attempt = doc.retry_count + 1,
                "Uploading document"
            );

            match self.upload(&doc).await {
                Ok(upload) => {
                    if self.ledger.complete(doc.id, &upload).await? {
                        report.completed += 1;
                        tracing::info!(
                            document_id = doc.id,
                            package_id = doc.package_id,
                            object_id = %upload.remote_object_id,
                            "Document uploaded"
                        );
                        if let Some(path) = doc.local_staging_path.as_deref() {
                            remove_staged_file(doc.id, path).await;
                        }
                    } else {
                        tracing::warn!(
                            document_id = doc.id,
                            "Document left UPLOADING before completion was recorded"
                        );
                    }
                }
                Err(err) => {
                    tracing::error!(
                        document_id = doc.id,
                        package_id = doc.package_id,
                        container_id = ?err.container_id(),
                        error = %err,
                        "Document upload failed"
                    );
                    self.ledger.fail(doc.id, &err.to_string()).await?;
                    report.failed += 1;

                    let attempts = doc.retry_count + 1;
                    if attempts >= MAX_UPLOAD_ATTEMPTS {
                        tracing::warn!(
                            document_id = doc.id,
                            package_id = doc.package_id,
                            retry_count = attempts,
                            "Document exhausted its upload attempts"
                        );
                    }
                }
            }
        }

        Ok(report)
    }

    async fn upload(&self, doc: &Document) -> Result<CompletedUpload, UploadError> {
        let container_id = self
            .ledger
            .package_container(doc.package_id)
            .await?
            .ok_or(UploadError::MissingContainer {
                package_id: doc.package_id,
            })?;

        let staged = doc
            .local_staging_path
            .as_deref()
            .map(Path::new)
            .ok_or(UploadError::MissingStagedFile { document_id: doc.id })?;

        let mut name = sanitize_filename(&doc.original_name);
        if name.is_empty() {
            name = format!("documento_{}", doc.id);
        }

        let object = self
            .storage
            .upload_object(staged, &name, &doc.mime_type, &container_id)
            .await
            .map_err(|source| UploadError::Storage {
                container_id: container_id.clone(),
                source,
            })?;

        let external_redirect_link = if is_shortcut_mime(&doc.mime_type) {
            extract_from_file(self.extractor.as_ref(), staged).await
        } else {
            None
        };

        Ok(CompletedUpload {
            view_link: object
                .view_link
                .unwrap_or_else(|| self.storage.view_link_for(&object.id)),
            download_link: object
                .download_link
                .unwrap_or_else(|| self.storage.download_link_for(&object.id)),
            remote_object_id: object.id,
            external_redirect_link,
        })
    }
}

async fn remove_staged_file(document_id: DbId, path: &str) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(document_id, path, error = %e, "Failed to remove staged file"),
    }
}

/// Cheap, cloneable trigger for the upload actor.
#[derive(Clone)]
pub struct UploadQueueHandle {
    signal: Arc<Notify>,
    draining: Arc<AtomicBool>,
}

impl UploadQueueHandle {
    /// Ask the worker to drain. Never blocks; repeated calls while a drain
    /// is running coalesce into a single follow-up pass.
    pub fn notify(&self) {
        self.signal.notify_one();
    }

    /// Whether a drain pass is running right now.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }
}
