//! Shared helpers for pipeline tests: an in-memory ledger and a storage
//! wrapper that injects failures.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use chrono::Utc;
use sgpi_cloud::local::LocalStorage;
use sgpi_cloud::{ObjectReader, RemoteContainer, RemoteStorage, StorageError, UploadedObject};
use sgpi_core::document::{DocumentPayload, SENTINEL_LINK, SENTINEL_PENDING};
use sgpi_core::types::{DbId, Timestamp};
use sgpi_db::models::document::{CompletedUpload, Document, StatusCount};
use sgpi_db::models::package::Package;
use sgpi_db::models::status::DocumentStatusId;
use sgpi_pipeline::ledger::{DocumentLedger, LedgerError};
use tokio::io::{AsyncRead, ReadBuf};

// ---------------------------------------------------------------------------
// In-memory ledger
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LedgerState {
    next_id: DbId,
    packages: HashMap<DbId, Package>,
    documents: Vec<Document>,
}

/// [`DocumentLedger`] over plain vectors, with the same transition guards
/// as the SQL implementation.
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_package(&self, title: &str, container_id: &str) -> Package {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let package = Package {
            id: state.next_id,
            title: title.to_string(),
            owner_id: "prof-1".into(),
            semester_id: 1,
            discipline_id: 1,
            remote_folder_id: container_id.to_string(),
            remote_folder_link: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.packages.insert(package.id, package.clone());
        package
    }

    fn insert(&self, build: impl FnOnce(DbId) -> Document) -> Document {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let doc = build(state.next_id);
        state.documents.push(doc.clone());
        doc
    }

    pub fn add_pending(&self, package_id: DbId, name: &str, mime: &str, path: &Path) -> Document {
        self.insert(|id| Document {
            local_staging_path: Some(path.to_string_lossy().into_owned()),
            ..blank(id, package_id, name, mime, DocumentStatusId::Pending)
        })
    }

    pub fn add_remote(&self, package_id: DbId, name: &str, object_id: &str) -> Document {
        self.insert(|id| Document {
            remote_object_id: object_id.to_string(),
            ..blank(id, package_id, name, "application/pdf", DocumentStatusId::Completed)
        })
    }

    pub fn add_link(&self, package_id: DbId, name: &str, url: &str) -> Document {
        self.insert(|id| Document {
            remote_object_id: SENTINEL_LINK.to_string(),
            external_redirect_link: Some(url.to_string()),
            remote_view_link: Some(url.to_string()),
            size_bytes: 0,
            ..blank(
                id,
                package_id,
                name,
                "application/internet-shortcut",
                DocumentStatusId::Completed,
            )
        })
    }

    /// Force a document into UPLOADING as if a previous process died
    /// mid-upload at `updated_at`.
    pub fn mark_uploading(&self, id: DbId, updated_at: Timestamp) {
        self.update(id, |doc| {
            doc.status_id = DocumentStatusId::Uploading.id();
            doc.updated_at = updated_at;
        });
    }

    pub fn get(&self, id: DbId) -> Document {
        let state = self.state.lock().unwrap();
        state
            .documents
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .expect("document exists")
    }

    fn update(&self, id: DbId, f: impl FnOnce(&mut Document)) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.documents.iter_mut().find(|d| d.id == id) {
            Some(doc) => {
                f(doc);
                true
            }
            None => false,
        }
    }

    fn update_if_uploading(&self, id: DbId, f: impl FnOnce(&mut Document)) -> bool {
        let mut state = self.state.lock().unwrap();
        match state
            .documents
            .iter_mut()
            .find(|d| d.id == id && d.status_id == DocumentStatusId::Uploading.id())
        {
            Some(doc) => {
                f(doc);
                doc.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

fn blank(id: DbId, package_id: DbId, name: &str, mime: &str, status: DocumentStatusId) -> Document {
    Document {
        id,
        package_id,
        original_name: name.to_string(),
        mime_type: mime.to_string(),
        size_bytes: 16,
        status_id: status.id(),
        retry_count: 0,
        error_log: None,
        local_staging_path: None,
        remote_object_id: SENTINEL_PENDING.to_string(),
        remote_view_link: None,
        remote_download_link: None,
        external_redirect_link: None,
        uploaded_by: "prof-1".into(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn append_log(doc: &mut Document, message: &str) {
    doc.error_log = Some(match doc.error_log.take() {
        Some(log) if !log.is_empty() => format!("{log}\n{message}"),
        _ => message.to_string(),
    });
}

#[async_trait]
impl DocumentLedger for InMemoryLedger {
    async fn next_eligible(&self) -> Result<Option<Document>, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .documents
            .iter()
            .find(|d| d.status().is_eligible(d.retry_count))
            .cloned())
    }

    async fn claim_next(&self) -> Result<Option<Document>, LedgerError> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .documents
            .iter_mut()
            .find(|d| d.status().is_eligible(d.retry_count))
            .map(|doc| {
                doc.status_id = DocumentStatusId::Uploading.id();
                doc.updated_at = Utc::now();
                doc.clone()
            }))
    }

    async fn package_container(&self, package_id: DbId) -> Result<Option<String>, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .packages
            .get(&package_id)
            .map(|p| p.remote_folder_id.clone())
            .filter(|id| !id.is_empty()))
    }

    async fn complete(&self, id: DbId, upload: &CompletedUpload) -> Result<bool, LedgerError> {
        Ok(self.update_if_uploading(id, |doc| {
            doc.status_id = DocumentStatusId::Completed.id();
            doc.remote_object_id = upload.remote_object_id.clone();
            doc.remote_view_link = Some(upload.view_link.clone());
            doc.remote_download_link = Some(upload.download_link.clone());
            doc.external_redirect_link = upload.external_redirect_link.clone();
            doc.local_staging_path = None;
        }))
    }

    async fn fail(&self, id: DbId, message: &str) -> Result<bool, LedgerError> {
        Ok(self.update_if_uploading(id, |doc| {
            doc.status_id = DocumentStatusId::Error.id();
            doc.retry_count += 1;
            append_log(doc, message);
        }))
    }

    async fn requeue_stale(&self, older_than: Timestamp) -> Result<u64, LedgerError> {
        let mut state = self.state.lock().unwrap();
        let mut requeued = 0;
        for doc in state.documents.iter_mut().filter(|d| {
            d.status_id == DocumentStatusId::Uploading.id() && d.updated_at < older_than
        }) {
            doc.status_id = DocumentStatusId::Error.id();
            doc.retry_count += 1;
            append_log(doc, "upload interrupted before completion");
            requeued += 1;
        }
        Ok(requeued)
    }

    async fn find_package(&self, id: DbId) -> Result<Option<Package>, LedgerError> {
        Ok(self.state.lock().unwrap().packages.get(&id).cloned())
    }

    async fn completed_documents(&self, package_id: DbId) -> Result<Vec<Document>, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .documents
            .iter()
            .filter(|d| {
                d.package_id == package_id && d.status_id == DocumentStatusId::Completed.id()
            })
            .cloned()
            .collect())
    }

    async fn status_counts(&self) -> Result<Vec<StatusCount>, LedgerError> {
        let state = self.state.lock().unwrap();
        let mut counts: HashMap<i16, i64> = HashMap::new();
        for doc in &state.documents {
            *counts.entry(doc.status_id).or_default() += 1;
        }
        let mut counts: Vec<StatusCount> = counts
            .into_iter()
            .map(|(status_id, count)| StatusCount { status_id, count })
            .collect();
        counts.sort_by_key(|c| c.status_id);
        Ok(counts)
    }
}

// ---------------------------------------------------------------------------
// Failure-injecting storage
// ---------------------------------------------------------------------------

/// How a read of a given object should misbehave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFault {
    /// `open_read_stream` itself fails.
    Open,
    /// The stream opens but the first read fails.
    FirstRead,
    /// A few bytes arrive, then the stream breaks.
    MidStream,
}

/// [`LocalStorage`] plus scripted failures.
pub struct FlakyStorage {
    inner: LocalStorage,
    failing_uploads: Mutex<HashSet<String>>,
    transient_upload_failures: AtomicUsize,
    read_faults: Mutex<HashMap<String, ReadFault>>,
}

impl FlakyStorage {
    pub fn new(inner: LocalStorage) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failing_uploads: Mutex::new(HashSet::new()),
            transient_upload_failures: AtomicUsize::new(0),
            read_faults: Mutex::new(HashMap::new()),
        })
    }

    pub fn inner(&self) -> &LocalStorage {
        &self.inner
    }

    /// Every upload of an object with this (sanitized) name fails.
    pub fn fail_uploads_named(&self, name: &str) {
        self.failing_uploads.lock().unwrap().insert(name.to_string());
    }

    /// The next `n` uploads fail regardless of name.
    pub fn fail_next_uploads(&self, n: usize) {
        self.transient_upload_failures.store(n, Ordering::SeqCst);
    }

    pub fn heal_uploads(&self) {
        self.failing_uploads.lock().unwrap().clear();
    }

    pub fn fault_reads(&self, object_id: &str, fault: ReadFault) {
        self.read_faults
            .lock()
            .unwrap()
            .insert(object_id.to_string(), fault);
    }

    /// Store `bytes` as an object in `container_id` and return its id.
    pub async fn put(&self, dir: &Path, container_id: &str, name: &str, bytes: &[u8]) -> String {
        let path: PathBuf = dir.join(format!("seed-{name}"));
        tokio::fs::write(&path, bytes).await.unwrap();
        self.inner
            .upload_object(&path, name, "application/octet-stream", container_id)
            .await
            .unwrap()
            .id
    }
}

#[async_trait]
impl RemoteStorage for FlakyStorage {
    async fn find_container(
        &self,
        name: &str,
        parent: Option<&str>,
    ) -> Result<Option<String>, StorageError> {
        self.inner.find_container(name, parent).await
    }

    async fn create_container(
        &self,
        name: &str,
        parent: Option<&str>,
    ) -> Result<RemoteContainer, StorageError> {
        self.inner.create_container(name, parent).await
    }

    async fn upload_object(
        &self,
        path: &Path,
        name: &str,
        mime_type: &str,
        container_id: &str,
    ) -> Result<UploadedObject, StorageError> {
        let transient = self
            .transient_upload_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if transient || self.failing_uploads.lock().unwrap().contains(name) {
            return Err(StorageError::Api {
                status: 503,
                body: "backend unavailable".into(),
            });
        }
        self.inner
            .upload_object(path, name, mime_type, container_id)
            .await
    }

    async fn open_read_stream(&self, object_id: &str) -> Result<ObjectReader, StorageError> {
        let fault = self.read_faults.lock().unwrap().get(object_id).copied();
        match fault {
            Some(ReadFault::Open) => Err(StorageError::Api {
                status: 500,
                body: "download failed".into(),
            }),
            Some(ReadFault::FirstRead) => Ok(Box::pin(BrokenReader { prefix: None })),
            Some(ReadFault::MidStream) => Ok(Box::pin(BrokenReader {
                prefix: Some(b"partial-".to_vec()),
            })),
            None => self.inner.open_read_stream(object_id).await,
        }
    }

    async fn rename_object(&self, id: &str, new_name: &str) -> Result<(), StorageError> {
        self.inner.rename_object(id, new_name).await
    }

    async fn soft_delete(&self, id: &str) -> Result<(), StorageError> {
        self.inner.soft_delete(id).await
    }

    fn view_link_for(&self, object_id: &str) -> String {
        self.inner.view_link_for(object_id)
    }

    fn download_link_for(&self, object_id: &str) -> String {
        self.inner.download_link_for(object_id)
    }
}

/// Yields `prefix` once (if any), then fails every read.
struct BrokenReader {
    prefix: Option<Vec<u8>>,
}

impl AsyncRead for BrokenReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.prefix.take() {
            Some(bytes) => {
                let n = bytes.len().min(buf.remaining());
                buf.put_slice(&bytes[..n]);
                Poll::Ready(Ok(()))
            }
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub ledger: Arc<InMemoryLedger>,
    pub storage: Arc<FlakyStorage>,
    pub container_id: String,
    pub package: Package,
}

impl Fixture {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let inner = LocalStorage::open(dir.path().join("remote")).await.unwrap();
        let storage = FlakyStorage::new(inner);
        let container_id = storage.create_container("Provas P1", None).await.unwrap().id;
        let ledger = InMemoryLedger::new();
        let package = ledger.add_package("Provas P1", &container_id);
        Self {
            dir,
            ledger,
            storage,
            container_id,
            package,
        }
    }

    /// Write a staged file and insert a PENDING document for it.
    pub async fn stage(&self, name: &str, mime: &str, bytes: &[u8]) -> Document {
        let staging = self.dir.path().join("uploads");
        tokio::fs::create_dir_all(&staging).await.unwrap();
        let path = staging.join(sgpi_core::naming::staged_file_name(name, 1_700_000_000_000));
        tokio::fs::write(&path, bytes).await.unwrap();
        self.ledger.add_pending(self.package.id, name, mime, &path)
    }

    pub fn payload(&self, id: DbId) -> DocumentPayload {
        self.ledger.get(id).payload()
    }
}
