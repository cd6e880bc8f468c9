use std::sync::Arc;

use sgpi_cloud::hierarchy::HierarchyResolver;
use sgpi_cloud::RemoteStorage;
use sgpi_pipeline::archive::ArchiveAssembler;
use sgpi_pipeline::ledger::DocumentLedger;
use sgpi_pipeline::queue::UploadQueueHandle;

use crate::config::{PipelineConfig, ServerConfig};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc` or is a handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: sgpi_db::DbPool,
    pub config: Arc<ServerConfig>,
    pub pipeline: Arc<PipelineConfig>,
    /// Remote provider holding package containers and document objects.
    pub storage: Arc<dyn RemoteStorage>,
    /// Semester / discipline / package container provisioning.
    pub resolver: HierarchyResolver,
    /// Wakes the upload worker after new documents are staged.
    pub uploads: UploadQueueHandle,
    /// Streaming package downloads.
    pub archives: ArchiveAssembler,
}

impl AppState {
    pub fn new(
        pool: sgpi_db::DbPool,
        config: ServerConfig,
        pipeline: PipelineConfig,
        storage: Arc<dyn RemoteStorage>,
        academic_root: Option<String>,
        ledger: Arc<dyn DocumentLedger>,
        uploads: UploadQueueHandle,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            resolver: HierarchyResolver::new(Arc::clone(&storage), academic_root),
            archives: ArchiveAssembler::new(ledger, Arc::clone(&storage)),
            storage,
            uploads,
        }
    }
}
