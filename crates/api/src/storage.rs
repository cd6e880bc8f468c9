//! Construction of the configured remote storage adapter.

use std::sync::Arc;

use sgpi_cloud::drive::GoogleDriveStorage;
use sgpi_cloud::local::LocalStorage;
use sgpi_cloud::{RemoteStorage, StorageError};

use crate::config::{StorageBackend, StorageConfig};

/// Build the adapter selected by `STORAGE_BACKEND`.
pub async fn build_storage(config: &StorageConfig) -> Result<Arc<dyn RemoteStorage>, StorageError> {
    match &config.backend {
        StorageBackend::Local { root } => {
            let storage = LocalStorage::open(root.clone()).await?;
            tracing::info!(root = %root.display(), "Using local directory storage");
            Ok(Arc::new(storage))
        }
        StorageBackend::Drive(credentials) => {
            tracing::info!(
                academic_root = config.academic_root.as_deref().unwrap_or("<drive root>"),
                "Using Google Drive storage"
            );
            Ok(Arc::new(GoogleDriveStorage::new(credentials.clone())))
        }
    }
}
