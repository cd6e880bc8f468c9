//! Request handlers, grouped by resource.

pub mod disciplines;
pub mod documents;
pub mod packages;
pub mod semesters;
pub mod uploads;

use sgpi_cloud::RemoteStorage;
use sgpi_core::error::CoreError;
use sgpi_core::types::DbId;
use sgpi_db::models::package::Package;
use sgpi_db::repositories::PackageRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::caller::Caller;

/// Verify that a package exists, returning the full row.
pub(crate) async fn ensure_package_exists(pool: &sqlx::PgPool, id: DbId) -> AppResult<Package> {
    PackageRepo::find_by_id(pool, id).await?.ok_or_else(|| {
        AppError::Core(CoreError::NotFound {
            entity: "Package",
            id,
        })
    })
}

/// Reject callers that neither own the package nor coordinate.
pub(crate) fn ensure_can_manage(caller: &Caller, package: &Package) -> AppResult<()> {
    if caller.can_manage(&package.owner_id) {
        Ok(())
    } else {
        Err(AppError::Core(CoreError::Forbidden(
            "Only the package owner or a coordinator may do this".into(),
        )))
    }
}

/// Move a remote container or object to the provider's trash. An id the
/// provider no longer knows is already gone and is not an error.
pub(crate) async fn trash_remote(storage: &dyn RemoteStorage, remote_id: &str) -> AppResult<()> {
    if remote_id.is_empty() {
        return Ok(());
    }
    match storage.soft_delete(remote_id).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            tracing::warn!(object_id = remote_id, "Remote entry already gone");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Best-effort removal of a staged upload.
pub(crate) async fn remove_staged_file(path: &str) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path, error = %e, "Failed to remove staged file"),
    }
}
