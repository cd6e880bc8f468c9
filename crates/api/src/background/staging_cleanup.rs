//! Periodic sweep of the upload staging directory.
//!
//! Deletes staged files older than the configured age that no document
//! references any more (leftovers of failed requests or deleted rows).

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use sgpi_db::repositories::DocumentRepo;
use sgpi_db::DbPool;
use sgpi_pipeline::cleanup::{referenced_file_names, sweep_staging_dir, SweepReport};
use tokio_util::sync::CancellationToken;

/// One sweep: load referenced paths, then delete stale unreferenced files.
pub async fn sweep_once(
    pool: &DbPool,
    staging_dir: &std::path::Path,
    max_age: Duration,
) -> Result<SweepReport, Box<dyn std::error::Error + Send + Sync>> {
    let referenced = referenced_file_names(DocumentRepo::staged_paths(pool).await?);
    let report = sweep_staging_dir(staging_dir, max_age, &referenced, SystemTime::now()).await?;
    Ok(report)
}

/// Run the staging sweep loop until `cancel` is triggered.
pub async fn run(
    pool: DbPool,
    staging_dir: PathBuf,
    max_age: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        dir = %staging_dir.display(),
        max_age_secs = max_age.as_secs(),
        interval_secs = interval.as_secs(),
        "Staging cleanup job started"
    );

    let mut interval = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Staging cleanup job stopping");
                break;
            }
            _ = interval.tick() => {
                match sweep_once(&pool, &staging_dir, max_age).await {
                    Ok(report) if report.removed > 0 => {
                        tracing::info!(
                            removed = report.removed,
                            kept_referenced = report.kept_referenced,
                            "Staging cleanup: removed stale files"
                        );
                    }
                    Ok(_) => tracing::debug!("Staging cleanup: nothing to remove"),
                    Err(e) => tracing::error!(error = %e, "Staging cleanup failed"),
                }
            }
        }
    }
}
