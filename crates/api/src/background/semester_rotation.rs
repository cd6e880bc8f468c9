//! Daily check that opens the next semester on its transition day.

use std::time::Duration;

use chrono::Utc;
use sgpi_cloud::hierarchy::HierarchyResolver;
use sgpi_db::DbPool;
use sgpi_pipeline::rotation::{rotate_if_due, RotationOutcome};
use tokio_util::sync::CancellationToken;

/// Run the rotation check until `cancel` is triggered. Failures are logged
/// and retried on the next tick.
pub async fn run(
    pool: DbPool,
    resolver: HierarchyResolver,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Semester rotation job started"
    );

    let mut interval = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Semester rotation job stopping");
                break;
            }
            _ = interval.tick() => {
                let today = Utc::now().date_naive();
                match rotate_if_due(&pool, &resolver, today).await {
                    Ok(RotationOutcome::Created(semester)) => {
                        tracing::info!(label = %semester.label, "Semester rotation: new semester active");
                    }
                    Ok(RotationOutcome::AlreadyExists { label }) => {
                        tracing::debug!(%label, "Semester rotation: already opened");
                    }
                    Ok(RotationOutcome::NotDue) => {}
                    Err(e) => tracing::error!(error = %e, "Semester rotation failed"),
                }
            }
        }
    }
}
