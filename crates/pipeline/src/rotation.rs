//! Semester rollover.
//!
//! On 15 January and 15 July a new semester opens. The rotation check
//! creates it (with its remote root container) as the single active
//! semester, unless a semester with that label already exists.

use chrono::NaiveDate;
use sgpi_cloud::hierarchy::HierarchyResolver;
use sgpi_cloud::StorageError;
use sgpi_core::semester::transition_label;
use sgpi_db::models::semester::{CreateSemester, Semester};
use sgpi_db::repositories::SemesterRepo;
use sgpi_db::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug)]
pub enum RotationOutcome {
    /// `today` is not a transition day.
    NotDue,
    /// The semester opening today was already created.
    AlreadyExists { label: String },
    Created(Semester),
}

/// Open the semester that starts on `today`, if any.
pub async fn rotate_if_due(
    pool: &DbPool,
    resolver: &HierarchyResolver,
    today: NaiveDate,
) -> Result<RotationOutcome, RotationError> {
    let Some(label) = transition_label(today) else {
        return Ok(RotationOutcome::NotDue);
    };

    if SemesterRepo::find_by_label(pool, &label).await?.is_some() {
        return Ok(RotationOutcome::AlreadyExists { label });
    }

    let root_id = resolver.resolve_semester_root(&label).await?;
    let semester = SemesterRepo::create_active(
        pool,
        &CreateSemester {
            label,
            remote_root_id: Some(root_id),
        },
    )
    .await?;

    tracing::info!(
        semester_id = semester.id,
        label = %semester.label,
        "Opened new active semester"
    );
    Ok(RotationOutcome::Created(semester))
}
