//! Semester model.

use serde::{Deserialize, Serialize};
use sgpi_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `semesters` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Semester {
    pub id: DbId,
    /// `YYYY_1` or `YYYY_2`.
    pub label: String,
    /// Remote container holding this semester's disciplines. `None` until
    /// the first package is provisioned (or rotation created it).
    pub remote_root_id: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a semester. New semesters are always the active one.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSemester {
    pub label: String,
    pub remote_root_id: Option<String>,
}
