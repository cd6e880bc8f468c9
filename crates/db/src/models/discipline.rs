//! Discipline reference data.

use serde::{Deserialize, Serialize};
use sgpi_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `disciplines` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Discipline {
    pub id: DbId,
    pub name: String,
    pub course_level: String,
    pub created_at: Timestamp,
}

/// DTO for seeding a discipline.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDiscipline {
    pub name: String,
    pub course_level: String,
}
