//! Submission package model and DTOs.

use serde::{Deserialize, Serialize};
use sgpi_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `packages` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Package {
    pub id: DbId,
    pub title: String,
    pub owner_id: String,
    pub semester_id: DbId,
    pub discipline_id: DbId,
    /// Remote container the package's documents are uploaded into.
    pub remote_folder_id: String,
    pub remote_folder_link: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a package after its remote container exists.
#[derive(Debug, Clone)]
pub struct CreatePackage {
    pub title: String,
    pub owner_id: String,
    pub semester_id: DbId,
    pub discipline_id: DbId,
    pub remote_folder_id: String,
    pub remote_folder_link: Option<String>,
}

/// Request body for renaming a package.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePackage {
    pub title: String,
}
