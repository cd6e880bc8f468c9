//! Repository for the `packages` table.

use sgpi_core::types::DbId;
use sqlx::PgPool;

use crate::models::package::{CreatePackage, Package};

const COLUMNS: &str = "id, title, owner_id, semester_id, discipline_id, \
                       remote_folder_id, remote_folder_link, created_at, updated_at";

/// Provides CRUD operations for submission packages.
pub struct PackageRepo;

impl PackageRepo {
    /// Insert a package, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreatePackage) -> Result<Package, sqlx::Error> {
        let query = format!(
            "INSERT INTO packages
                (title, owner_id, semester_id, discipline_id, remote_folder_id, remote_folder_link)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Package>(&query)
            .bind(&input.title)
            .bind(&input.owner_id)
            .bind(input.semester_id)
            .bind(input.discipline_id)
            .bind(&input.remote_folder_id)
            .bind(&input.remote_folder_link)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Package>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM packages WHERE id = $1");
        sqlx::query_as::<_, Package>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Remote container id of a package. `None` when the package is gone or
    /// its container id is blank.
    pub async fn container_id(pool: &PgPool, id: DbId) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT remote_folder_id FROM packages WHERE id = $1 AND remote_folder_id <> ''",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|(container,)| container))
    }

    /// Rename a package. Returns `None` if no row with the given `id` exists.
    pub async fn update_title(
        pool: &PgPool,
        id: DbId,
        title: &str,
    ) -> Result<Option<Package>, sqlx::Error> {
        let query = format!(
            "UPDATE packages SET title = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Package>(&query)
            .bind(id)
            .bind(title)
            .fetch_optional(pool)
            .await
    }

    /// Permanently delete a package; its documents cascade. Returns `true`
    /// if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM packages WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
