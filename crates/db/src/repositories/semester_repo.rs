//! Repository for the `semesters` table.

use sgpi_core::types::DbId;
use sqlx::PgPool;

use crate::models::semester::{CreateSemester, Semester};

const COLUMNS: &str = "id, label, remote_root_id, is_active, created_at, updated_at";

/// Semester persistence. Enforces the single-active-semester rule.
pub struct SemesterRepo;

impl SemesterRepo {
    /// Insert a semester as the only active one.
    ///
    /// Every other semester is deactivated in the same transaction, so no
    /// reader ever observes zero or two active rows mid-operation. The
    /// partial unique index on `is_active` backs this up.
    pub async fn create_active(
        pool: &PgPool,
        input: &CreateSemester,
    ) -> Result<Semester, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("UPDATE semesters SET is_active = FALSE, updated_at = NOW() WHERE is_active")
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "INSERT INTO semesters (label, remote_root_id, is_active)
             VALUES ($1, $2, TRUE)
             RETURNING {COLUMNS}"
        );
        let semester = sqlx::query_as::<_, Semester>(&query)
            .bind(&input.label)
            .bind(&input.remote_root_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(semester)
    }

    /// The currently active semester, if any.
    pub async fn find_active(pool: &PgPool) -> Result<Option<Semester>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM semesters WHERE is_active");
        sqlx::query_as::<_, Semester>(&query)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Semester>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM semesters WHERE id = $1");
        sqlx::query_as::<_, Semester>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_label(
        pool: &PgPool,
        label: &str,
    ) -> Result<Option<Semester>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM semesters WHERE label = $1");
        sqlx::query_as::<_, Semester>(&query)
            .bind(label)
            .fetch_optional(pool)
            .await
    }

    /// Record the remote root container of a semester. Returns `true` if a
    /// row was updated.
    pub async fn set_remote_root(
        pool: &PgPool,
        id: DbId,
        remote_root_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE semesters SET remote_root_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(remote_root_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
