//! Repository for the `disciplines` table.

use sgpi_core::types::DbId;
use sqlx::PgPool;

use crate::models::discipline::{CreateDiscipline, Discipline};

const COLUMNS: &str = "id, name, course_level, created_at";

/// Read access to discipline reference data.
pub struct DisciplineRepo;

impl DisciplineRepo {
    /// Insert a discipline, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateDiscipline,
    ) -> Result<Discipline, sqlx::Error> {
        let query = format!(
            "INSERT INTO disciplines (name, course_level) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Discipline>(&query)
            .bind(&input.name)
            .bind(&input.course_level)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Discipline>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM disciplines WHERE id = $1");
        sqlx::query_as::<_, Discipline>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All disciplines ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<Discipline>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM disciplines ORDER BY name");
        sqlx::query_as::<_, Discipline>(&query).fetch_all(pool).await
    }
}
