use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Package deletion refused by the retention rule.
    #[error(
        "Retention period: this package is {age_years:.1} years old and still holds \
         {document_count} document(s); packages must be kept for 5 years. \
         Delete the wrong files individually instead."
    )]
    RetentionPeriod { age_years: f64, document_count: i64 },

    #[error("Internal error: {0}")]
    Internal(String),
}
