//! Legal retention rule for submission packages.
//!
//! A package may only be deleted once it is at least five years old, or at
//! any time while it holds no documents (created by mistake).

use crate::error::CoreError;
use crate::types::Timestamp;

/// Minimum package age, in years, before deletion is allowed.
pub const RETENTION_YEARS: f64 = 5.0;

/// Length of a year used for age computation (accounts for leap years).
const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 60.0 * 60.0;

/// Age of a package in fractional years.
pub fn package_age_years(created_at: Timestamp, now: Timestamp) -> f64 {
    let millis = (now - created_at).num_milliseconds().abs() as f64;
    millis / 1000.0 / SECONDS_PER_YEAR
}

/// Decide whether a package may be deleted.
///
/// Returns [`CoreError::RetentionPeriod`] carrying the computed age when the
/// package is younger than [`RETENTION_YEARS`] and still holds documents.
pub fn check_package_deletion(
    created_at: Timestamp,
    document_count: i64,
    now: Timestamp,
) -> Result<(), CoreError> {
    let age_years = package_age_years(created_at, now);
    if age_years >= RETENTION_YEARS || document_count == 0 {
        return Ok(());
    }
    Err(CoreError::RetentionPeriod {
        age_years,
        document_count,
    })
}
