//! Academic calendar: which semester a date belongs to and when a new one
//! opens.
//!
//! Semesters turn over on 15 January (`<year>_1`) and 15 July
//! (`<year>_2`). Dates before 15 January still belong to the second
//! semester of the previous year.

use chrono::{Datelike, NaiveDate};

/// (month, day) on which the first semester of a year opens.
const FIRST_TRANSITION: (u32, u32) = (1, 15);

/// (month, day) on which the second semester of a year opens.
const SECOND_TRANSITION: (u32, u32) = (7, 15);

/// Semester label in the `<year>_<n>` convention.
pub fn semester_label(year: i32, half: u8) -> String {
    format!("{year}_{half}")
}

/// The label of the semester that opens on `date`, if `date` is a
/// transition day.
pub fn transition_label(date: NaiveDate) -> Option<String> {
    match (date.month(), date.day()) {
        FIRST_TRANSITION => Some(semester_label(date.year(), 1)),
        SECOND_TRANSITION => Some(semester_label(date.year(), 2)),
        _ => None,
    }
}

/// The label of the semester `date` falls in.
pub fn label_for_date(date: NaiveDate) -> String {
    let md = (date.month(), date.day());
    if md < FIRST_TRANSITION {
        semester_label(date.year() - 1, 2)
    } else if md < SECOND_TRANSITION {
        semester_label(date.year(), 1)
    } else {
        semester_label(date.year(), 2)
    }
}
