//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod discipline_repo;
pub mod document_repo;
pub mod package_repo;
pub mod semester_repo;

pub use discipline_repo::DisciplineRepo;
pub use document_repo::DocumentRepo;
pub use package_repo::PackageRepo;
pub use semester_repo::SemesterRepo;
