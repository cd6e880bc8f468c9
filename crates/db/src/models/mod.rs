//! Row models and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row and the `Deserialize` DTOs used for inserts.

pub mod discipline;
pub mod document;
pub mod package;
pub mod semester;
pub mod status;
