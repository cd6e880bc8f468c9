//! Domain building blocks for the SGPI document-submission manager.
//!
//! Everything in this crate is pure logic: no database, no network, no
//! filesystem. The `db`, `cloud`, `pipeline` and `api` crates build on it.

pub mod document;
pub mod error;
pub mod links;
pub mod naming;
pub mod retention;
pub mod roles;
pub mod semester;
pub mod types;
