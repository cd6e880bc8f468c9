//! Asynchronous document ingestion.
//!
//! - [`ledger`]: persisted document state, behind the [`ledger::DocumentLedger`] trait
//! - [`queue`]: the single-flight upload worker
//! - [`extract`]: redirect-target extraction for shortcut uploads
//! - [`archive`]: streaming zip download of a package
//! - [`cleanup`]: staging-area sweep
//! - [`rotation`]: semester rollover on transition days

pub mod archive;
pub mod cleanup;
pub mod extract;
pub mod ledger;
pub mod queue;
pub mod rotation;
