//! Remote storage for package containers and document objects.
//!
//! [`RemoteStorage`] abstracts the folder/object provider. Two adapters are
//! provided: [`drive::GoogleDriveStorage`] for production and
//! [`local::LocalStorage`] for development and tests. The
//! [`hierarchy::HierarchyResolver`] builds the semester / discipline /
//! package container tree on top of either.

pub mod drive;
pub mod error;
pub mod hierarchy;
pub mod local;
pub mod storage;

pub use error::StorageError;
pub use storage::{ObjectReader, RemoteContainer, RemoteStorage, UploadedObject};
