//! The storage provider interface.

use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::StorageError;

/// Byte stream of a remote object. Dropping it releases the remote handle.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// A container created on the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteContainer {
    pub id: String,
    pub view_link: Option<String>,
}

/// An object stored on the provider. Links are optional; providers that
/// omit them are covered by [`RemoteStorage::view_link_for`] and
/// [`RemoteStorage::download_link_for`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedObject {
    pub id: String,
    pub view_link: Option<String>,
    pub download_link: Option<String>,
}

/// Folder/object operations on a remote provider.
///
/// `parent = None` addresses the provider's root.
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Id of a live (non-trashed) container named `name` directly under
    /// `parent`, if one exists.
    async fn find_container(
        &self,
        name: &str,
        parent: Option<&str>,
    ) -> Result<Option<String>, StorageError>;

    /// Create a container unconditionally.
    async fn create_container(
        &self,
        name: &str,
        parent: Option<&str>,
    ) -> Result<RemoteContainer, StorageError>;

    /// Return the existing container named `name` under `parent`, creating
    /// it only when none exists.
    async fn create_or_find_container(
        &self,
        name: &str,
        parent: Option<&str>,
    ) -> Result<String, StorageError> {
        if let Some(id) = self.find_container(name, parent).await? {
            return Ok(id);
        }
        Ok(self.create_container(name, parent).await?.id)
    }

    /// Stream the file at `path` into `container_id` as `name`.
    async fn upload_object(
        &self,
        path: &Path,
        name: &str,
        mime_type: &str,
        container_id: &str,
    ) -> Result<UploadedObject, StorageError>;

    /// Open a read stream over an object's bytes.
    async fn open_read_stream(&self, object_id: &str) -> Result<ObjectReader, StorageError>;

    async fn rename_object(&self, id: &str, new_name: &str) -> Result<(), StorageError>;

    /// Move an object or container to the provider's trash.
    async fn soft_delete(&self, id: &str) -> Result<(), StorageError>;

    /// Deterministic view link for an object id.
    fn view_link_for(&self, object_id: &str) -> String;

    /// Deterministic download link for an object id.
    fn download_link_for(&self, object_id: &str) -> String;
}
