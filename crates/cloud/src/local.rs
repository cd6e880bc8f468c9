//! Directory-backed storage provider.
//!
//! Layout under the root directory:
//!
//! ```text
//! objects/<id>      object bytes
//! meta/<id>.json    name, parent, kind, trashed flag
//! ```
//!
//! Containers have a metadata file only. Used for local development and as
//! the provider in pipeline tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::storage::{ObjectReader, RemoteContainer, RemoteStorage, UploadedObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Container,
    Object,
}

/// Sidecar metadata of one stored entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMeta {
    pub name: String,
    pub parent: Option<String>,
    pub kind: EntryKind,
    #[serde(default)]
    pub trashed: bool,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// [`RemoteStorage`] backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Open (and create if needed) a provider rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join("objects")).await?;
        tokio::fs::create_dir_all(root.join("meta")).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &str) -> PathBuf {
        self.root.join("objects").join(id)
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.root.join("meta").join(format!("{id}.json"))
    }

    /// Metadata of an entry, trashed or not.
    pub async fn entry(&self, id: &str) -> Result<EntryMeta, StorageError> {
        if !is_valid_id(id) {
            return Err(StorageError::NotFound(id.to_string()));
        }
        match tokio::fs::read(self.meta_path(id)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Live entry of the given kind; trashed entries count as missing.
    async fn live_entry(&self, id: &str, kind: EntryKind) -> Result<EntryMeta, StorageError> {
        let meta = self.entry(id).await?;
        if meta.trashed || meta.kind != kind {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(meta)
    }

    /// Write metadata through a temp file and rename, so readers never see
    /// a half-written sidecar.
    async fn write_meta(&self, id: &str, meta: &EntryMeta) -> Result<(), StorageError> {
        let path = self.meta_path(id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(meta)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Every entry (id and metadata) directly under `parent`, trashed ones
    /// included.
    pub async fn children(
        &self,
        parent: Option<&str>,
    ) -> Result<Vec<(String, EntryMeta)>, StorageError> {
        let mut entries = tokio::fs::read_dir(self.root.join("meta")).await?;
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(id) = file_name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            let meta = self.entry(id).await?;
            if meta.parent.as_deref() == parent {
                children.push((id.to_string(), meta));
            }
        }
        children.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(children)
    }
}

#[async_trait]
impl RemoteStorage for LocalStorage {
    async fn find_container(
        &self,
        name: &str,
        parent: Option<&str>,
    ) -> Result<Option<String>, StorageError> {
        let found = self
            .children(parent)
            .await?
            .into_iter()
            .find(|(_, meta)| meta.kind == EntryKind::Container && !meta.trashed && meta.name == name)
            .map(|(id, _)| id);
        Ok(found)
    }

    async fn create_container(
        &self,
        name: &str,
        parent: Option<&str>,
    ) -> Result<RemoteContainer, StorageError> {
        if let Some(parent) = parent {
            self.live_entry(parent, EntryKind::Container).await?;
        }
        let id = new_id();
        self.write_meta(
            &id,
            &EntryMeta {
                name: name.to_string(),
                parent: parent.map(str::to_string),
                kind: EntryKind::Container,
                trashed: false,
                mime_type: None,
            },
        )
        .await?;
        tracing::info!(container_id = %id, name, "Created local container");
        Ok(RemoteContainer { id, view_link: None })
    }

    /// The local provider has no web front end, so the returned links are
    /// left empty and callers fall back to `view_link_for` /
    /// `download_link_for`.
    async fn upload_object(
        &self,
        path: &Path,
        name: &str,
        mime_type: &str,
        container_id: &str,
    ) -> Result<UploadedObject, StorageError> {
        self.live_entry(container_id, EntryKind::Container).await?;

        let id = new_id();
        tokio::fs::copy(path, self.object_path(&id)).await?;
        self.write_meta(
            &id,
            &EntryMeta {
                name: name.to_string(),
                parent: Some(container_id.to_string()),
                kind: EntryKind::Object,
                trashed: false,
                mime_type: Some(mime_type.to_string()),
            },
        )
        .await?;

        Ok(UploadedObject {
            id,
            view_link: None,
            download_link: None,
        })
    }

    async fn open_read_stream(&self, object_id: &str) -> Result<ObjectReader, StorageError> {
        self.live_entry(object_id, EntryKind::Object).await?;
        let file = tokio::fs::File::open(self.object_path(object_id)).await?;
        Ok(Box::pin(file))
    }

    async fn rename_object(&self, id: &str, new_name: &str) -> Result<(), StorageError> {
        let mut meta = self.entry(id).await?;
        if meta.trashed {
            return Err(StorageError::NotFound(id.to_string()));
        }
        meta.name = new_name.to_string();
        self.write_meta(id, &meta).await
    }

    async fn soft_delete(&self, id: &str) -> Result<(), StorageError> {
        let mut meta = self.entry(id).await?;
        meta.trashed = true;
        self.write_meta(id, &meta).await
    }

    fn view_link_for(&self, object_id: &str) -> String {
        format!("file://{}", self.object_path(object_id).display())
    }

    fn download_link_for(&self, object_id: &str) -> String {
        self.view_link_for(object_id)
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Ids are generated hex strings; anything else (path separators, dots)
/// cannot name an entry.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}
