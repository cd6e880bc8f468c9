//! Semester / discipline / package container provisioning.
//!
//! ```text
//! <academic root>
//!   └── 2025_1              (semester root, reused)
//!        └── Cálculo I      (discipline, reused)
//!             └── Provas P1 (package, always fresh)
//! ```

use std::sync::Arc;

use crate::error::StorageError;
use crate::storage::{RemoteContainer, RemoteStorage};

/// Input for provisioning one package container.
#[derive(Debug, Clone)]
pub struct HierarchyRequest<'a> {
    pub semester_label: &'a str,
    /// Previously resolved semester root, if the semester row has one.
    pub semester_root_id: Option<&'a str>,
    pub discipline_name: &'a str,
    pub package_title: &'a str,
}

/// Containers resolved or created by [`HierarchyResolver::provision`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedHierarchy {
    pub semester_root_id: String,
    pub discipline_container_id: String,
    pub package: RemoteContainer,
}

/// Finds or creates the nested containers a package lives in.
///
/// Provider errors propagate to the caller unchanged; nothing is retried
/// here.
#[derive(Clone)]
pub struct HierarchyResolver {
    storage: Arc<dyn RemoteStorage>,
    academic_root: Option<String>,
}

impl HierarchyResolver {
    /// `academic_root` is the container semester roots are created under;
    /// `None` means the provider root.
    pub fn new(storage: Arc<dyn RemoteStorage>, academic_root: Option<String>) -> Self {
        Self {
            storage,
            academic_root,
        }
    }

    /// Idempotent find-or-create of `name` directly under `parent`.
    pub async fn resolve_container(
        &self,
        name: &str,
        parent: Option<&str>,
    ) -> Result<String, StorageError> {
        self.storage.create_or_find_container(name, parent).await
    }

    /// Find or create the root container of a semester.
    pub async fn resolve_semester_root(&self, label: &str) -> Result<String, StorageError> {
        self.resolve_container(label, self.academic_root.as_deref())
            .await
    }

    /// Resolve the semester and discipline containers and create a new
    /// package container inside them.
    pub async fn provision(
        &self,
        request: &HierarchyRequest<'_>,
    ) -> Result<ProvisionedHierarchy, StorageError> {
        let semester_root_id = match request.semester_root_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.resolve_semester_root(request.semester_label).await?,
        };

        let discipline_container_id = self
            .resolve_container(request.discipline_name, Some(&semester_root_id))
            .await?;

        let package = self
            .storage
            .create_container(request.package_title, Some(&discipline_container_id))
            .await?;

        tracing::info!(
            semester_root_id = %semester_root_id,
            discipline_container_id = %discipline_container_id,
            container_id = %package.id,
            "Provisioned package container"
        );

        Ok(ProvisionedHierarchy {
            semester_root_id,
            discipline_container_id,
            package,
        })
    }
}
