//! Staging-area sweep.
//!
//! Removes staged upload files that are older than the configured age and
//! no longer referenced by any document. Files of PENDING, UPLOADING and
//! ERROR documents are always kept so retries still find them.

use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub kept_referenced: usize,
}

/// File names of the staged paths still referenced by documents.
///
/// Staged names embed a timestamp and a UUID, so the file name alone
/// identifies a staged file regardless of how the directory was spelled.
pub fn referenced_file_names<I, S>(paths: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    paths
        .into_iter()
        .filter_map(|p| {
            Path::new(p.as_ref())
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
        })
        .collect()
}

/// Delete regular files in `dir` last modified more than `max_age` before
/// `now`, skipping names in `referenced`. A missing directory is an empty
/// sweep.
pub async fn sweep_staging_dir(
    dir: &Path,
    max_age: Duration,
    referenced: &HashSet<String>,
    now: SystemTime,
) -> io::Result<SweepReport> {
    let mut report = SweepReport::default();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let metadata = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };

        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age <= max_age {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if referenced.contains(&name) {
            report.kept_referenced += 1;
            continue;
        }

        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => {
                report.removed += 1;
                tracing::debug!(file = %name, age_secs = age.as_secs(), "Removed stale staged file");
            }
            Err(e) => tracing::warn!(file = %name, error = %e, "Failed to remove staged file"),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn referenced_names_strip_directories() {
        let names = referenced_file_names(["./uploads/1-a-x.pdf", "/srv/uploads/2-b-y.pdf"]);
        assert!(names.contains("1-a-x.pdf"));
        assert!(names.contains("2-b-y.pdf"));
        assert_eq!(names.len(), 2);
    }

    #[tokio::test]
    async fn removes_only_old_unreferenced_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["old.pdf", "kept.pdf"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }
        tokio::fs::create_dir(dir.path().join("subdir")).await.unwrap();

        let referenced = referenced_file_names(["uploads/kept.pdf"]);
        let later = SystemTime::now() + 2 * HOUR;
        let report = sweep_staging_dir(dir.path(), HOUR, &referenced, later)
            .await
            .unwrap();

        assert_eq!(report, SweepReport { removed: 1, kept_referenced: 1 });
        assert!(!dir.path().join("old.pdf").exists());
        assert!(dir.path().join("kept.pdf").exists());
        assert!(dir.path().join("subdir").exists());
    }

    #[tokio::test]
    async fn fresh_files_survive() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("new.pdf"), b"x").await.unwrap();

        let report = sweep_staging_dir(dir.path(), HOUR, &HashSet::new(), SystemTime::now())
            .await
            .unwrap();

        assert_eq!(report.removed, 0);
        assert!(dir.path().join("new.pdf").exists());
    }

    #[tokio::test]
    async fn missing_directory_is_empty_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let report = sweep_staging_dir(
            &dir.path().join("nope"),
            HOUR,
            &HashSet::new(),
            SystemTime::now(),
        )
        .await
        .unwrap();
        assert_eq!(report, SweepReport::default());
    }
}
