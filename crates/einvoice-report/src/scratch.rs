//! Request-scoped scratch files for file-backed report formats
//!
//! Every render gets its own exclusively created file, so concurrent
//! renders of the same format never share a path. The file lives exactly as
//! long as its [`ScratchFile`] guard.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::TempPath;

const PREFIX: &str = "report-";

/// Directory that rendered reports are materialized in
///
/// The directory itself is owned by the environment; this type never
/// creates or removes it.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create an empty `report-*.<extension>` file under a fresh name
    pub fn allocate(&self, extension: &str) -> io::Result<ScratchFile> {
        let path = tempfile::Builder::new()
            .prefix(PREFIX)
            .suffix(&format!(".{}", extension))
            .tempfile_in(&self.root)?
            .into_temp_path();
        Ok(ScratchFile { path })
    }

    /// Delete scratch files older than `max_age` left behind by crashed or
    /// abandoned requests. Returns the number of files removed.
    pub async fn sweep(&self, max_age: Duration) -> io::Result<usize> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let now = SystemTime::now();

        while let Some(entry) = entries.next_entry().await? {
            let is_ours = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(PREFIX));
            if !is_ours {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();

            if age >= max_age && tokio::fs::remove_file(entry.path()).await.is_ok() {
                removed += 1;
            }
        }

        Ok(removed)
    }
}

/// A scratch file that is deleted when dropped
#[derive(Debug)]
pub struct ScratchFile {
    path: TempPath,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocations_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(dir.path());

        let a = scratch.allocate("pdf").unwrap();
        let b = scratch.allocate("pdf").unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(dir.path()));
        assert_eq!(a.path().extension().unwrap(), "pdf");

        let name = a.path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(PREFIX));
    }

    #[test]
    fn test_allocate_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(dir.path());

        let file = scratch.allocate("docx").unwrap();
        assert!(file.path().is_file());
        assert_eq!(std::fs::metadata(file.path()).unwrap().len(), 0);
    }

    #[test]
    fn test_allocate_in_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(dir.path().join("gone"));
        assert!(scratch.allocate("pdf").is_err());
    }

    #[test]
    fn test_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(dir.path());

        let file = scratch.allocate("docx").unwrap();
        let path = file.path().to_path_buf();
        std::fs::write(&path, b"content").unwrap();
        assert!(path.exists());

        drop(file);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_sweep_only_touches_report_files() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(dir.path());

        let stale = dir.path().join("report-stale.pdf");
        let foreign = dir.path().join("invoice.xml");
        std::fs::write(&stale, b"old").unwrap();
        std::fs::write(&foreign, b"<a/>").unwrap();

        let removed = scratch.sweep(Duration::ZERO).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!stale.exists());
        assert!(foreign.exists());
    }
}
