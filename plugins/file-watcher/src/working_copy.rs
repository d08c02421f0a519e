//! On-disk working copy of the document being edited

use folio_core::{normalize_filename, FolioError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A directory holding one file per edited document, laid out by filename
#[derive(Debug, Clone)]
pub struct WorkingCopy {
    root: PathBuf,
}

impl WorkingCopy {
    /// Create the directory if needed and resolve it to an absolute path
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        tokio::fs::create_dir_all(root).await.map_err(|e| {
            FolioError::file_system(format!(
                "Failed to create working directory {}: {}",
                root.display(),
                e
            ))
        })?;
        let root = tokio::fs::canonicalize(root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `filename`
    pub fn path_for(&self, filename: &str) -> Result<PathBuf> {
        let normalized = normalize_filename(filename)?;
        Ok(normalized
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment)))
    }

    /// Map a path inside the working copy back to its document name
    pub fn filename_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments = relative
            .components()
            .map(|component| component.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        normalize_filename(&segments.join("/")).ok()
    }

    pub async fn write(&self, filename: &str, content: &str) -> Result<PathBuf> {
        let path = self.path_for(filename)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await.map_err(|e| {
            FolioError::file_system(format!("Failed to write {}: {}", path.display(), e))
        })?;
        debug!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(path)
    }

    pub async fn read(&self, filename: &str) -> Result<String> {
        let path = self.path_for(filename)?;
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            FolioError::file_system(format!("Failed to read {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read_nested_document() {
        let dir = tempfile::tempdir().unwrap();
        let copy = WorkingCopy::open(dir.path().join("work")).await.unwrap();

        let path = copy.write("docs/a.html", "<p>a</p>").await.unwrap();
        assert!(path.starts_with(copy.root()));
        assert!(path.ends_with("docs/a.html"));
        assert_eq!(copy.read("docs/a.html").await.unwrap(), "<p>a</p>");
    }

    #[tokio::test]
    async fn test_filename_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let copy = WorkingCopy::open(dir.path()).await.unwrap();

        let path = copy.path_for("/docs//a.html").unwrap();
        assert_eq!(copy.filename_for(&path).as_deref(), Some("docs/a.html"));
        assert_eq!(copy.filename_for(Path::new("/elsewhere/a.html")), None);
    }

    #[tokio::test]
    async fn test_rejects_escaping_names() {
        let dir = tempfile::tempdir().unwrap();
        let copy = WorkingCopy::open(dir.path()).await.unwrap();

        let err = copy.path_for("../outside.html").unwrap_err();
        assert!(matches!(err, FolioError::InvalidFilename(_)));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let copy = WorkingCopy::open(dir.path()).await.unwrap();

        let err = copy.read("missing.html").await.unwrap_err();
        assert!(matches!(err, FolioError::FileSystem(_)));
    }
}
