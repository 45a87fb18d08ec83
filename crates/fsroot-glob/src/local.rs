//! Local filesystem backend.
//!
//! Provides read access to a real directory tree through `tokio::fs`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::{Metadata, WalkerError, WalkerFs};

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/srv/records`, then `read_file("users/1.json")` reads
/// `/srv/records/users/1.json`.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    /// Create a new local filesystem rooted at the given path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path to a path under the root.
    ///
    /// Returns an error if the path would escape the root via `..`.
    fn resolve(&self, path: &Path) -> Result<PathBuf, WalkerError> {
        let path = path.strip_prefix("/").unwrap_or(path);

        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(WalkerError::PermissionDenied(format!(
                "path escapes root: {}",
                path.display()
            )));
        }

        Ok(self.root.join(path))
    }
}

#[async_trait]
impl WalkerFs for LocalFs {
    async fn list_dir(&self, path: &Path) -> Result<Vec<String>, WalkerError> {
        let full_path = self.resolve(path)?;
        let mut dir = fs::read_dir(&full_path)
            .await
            .map_err(|e| WalkerError::from_io(&full_path, e))?;

        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| WalkerError::from_io(&full_path, e))?
        {
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                // Such a name could never be statted again by its lossy form.
                Err(raw) => tracing::warn!(
                    dir = %full_path.display(),
                    name = ?raw,
                    "skipping entry with non-UTF-8 name"
                ),
            }
        }

        names.sort();
        Ok(names)
    }

    async fn stat(&self, path: &Path) -> Result<Metadata, WalkerError> {
        let full_path = self.resolve(path)?;
        let meta = fs::metadata(&full_path)
            .await
            .map_err(|e| WalkerError::from_io(&full_path, e))?;

        Ok(Metadata {
            is_dir: meta.is_dir(),
            is_file: meta.is_file(),
            size: meta.len(),
            modified: meta.modified().ok(),
        })
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, WalkerError> {
        let full_path = self.resolve(path)?;
        fs::read(&full_path)
            .await
            .map_err(|e| WalkerError::from_io(&full_path, e))
    }
}
