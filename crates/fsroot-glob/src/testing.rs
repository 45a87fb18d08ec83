//! In-memory `WalkerFs` for unit tests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::{Metadata, WalkerError, WalkerFs};

/// In-memory filesystem for testing the walker.
///
/// Paths are relative; the empty path is the root. Listings come back
/// sorted by name. Individual paths can be marked as failing to list,
/// stat or read. Every call is counted, see [`MemoryFs::ops`].
#[derive(Debug, Default)]
pub(crate) struct MemoryFs {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    unreadable: BTreeSet<PathBuf>,
    unstatable: BTreeSet<PathBuf>,
    unreadable_files: BTreeSet<PathBuf>,
    ops: Arc<AtomicUsize>,
}

impl MemoryFs {
    pub(crate) fn new() -> Self {
        let mut fs = Self::default();
        fs.dirs.insert(PathBuf::new());
        fs
    }

    pub(crate) fn file(mut self, path: &str, content: &[u8]) -> Self {
        let path = PathBuf::from(path);
        if let Some(parent) = path.parent() {
            self.ensure_dirs(parent);
        }
        self.files.insert(path, content.to_vec());
        self
    }

    pub(crate) fn dir(mut self, path: &str) -> Self {
        self.ensure_dirs(Path::new(path));
        self
    }

    /// Listing this directory fails with permission denied.
    pub(crate) fn unreadable(mut self, path: &str) -> Self {
        self.ensure_dirs(Path::new(path));
        self.unreadable.insert(PathBuf::from(path));
        self
    }

    /// Stat of this path fails with an I/O error.
    pub(crate) fn unstatable(mut self, path: &str) -> Self {
        self.unstatable.insert(PathBuf::from(path));
        self
    }

    /// Reading this file fails with permission denied.
    pub(crate) fn unreadable_file(mut self, path: &str, content: &[u8]) -> Self {
        self.unreadable_files.insert(PathBuf::from(path));
        self.file(path, content)
    }

    /// Shared counter of `list_dir`, `stat` and `read_file` calls.
    pub(crate) fn ops(&self) -> Arc<AtomicUsize> {
        self.ops.clone()
    }

    fn ensure_dirs(&mut self, path: &Path) {
        for ancestor in path.ancestors() {
            self.dirs.insert(ancestor.to_path_buf());
        }
    }
}

#[async_trait]
impl WalkerFs for MemoryFs {
    async fn list_dir(&self, path: &Path) -> Result<Vec<String>, WalkerError> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        if self.unreadable.contains(path) {
            return Err(WalkerError::PermissionDenied(path.display().to_string()));
        }
        if !self.dirs.contains(path) {
            return Err(WalkerError::NotFound(path.display().to_string()));
        }

        let children = self
            .files
            .keys()
            .chain(self.dirs.iter())
            .filter(|p| p.parent() == Some(path))
            .filter_map(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect::<BTreeSet<_>>();

        Ok(children.into_iter().collect())
    }

    async fn stat(&self, path: &Path) -> Result<Metadata, WalkerError> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        if self.unstatable.contains(path) {
            return Err(WalkerError::Io(format!("{}: stale handle", path.display())));
        }
        if let Some(content) = self.files.get(path) {
            return Ok(Metadata {
                is_dir: false,
                is_file: true,
                size: content.len() as u64,
                modified: None,
            });
        }
        if self.dirs.contains(path) {
            return Ok(Metadata {
                is_dir: true,
                is_file: false,
                size: 0,
                modified: None,
            });
        }
        Err(WalkerError::NotFound(path.display().to_string()))
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, WalkerError> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        if self.unreadable_files.contains(path) {
            return Err(WalkerError::PermissionDenied(path.display().to_string()));
        }
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| WalkerError::NotFound(path.display().to_string()))
    }
}
