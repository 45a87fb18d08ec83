//! fsroot-glob: segment glob queries and a pausable async directory walker.
//!
//! Provides:
//! - **QueryPattern**: `/`-separated glob queries with `*` and `**` (globstar)
//! - **FsWalker**: depth-first walker that streams matches, generic over `WalkerFs`
//! - **Selection**: an `FsWalker` driven on its own task, with pause/resume
//! - **LocalFs**: `WalkerFs` over a real directory, built on `tokio::fs`
//!
//! The walker is generic over `WalkerFs`, a minimal read-only filesystem trait.
//! Consumers implement `WalkerFs` to adapt their own storage.

mod local;
pub mod pattern;
mod selection;
#[cfg(test)]
mod testing;
mod walker;

pub use local::LocalFs;
pub use pattern::{PatternError, QueryPattern, Segment};
pub use selection::{FlowControl, Selection};
pub use walker::{
    FsWalker, IgnoreRule, Match, OutputMode, Payload, WalkError, WalkEvent, WalkOptions, is_dotfile,
};

use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;

/// Errors from filesystem operations within the walker.
#[derive(Debug, Error)]
pub enum WalkerError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("io error: {0}")]
    Io(String),
}

impl WalkerError {
    /// Classify an I/O error raised while touching `path`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        let what = format!("{}: {}", path.display(), err);
        match err.kind() {
            io::ErrorKind::NotFound => WalkerError::NotFound(what),
            io::ErrorKind::PermissionDenied => WalkerError::PermissionDenied(what),
            _ => WalkerError::Io(what),
        }
    }
}

/// Metadata about a file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// True if this is a directory.
    pub is_dir: bool,
    /// True if this is a regular file.
    pub is_file: bool,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, if available.
    pub modified: Option<SystemTime>,
}

/// Minimal read-only filesystem abstraction for the walker.
///
/// All paths are relative to the filesystem's root; the empty path is the
/// root itself.
#[async_trait]
pub trait WalkerFs: Send + Sync {
    /// List the entry names in a directory.
    ///
    /// The walker visits entries in the order returned here unless
    /// files-first ordering is enabled.
    async fn list_dir(&self, path: &Path) -> Result<Vec<String>, WalkerError>;

    /// Get metadata for a path, following symlinks.
    async fn stat(&self, path: &Path) -> Result<Metadata, WalkerError>;

    /// Read the full contents of a file into memory.
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, WalkerError>;
}

#[async_trait]
impl<F: WalkerFs + ?Sized> WalkerFs for Arc<F> {
    async fn list_dir(&self, path: &Path) -> Result<Vec<String>, WalkerError> {
        (**self).list_dir(path).await
    }

    async fn stat(&self, path: &Path) -> Result<Metadata, WalkerError> {
        (**self).stat(path).await
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, WalkerError> {
        (**self).read_file(path).await
    }
}
