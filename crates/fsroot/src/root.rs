//! A directory of JSON records, addressed by relative key.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fsroot_glob::{FsWalker, LocalFs, PatternError, Selection, WalkOptions, WalkerError, WalkerFs};
use thiserror::Error;

/// Errors from a single-key lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("reading {}: {source}", .path.display())]
    Read { path: PathBuf, source: WalkerError },
    #[error("could not parse json {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl LookupError {
    /// True if the key does not exist under the root.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LookupError::Read {
                source: WalkerError::NotFound(_),
                ..
            }
        )
    }
}

/// Records stored as files under `dir`.
///
/// `select` streams matches of a glob query; `get` loads one record.
#[derive(Debug, Clone)]
pub struct FsRoot {
    fs: Arc<LocalFs>,
}

impl FsRoot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            fs: Arc::new(LocalFs::new(dir)),
        }
    }

    pub fn dir(&self) -> &Path {
        self.fs.root()
    }

    /// A walker for `query`, to be driven by the caller.
    pub fn walker(
        &self,
        query: &str,
        options: WalkOptions,
    ) -> Result<FsWalker<Arc<LocalFs>>, PatternError> {
        FsWalker::new(self.fs.clone(), query, options)
    }

    /// Start streaming metadata for every file matching `query`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn select(&self, query: &str) -> Result<Selection, PatternError> {
        self.select_with(query, WalkOptions::default())
    }

    pub fn select_with(&self, query: &str, options: WalkOptions) -> Result<Selection, PatternError> {
        Ok(Selection::spawn(self.walker(query, options)?))
    }

    /// Read and parse the record at `key`, relative to the root.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub async fn get(&self, key: &str) -> Result<serde_json::Value, LookupError> {
        let key = Path::new(key);
        let key = key.strip_prefix("/").unwrap_or(key);
        let data = self
            .fs
            .read_file(key)
            .await
            .map_err(|source| LookupError::Read {
                path: self.dir().join(key),
                source,
            })?;

        serde_json::from_slice(&data).map_err(|source| LookupError::Parse {
            path: self.dir().join(key),
            source,
        })
    }
}
