//! Core async walker, generic over `WalkerFs`.
//!
//! The walk is an explicit depth-first stack of directory frames. Each call
//! to [`FsWalker::step`] performs one unit of work on the top frame: load
//! its listing (one `list_dir` plus one batch of `stat`s), advance its cursor
//! by one entry, or pop it once exhausted. Steps take `&mut self`, so only
//! one can ever be in flight for a given walker.
//!
//! ```text
//!   query "users/**/*.json"
//!
//!   [ ""          seg=users    ]   lists root, keeps "users"
//!   [ users       seg=*.json R ]   `**` entered: every subdir is eligible
//!   [ users/2024  seg=*.json R ]   top frame, cursor walks its entries
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::Stream;
use futures::future::try_join_all;
use thiserror::Error;

use crate::pattern::{PatternError, QueryPattern};
use crate::{Metadata, WalkerError, WalkerFs};

/// Predicate deciding whether an entry name is skipped before matching.
///
/// Receives the bare entry name, not its path.
pub type IgnoreRule = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// The default ignore rule: names starting with `.`.
pub fn is_dotfile(name: &str) -> bool {
    name.starts_with('.')
}

/// What a match carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Emit metadata for every matched file.
    #[default]
    Stats,
    /// Read and parse matched `.json` files; other names are skipped.
    Content,
}

/// Options for walking.
#[derive(Clone)]
pub struct WalkOptions {
    /// Output policy for matched files.
    pub mode: OutputMode,
    /// Order each directory's entries files first, then by name.
    pub files_first: bool,
    /// Names for which this returns true are never listed.
    pub ignore: IgnoreRule,
}

impl WalkOptions {
    pub fn content() -> Self {
        Self {
            mode: OutputMode::Content,
            ..Default::default()
        }
    }

    pub fn with_files_first(mut self, files_first: bool) -> Self {
        self.files_first = files_first;
        self
    }

    pub fn with_ignore(mut self, ignore: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.ignore = Arc::new(ignore);
        self
    }

    /// Ignore nothing, dotfiles included.
    pub fn include_hidden(self) -> Self {
        self.with_ignore(|_| false)
    }
}

impl fmt::Debug for WalkOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalkOptions")
            .field("mode", &self.mode)
            .field("files_first", &self.files_first)
            .field("ignore", &"...")
            .finish()
    }
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            mode: OutputMode::Stats,
            files_first: false,
            ignore: Arc::new(is_dotfile),
        }
    }
}

/// Payload of a match, depending on [`OutputMode`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Stats(Metadata),
    Content {
        value: serde_json::Value,
        metadata: Metadata,
    },
}

impl Payload {
    pub fn metadata(&self) -> &Metadata {
        match self {
            Payload::Stats(metadata) | Payload::Content { metadata, .. } => metadata,
        }
    }

    /// Parsed JSON, only present in content mode.
    pub fn content(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Stats(_) => None,
            Payload::Content { value, .. } => Some(value),
        }
    }
}

/// A matched file.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Path relative to the walk root.
    pub path: PathBuf,
    pub payload: Payload,
}

/// Terminal failures of a walk. Each carries the path that caused it.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("listing {}: {source}", .path.display())]
    List { path: PathBuf, source: WalkerError },
    #[error("stat {}: {source}", .path.display())]
    Stat { path: PathBuf, source: WalkerError },
    #[error("reading {}: {source}", .path.display())]
    Read { path: PathBuf, source: WalkerError },
    #[error("could not parse json {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl WalkError {
    pub fn path(&self) -> &Path {
        match self {
            WalkError::List { path, .. }
            | WalkError::Stat { path, .. }
            | WalkError::Read { path, .. }
            | WalkError::Parse { path, .. } => path,
        }
    }
}

/// One item of the walk's output sequence.
///
/// A walk produces zero or more `Match` events followed by exactly one of
/// `End` or `Error`.
#[derive(Debug)]
pub enum WalkEvent {
    Match(Match),
    End,
    Error(WalkError),
}

#[derive(Debug)]
struct Entry {
    name: String,
    metadata: Metadata,
}

/// One directory being walked.
#[derive(Debug)]
struct Frame {
    /// Directory path relative to the root.
    prefix: PathBuf,
    /// Index of the segment this frame matches against; the rest of the
    /// pattern is `segments[seg..]`.
    seg: usize,
    /// Inside a `**`: subdirectories are eligible without consuming `seg`.
    recursive: bool,
    entries: Option<Vec<Entry>>,
    cursor: usize,
}

enum Step {
    Continue,
    Emit(Match),
    Done,
}

enum Action {
    Skip,
    Descend { seg: usize, recursive: bool },
    Emit { metadata: Metadata, is_json: bool },
}

/// Async depth-first walker, generic over any `WalkerFs` implementation.
///
/// # Examples
/// ```ignore
/// use fsroot_glob::{FsWalker, LocalFs, WalkOptions};
///
/// let mut walker = FsWalker::new(LocalFs::new("/srv/records"), "users/**/*.json", WalkOptions::content())?;
/// while let Some(event) = walker.next_event().await {
///     println!("{event:?}");
/// }
/// ```
pub struct FsWalker<F: WalkerFs> {
    fs: F,
    pattern: QueryPattern,
    options: WalkOptions,
    stack: Vec<Frame>,
    halted: bool,
}

impl<F: WalkerFs> fmt::Debug for FsWalker<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsWalker")
            .field("pattern", &self.pattern.to_string())
            .field("options", &self.options)
            .field("depth", &self.stack.len())
            .field("halted", &self.halted)
            .finish()
    }
}

impl<F: WalkerFs> FsWalker<F> {
    /// Compile `query` and set up a walk from the root of `fs`.
    ///
    /// No I/O happens until the walker is stepped.
    pub fn new(fs: F, query: &str, options: WalkOptions) -> Result<Self, PatternError> {
        Ok(Self::with_pattern(fs, QueryPattern::parse(query)?, options))
    }

    pub fn with_pattern(fs: F, pattern: QueryPattern, options: WalkOptions) -> Self {
        let mut walker = Self {
            fs,
            pattern,
            options,
            stack: Vec::new(),
            halted: false,
        };
        walker.push_frame(PathBuf::new(), 0, false);
        walker
    }

    pub fn pattern(&self) -> &QueryPattern {
        &self.pattern
    }

    pub fn options(&self) -> &WalkOptions {
        &self.options
    }

    /// True once `End` or `Error` has been produced.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Number of frames currently on the stack.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Run exactly one step.
    ///
    /// Returns the event the step produced, if any. After the terminal
    /// event the walker is halted and every further call returns `None`
    /// without touching the filesystem.
    pub async fn step(&mut self) -> Option<WalkEvent> {
        if self.halted {
            return None;
        }

        match self.run_step().await {
            Ok(Step::Continue) => None,
            Ok(Step::Emit(m)) => Some(WalkEvent::Match(m)),
            Ok(Step::Done) => {
                self.halted = true;
                tracing::debug!(pattern = %self.pattern, "walk complete");
                Some(WalkEvent::End)
            }
            Err(err) => {
                self.halted = true;
                self.stack.clear();
                tracing::warn!(pattern = %self.pattern, error = %err, "walk failed");
                Some(WalkEvent::Error(err))
            }
        }
    }

    /// Step until the next event.
    pub async fn next_event(&mut self) -> Option<WalkEvent> {
        while !self.halted {
            if let Some(event) = self.step().await {
                return Some(event);
            }
        }
        None
    }

    /// Turn the walker into a stream of matches.
    ///
    /// The stream ends after `End`, or after yielding the error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Match, WalkError>> {
        futures::stream::unfold(self, |mut walker| async move {
            match walker.next_event().await? {
                WalkEvent::Match(m) => Some((Ok(m), walker)),
                WalkEvent::Error(err) => Some((Err(err), walker)),
                WalkEvent::End => None,
            }
        })
    }

    /// Collect all matches, failing on the first error.
    pub async fn collect(mut self) -> Result<Vec<Match>, WalkError> {
        let mut matches = Vec::new();
        while let Some(event) = self.next_event().await {
            match event {
                WalkEvent::Match(m) => matches.push(m),
                WalkEvent::Error(err) => return Err(err),
                WalkEvent::End => break,
            }
        }
        Ok(matches)
    }

    /// Push a frame, entering recursive mode if its segment is `**`.
    fn push_frame(&mut self, prefix: PathBuf, seg: usize, recursive: bool) {
        // A globstar is never last after parsing, so `seg + 1` is valid.
        let (seg, recursive) = if self.pattern.segments()[seg].is_globstar() {
            (seg + 1, true)
        } else {
            (seg, recursive)
        };

        tracing::trace!(prefix = %prefix.display(), seg, recursive, "push frame");
        self.stack.push(Frame {
            prefix,
            seg,
            recursive,
            entries: None,
            cursor: 0,
        });
    }

    async fn run_step(&mut self) -> Result<Step, WalkError> {
        let Some(frame) = self.stack.last() else {
            return Ok(Step::Done);
        };

        let Some(entries) = &frame.entries else {
            self.load_top().await?;
            return Ok(Step::Continue);
        };

        let Some(entry) = entries.get(frame.cursor) else {
            // Give other tasks a turn before unwinding.
            tokio::task::yield_now().await;
            if let Some(frame) = self.stack.pop() {
                tracing::trace!(prefix = %frame.prefix.display(), "pop frame");
            }
            return Ok(Step::Continue);
        };

        let segments = self.pattern.segments();
        let segment = &segments[frame.seg];
        let remaining = segments.len() - frame.seg;
        let path = frame.prefix.join(&entry.name);

        let action = if entry.metadata.is_dir {
            if frame.recursive {
                if remaining > 1 && segment.matches(&entry.name) {
                    Action::Descend {
                        seg: frame.seg + 1,
                        recursive: false,
                    }
                } else {
                    Action::Descend {
                        seg: frame.seg,
                        recursive: true,
                    }
                }
            } else if remaining > 1 {
                Action::Descend {
                    seg: frame.seg + 1,
                    recursive: false,
                }
            } else {
                // Directory, but no pattern left to descend with.
                Action::Skip
            }
        } else if remaining == 1 && segment.matches(&entry.name) {
            Action::Emit {
                metadata: entry.metadata.clone(),
                is_json: entry.name.ends_with(".json"),
            }
        } else {
            Action::Skip
        };

        let step = match action {
            Action::Skip => {
                self.advance();
                Step::Continue
            }
            Action::Descend { seg, recursive } => {
                self.advance();
                self.push_frame(path, seg, recursive);
                Step::Continue
            }
            Action::Emit { metadata, is_json } => {
                let payload = self.payload(&path, metadata, is_json).await?;
                self.advance();
                match payload {
                    Some(payload) => Step::Emit(Match { path, payload }),
                    None => Step::Continue,
                }
            }
        };
        Ok(step)
    }

    fn advance(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.cursor += 1;
        }
    }

    /// List and stat the top frame's directory, keeping eligible entries.
    async fn load_top(&mut self) -> Result<(), WalkError> {
        let Some(frame) = self.stack.last() else {
            return Ok(());
        };
        let prefix = frame.prefix.clone();
        let recursive = frame.recursive;
        let segment = &self.pattern.segments()[frame.seg];

        let names = self
            .fs
            .list_dir(&prefix)
            .await
            .map_err(|source| WalkError::List {
                path: prefix.clone(),
                source,
            })?;

        // Filter before stating: ignored names never cost a syscall.
        let names: Vec<String> = names
            .into_iter()
            .filter(|name| !(self.options.ignore)(name.as_str()))
            .filter(|name| recursive || segment.matches(name))
            .collect();

        let fs = &self.fs;
        let stats = try_join_all(names.iter().map(|name| {
            let path = prefix.join(name);
            async move {
                fs.stat(&path)
                    .await
                    .map_err(|source| WalkError::Stat { path, source })
            }
        }))
        .await?;

        let mut entries: Vec<Entry> = names
            .into_iter()
            .zip(stats)
            .map(|(name, metadata)| Entry { name, metadata })
            .collect();

        if self.options.files_first {
            entries.sort_by(|a, b| {
                a.metadata
                    .is_dir
                    .cmp(&b.metadata.is_dir)
                    .then_with(|| a.name.cmp(&b.name))
            });
        }

        tracing::debug!(
            prefix = %prefix.display(),
            entries = entries.len(),
            recursive,
            "loaded directory"
        );

        if let Some(frame) = self.stack.last_mut() {
            frame.entries = Some(entries);
        }
        Ok(())
    }

    async fn payload(
        &self,
        path: &Path,
        metadata: Metadata,
        is_json: bool,
    ) -> Result<Option<Payload>, WalkError> {
        match self.options.mode {
            OutputMode::Stats => Ok(Some(Payload::Stats(metadata))),
            OutputMode::Content if !is_json => Ok(None),
            OutputMode::Content => {
                let bytes = self
                    .fs
                    .read_file(path)
                    .await
                    .map_err(|source| WalkError::Read {
                        path: path.to_path_buf(),
                        source,
                    })?;
                let value = serde_json::from_slice(&bytes).map_err(|source| WalkError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
                Ok(Some(Payload::Content { value, metadata }))
            }
        }
    }
}
