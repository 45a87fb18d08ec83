//! fsroot: JSON records stored as files in a directory tree.
//!
//! - **FsRoot**: `select` streams glob matches, `get` loads one record
//! - **RootConfig**: CLI defaults loaded from TOML
//!
//! The walking machinery lives in `fsroot-glob` and is re-exported here.

pub mod config;
mod root;

pub use config::RootConfig;
pub use root::{FsRoot, LookupError};

pub use fsroot_glob::{
    FlowControl, FsWalker, Match, Metadata, OutputMode, PatternError, Payload, QueryPattern,
    Selection, WalkError, WalkEvent, WalkOptions,
};
