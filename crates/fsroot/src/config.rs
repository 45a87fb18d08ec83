//! Configuration for the fsroot CLI.
//!
//! Configuration is loaded from `~/.config/fsroot/config.toml` (or the
//! platform equivalent). Command-line flags override file values.

use std::path::Path;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use fsroot_glob::{OutputMode, WalkOptions};
use serde::{Deserialize, Serialize};

/// Defaults for `fsroot select`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootConfig {
    /// Query used when none is given on the command line.
    #[serde(default = "default_query")]
    pub query: String,

    /// Emit parsed JSON instead of metadata.
    #[serde(default)]
    pub load_content: bool,

    /// Visit files before subdirectories in each directory.
    #[serde(default)]
    pub files_first: bool,

    /// Walk dotfiles too.
    #[serde(default)]
    pub include_hidden: bool,
}

fn default_query() -> String {
    "**/*".to_string()
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            query: default_query(),
            load_content: false,
            files_first: false,
            include_hidden: false,
        }
    }
}

impl RootConfig {
    /// Load `config.toml` from the platform config directory, or defaults.
    pub fn load() -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "fsroot")
            .context("no home directory to look for fsroot config in")?;
        Self::load_or_default(&dirs.config_dir().join("config.toml"))
    }

    /// Like [`RootConfig::load_from`], but a missing file means defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("reading config {}", path.display())),
        }
    }

    /// Load an explicitly named config file. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self> {
        toml::from_str(text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Walker options described by this configuration.
    pub fn walk_options(&self) -> WalkOptions {
        let options = WalkOptions {
            mode: if self.load_content {
                OutputMode::Content
            } else {
                OutputMode::Stats
            },
            ..Default::default()
        }
        .with_files_first(self.files_first);

        if self.include_hidden {
            options.include_hidden()
        } else {
            options
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RootConfig::default();
        assert_eq!(config.query, "**/*");
        assert!(!config.load_content);
        assert!(!config.files_first);
        assert!(!config.include_hidden);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
query = "users/**/*.json"
load_content = true
files_first = true
include_hidden = true
"#;

        let config: RootConfig = toml::from_str(toml).expect("parse failed");
        assert_eq!(config.query, "users/**/*.json");
        assert!(config.load_content);
        assert!(config.files_first);
        assert!(config.include_hidden);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: RootConfig = toml::from_str("").expect("parse failed");
        assert_eq!(config, RootConfig::default());
    }

    #[test]
    fn test_walk_options() {
        let options = RootConfig::default().walk_options();
        assert_eq!(options.mode, OutputMode::Stats);
        assert!(!options.files_first);
        assert!((options.ignore)(".git"));

        let config = RootConfig {
            load_content: true,
            files_first: true,
            include_hidden: true,
            ..Default::default()
        };
        let options = config.walk_options();
        assert_eq!(options.mode, OutputMode::Content);
        assert!(options.files_first);
        assert!(!(options.ignore)(".git"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "files_first = true\n").unwrap();

        let config = RootConfig::load_from(&path).unwrap();
        assert!(config.files_first);
        assert_eq!(config.query, "**/*");

        std::fs::write(&path, "files_first = \"nope\"\n").unwrap();
        let err = RootConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().starts_with("parsing config"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        assert_eq!(RootConfig::load_or_default(&path).unwrap(), RootConfig::default());

        let err = RootConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().starts_with("reading config"));
    }

    #[test]
    fn test_load_or_default_reads_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "query = \"*.json\"\ninclude_hidden = true\n").unwrap();

        let config = RootConfig::load_or_default(&path).unwrap();
        assert_eq!(config.query, "*.json");
        assert!(config.include_hidden);
        assert!(!config.load_content);
    }
}
