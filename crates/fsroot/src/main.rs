//! fsroot CLI entry point.
//!
//! Usage:
//!   fsroot select --root <dir> [QUERY]     # Stream matches, one per line
//!   fsroot select --root <dir> --content   # Emit parsed JSON too
//!   fsroot get --root <dir> <key>          # Print a single record
//!
//! Logging goes to stderr and respects RUST_LOG.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Instant, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use fsroot::{FsRoot, Match, RootConfig, WalkEvent};

/// Query and load JSON records stored as files.
#[derive(Parser, Debug)]
#[command(name = "fsroot", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream every file matching a glob query
    Select {
        /// Directory holding the records
        #[arg(long)]
        root: PathBuf,

        /// Slash-separated glob, e.g. `users/**/*.json` (defaults to config)
        query: Option<String>,

        /// Load and parse each matched .json file
        #[arg(long)]
        content: bool,

        /// Visit files before subdirectories
        #[arg(long)]
        files_first: bool,

        /// Include dotfiles and dot-directories
        #[arg(long)]
        hidden: bool,

        /// Config file to use instead of the default location
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print one JSON object per match
        #[arg(long)]
        json: bool,
    },

    /// Print the record stored at KEY
    Get {
        /// Directory holding the records
        #[arg(long)]
        root: PathBuf,

        /// Path of the record relative to the root
        key: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fsroot=info")))
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    match args.command {
        Command::Select {
            root,
            query,
            content,
            files_first,
            hidden,
            config,
            json,
        } => {
            let mut config = match config {
                Some(path) => RootConfig::load_from(&path)?,
                None => RootConfig::load()?,
            };
            if let Some(query) = query {
                config.query = query;
            }
            config.load_content |= content;
            config.files_first |= files_first;
            config.include_hidden |= hidden;

            rt.block_on(run_select(FsRoot::new(root), config, json))
        }
        Command::Get { root, key } => rt.block_on(run_get(FsRoot::new(root), &key)),
    }
}

async fn run_select(root: FsRoot, config: RootConfig, json: bool) -> Result<ExitCode> {
    tracing::info!(root = %root.dir().display(), query = %config.query, "selecting");

    let started = Instant::now();
    let mut selection = root.select_with(&config.query, config.walk_options())?;

    while let Some(event) = selection.next_event().await {
        match event {
            WalkEvent::Match(m) => {
                // Hold the walk while the line is written.
                selection.pause();
                println!("{}", format_match(&m, json)?);
                selection.resume();
            }
            WalkEvent::End => {
                eprintln!("elapsed {}ms", started.elapsed().as_millis());
            }
            WalkEvent::Error(err) => {
                tracing::warn!(path = %err.path().display(), "walk failed");
                eprintln!("Error: {err}");
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_get(root: FsRoot, key: &str) -> Result<ExitCode> {
    match root.get(key).await {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) if err.is_not_found() => {
            eprintln!("not found: {key}");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err.into()),
    }
}

fn format_match(m: &Match, as_json: bool) -> Result<String> {
    let metadata = m.payload.metadata();

    if as_json {
        let modified = metadata
            .modified
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs());
        let line = json!({
            "path": m.path.display().to_string(),
            "size": metadata.size,
            "modified": modified,
            "content": m.payload.content(),
        });
        return Ok(serde_json::to_string(&line)?);
    }

    Ok(match m.payload.content() {
        Some(value) => format!("{}\t{}", m.path.display(), serde_json::to_string(value)?),
        None => format!("{}\t{}", m.path.display(), metadata.size),
    })
}
