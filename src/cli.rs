//! Command-line interface.
//!
//! ```bash
//! # Index ~/Archives and look for copies under ~/Downloads
//! arcdupe scan -s ~/Archives -t ~/Downloads
//!
//! # Reuse the index for unchanged archives, delete selected duplicates
//! arcdupe scan -s ~/Archives -t ~/Downloads --recheck-archives --delete -y
//!
//! # Never delete anything under ~/Downloads/keep, now or in later runs
//! arcdupe scan -s ~/Archives -t ~/Downloads --keep ~/Downloads/keep
//!
//! # Index statistics
//! arcdupe stats
//! ```
//!
//! Flags override the configuration file and `ARCDUPE_*` variables; see
//! [`crate::config`].

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::actions::DeleteMode;
use crate::config::AppConfig;

/// Find files that already exist inside your archives.
#[derive(Debug, Parser)]
#[command(name = "arcdupe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Index source archives and match target files against them
    Scan(ScanArgs),
    /// Show what the index holds
    Stats(StoreArgs),
    /// Remove everything from the index
    Clear(StoreArgs),
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory with archives to index (repeatable)
    #[arg(short, long = "source", value_name = "DIR")]
    pub source_dirs: Vec<PathBuf>,

    /// Directory to search for duplicates (repeatable)
    #[arg(short, long = "target", value_name = "DIR")]
    pub target_dirs: Vec<PathBuf>,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Start with an empty index and remove it afterwards
    #[arg(long)]
    pub no_keep_store: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Ignore files smaller than this (e.g. 4KiB, 1MB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Files at least this large get a quick hash first
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub partial_threshold: Option<u64>,

    /// Bytes covered by the quick hash
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub partial_size: Option<u64>,

    /// Levels of nested archives to open
    #[arg(long, value_name = "N")]
    pub max_depth: Option<u32>,

    /// Skip paths matching a gitignore-style pattern (repeatable)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Reuse index entries of archives that did not change
    #[arg(long)]
    pub recheck_archives: bool,

    /// Reuse cached fingerprints of target files that did not change
    #[arg(long)]
    pub recheck_targets: bool,

    /// Do not pre-select duplicates for deletion
    #[arg(long)]
    pub no_auto_select: bool,

    /// Run self-extracting executables to look inside them
    #[arg(long)]
    pub allow_self_extract: bool,

    /// Seconds before an external extractor is killed
    #[arg(long, value_name = "SECS")]
    pub extract_timeout: Option<u64>,

    /// Keep duplicates at or under this path; the choice is remembered (repeatable)
    #[arg(long, value_name = "PATH")]
    pub keep: Vec<PathBuf>,

    /// Select duplicates at or under this path for deletion; remembered (repeatable)
    #[arg(long, value_name = "PATH")]
    pub select: Vec<PathBuf>,

    /// Select every duplicate found for deletion and remember it
    #[arg(long, conflicts_with = "deselect_all")]
    pub select_all: bool,

    /// Keep every duplicate found and remember it
    #[arg(long)]
    pub deselect_all: bool,

    /// Delete the selected duplicates after the scan
    #[arg(long)]
    pub delete: bool,

    /// How to delete
    #[arg(long, value_enum)]
    pub delete_mode: Option<DeleteMode>,

    /// Show what would be deleted without deleting
    #[arg(long)]
    pub dry_run: bool,

    /// Do not ask before deleting
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl ScanArgs {
    /// Apply the flags that were given on top of `config`.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if !self.source_dirs.is_empty() {
            config.source_dirs.clone_from(&self.source_dirs);
        }
        if !self.target_dirs.is_empty() {
            config.target_dirs.clone_from(&self.target_dirs);
        }
        if let Some(ref store) = self.store.store {
            config.store_path.clone_from(store);
        }
        if self.no_keep_store {
            config.keep_store_between_runs = false;
        }
        if let Some(size) = self.min_size {
            config.min_file_size = size;
        }
        if let Some(size) = self.partial_threshold {
            config.partial_hash_threshold = size;
        }
        if let Some(size) = self.partial_size {
            config.partial_hash_size = size;
        }
        if let Some(depth) = self.max_depth {
            config.max_recursion_depth = depth;
        }
        if !self.ignore_patterns.is_empty() {
            config
                .ignore_patterns
                .extend(self.ignore_patterns.iter().cloned());
        }
        config.recheck_archives |= self.recheck_archives;
        config.recheck_targets |= self.recheck_targets;
        config.allow_self_extract |= self.allow_self_extract;
        config.dry_run |= self.dry_run;
        if self.no_auto_select {
            config.auto_select_duplicates = false;
        }
        if let Some(secs) = self.extract_timeout {
            config.extract_timeout_secs = secs;
        }
        if let Some(mode) = self.delete_mode {
            config.delete_mode = mode;
        }
    }
}

#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Index database file
    #[arg(long, value_name = "FILE")]
    pub store: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Parse a size such as `1024`, `4K`, `1.5MB` or `2GiB`.
///
/// Decimal suffixes (K, KB, M, MB, ...) are powers of 1000, binary suffixes
/// (KiB, MiB, ...) powers of 1024. Case is ignored.
///
/// # Errors
///
/// Returns a message for empty input, bad numbers and unknown suffixes.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    if s.starts_with('-') {
        return Err("Size cannot be negative".to_string());
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(split);
    let value: f64 = number
        .parse()
        .map_err(|_| format!("Invalid number: '{number}'"))?;

    let multiplier: u64 = match suffix.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" => 1_000,
        "KIB" => 1 << 10,
        "M" | "MB" => 1_000_000,
        "MIB" => 1 << 20,
        "G" | "GB" => 1_000_000_000,
        "GIB" => 1 << 30,
        "T" | "TB" => 1_000_000_000_000,
        "TIB" => 1 << 40,
        other => return Err(format!("Unknown size suffix: '{other}'")),
    };

    Ok((value * multiplier as f64) as u64)
}
