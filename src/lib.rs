//! arcdupe - find files that already exist inside archives.
//!
//! Source directories are searched for archives (zip, 7z, rar, tar and its
//! compressed variants, installers, disk images, ...). Every file inside
//! them, including files inside nested archives, is fingerprinted into a
//! persistent SQLite [`index`]. Target directories are then hashed and
//! matched against the index, and the matching target files can be moved to
//! the trash or deleted.
//!
//! # Modules
//!
//! - [`archive`]: format detection and the recursive [`archive::ArchiveWalker`]
//! - [`scanner`]: directory walking, hashing, the source and target scans
//! - [`index`]: the fingerprint store
//! - [`duplicates`]: match bookkeeping and selection
//! - [`actions`]: deletion
//! - [`output`]: text, JSON and CSV reports

pub mod actions;
pub mod archive;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod index;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::actions::{delete_files, BatchDeleteResult};
use crate::archive::{ArchiveWalker, Capabilities};
use crate::cli::{Cli, Commands, OutputFormat, ScanArgs, StoreArgs};
use crate::config::AppConfig;
use crate::duplicates::{select_all, select_under, selected_targets, DuplicateSummary, MatchMap};
use crate::error::ExitCode;
use crate::index::Index;
use crate::output::{CsvOutput, JsonOutput, TextOutput};
use crate::progress::{ChannelProgress, Progress, ProgressCallback};
use crate::scanner::{Hasher, SourceCatalogBuilder, SourceScanReport, TargetMatcher, TargetScanReport};
use crate::signal::ShutdownHandler;

/// Progress events buffered between the scanners and the display thread.
const PROGRESS_BUFFER: usize = 256;

/// Everything a finished scan reports.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub matches: MatchMap,
    pub summary: DuplicateSummary,
    pub source: SourceScanReport,
    pub target: TargetScanReport,
    /// Set when deletion (or a dry run) was performed.
    pub deletion: Option<BatchDeleteResult>,
    pub exit_code: ExitCode,
}

impl ScanReport {
    fn exit_code_for(&self) -> ExitCode {
        let deletion_failed = self
            .deletion
            .as_ref()
            .is_some_and(|d| !d.all_succeeded());
        if self.source.interrupted || self.target.interrupted {
            ExitCode::Interrupted
        } else if self.source.archives_failed > 0 || self.target.files_failed > 0 || deletion_failed
        {
            ExitCode::PartialSuccess
        } else if self.matches.is_empty() {
            ExitCode::NoDuplicates
        } else {
            ExitCode::Success
        }
    }
}

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns an error for invalid configuration, index failures and output
/// failures. Problems with single archives or files are reported in the
/// scan results instead.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    let mut config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan(ref args) => {
            args.apply_to(&mut config);
            config.validate()?;
            let handler = signal::install_handler()?;
            run_scan(&config, args, cli.quiet, &handler)
        }
        Commands::Stats(ref args) => show_stats(&store_path(&config, args)),
        Commands::Clear(ref args) => clear_store(&store_path(&config, args)),
    }
}

fn store_path(config: &AppConfig, args: &StoreArgs) -> PathBuf {
    args.store
        .clone()
        .unwrap_or_else(|| config.store_path.clone())
}

/// Run both scans, the optional deletion and print the report.
///
/// # Errors
///
/// Returns an error if the index cannot be used or the report not written.
pub fn run_scan(
    config: &AppConfig,
    args: &ScanArgs,
    quiet: bool,
    handler: &ShutdownHandler,
) -> Result<ExitCode> {
    if !config.keep_store_between_runs {
        remove_store(&config.store_path)?;
    }

    let report = {
        let index = Index::open(&config.store_path).with_context(|| {
            format!("Failed to open index at {}", config.store_path.display())
        })?;
        scan_with_index(config, args, quiet, handler, &index)?
    };

    write_report(&report, args.output)?;

    if !config.keep_store_between_runs {
        remove_store(&config.store_path)?;
    }
    Ok(report.exit_code)
}

fn scan_with_index(
    config: &AppConfig,
    args: &ScanArgs,
    quiet: bool,
    handler: &ShutdownHandler,
    index: &Index,
) -> Result<ScanReport> {
    let flag = handler.get_flag();
    let (progress, display) =
        ChannelProgress::forward_to(Arc::new(Progress::new(quiet)), PROGRESS_BUFFER)
            .context("Failed to start progress display")?;
    let progress: Arc<dyn ProgressCallback> = Arc::new(progress);

    let capabilities = Capabilities::detect()
        .with_self_extract(config.allow_self_extract)
        .with_extract_timeout(config.extract_timeout());
    log::debug!("Archive capabilities: {:?}", capabilities);

    let hasher = Hasher::new()
        .with_partial_hash_threshold(config.partial_hash_threshold)
        .with_partial_hash_size(config.partial_hash_size);

    let source = SourceCatalogBuilder::new(
        index,
        ArchiveWalker::new(capabilities, config.max_recursion_depth),
        hasher.clone(),
    )
    .with_min_file_size(config.min_file_size)
    .with_recheck_archives(config.recheck_archives)
    .with_ignore_patterns(config.ignore_patterns.clone())
    .with_shutdown_flag(Arc::clone(&flag))
    .with_progress_callback(Arc::clone(&progress))
    .scan(&config.source_dirs)
    .context("Source scan failed")?;

    let target = if source.report.interrupted {
        Default::default()
    } else {
        TargetMatcher::new(index, hasher)
            .with_min_file_size(config.min_file_size)
            .with_recheck_targets(config.recheck_targets)
            .with_auto_select(config.auto_select_duplicates)
            .with_ignore_patterns(config.ignore_patterns.clone())
            .with_shutdown_flag(flag)
            .with_progress_callback(Arc::clone(&progress))
            .scan(&config.target_dirs)
            .context("Target scan failed")?
    };

    drop(progress);
    if display.join().is_err() {
        log::warn!("Progress display thread panicked");
    }

    let mut matches = target.matches;
    apply_selection(args, index, &mut matches).context("Failed to store selection")?;

    let mut report = ScanReport {
        summary: DuplicateSummary::from_matches(&matches),
        matches,
        source: source.report,
        target: target.report,
        deletion: None,
        exit_code: ExitCode::Success,
    };

    let interrupted = report.source.interrupted || report.target.interrupted;
    if (args.delete || config.dry_run) && !interrupted {
        let paths = selected_targets(&report.matches);
        if !paths.is_empty() && (config.dry_run || args.yes || confirm_deletion(&report)?) {
            report.deletion = Some(delete_files(&paths, config.delete_mode, config.dry_run));
        }
    }

    report.exit_code = report.exit_code_for();
    Ok(report)
}

/// Apply the selection flags to the matches and persist them: the blanket
/// `--select-all`/`--deselect-all` first, then `--select`, then `--keep`.
fn apply_selection(args: &ScanArgs, index: &Index, matches: &mut MatchMap) -> Result<()> {
    if args.select_all {
        select_all(matches, index, true)?;
    }
    if args.deselect_all {
        select_all(matches, index, false)?;
    }
    let edits = args
        .select
        .iter()
        .map(|path| (path, true))
        .chain(args.keep.iter().map(|path| (path, false)));
    for (path, selected) in edits {
        let root = std::path::absolute(path).unwrap_or_else(|_| path.clone());
        let changed = select_under(matches, index, &root, selected)?;
        if changed == 0 {
            log::warn!("No duplicate found at or under {}", path.display());
        } else {
            log::info!(
                "{} {} duplicate(s) under {}",
                if selected { "Selected" } else { "Kept" },
                changed,
                path.display()
            );
        }
    }
    Ok(())
}

fn confirm_deletion(report: &ScanReport) -> Result<bool> {
    let mut stderr = io::stderr();
    write!(
        stderr,
        "Delete {} file(s), {}? [y/N] ",
        report.summary.selected_targets,
        report.summary.reclaimable_display()
    )?;
    stderr.flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "YES"))
}

fn write_report(report: &ScanReport, format: OutputFormat) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Text => TextOutput::new(report).write_to(&mut out)?,
        OutputFormat::Json => JsonOutput::new(report).write_to(&mut out, true)?,
        OutputFormat::Csv => CsvOutput::new(&report.matches).write_to(&mut out)?,
    }
    out.flush()?;
    Ok(())
}

fn show_stats(path: &Path) -> Result<ExitCode> {
    let index = Index::open(path)
        .with_context(|| format!("Failed to open index at {}", path.display()))?;
    let stats = index.statistics()?;
    println!("Index:            {}", path.display());
    println!("Archives:         {}", stats.archive_count);
    println!("Files:            {}", stats.file_count);
    println!("Nested archives:  {}", stats.nested_archive_count);
    Ok(ExitCode::Success)
}

fn clear_store(path: &Path) -> Result<ExitCode> {
    let index = Index::open(path)
        .with_context(|| format!("Failed to open index at {}", path.display()))?;
    index.clear()?;
    log::info!("Cleared index at {}", path.display());
    Ok(ExitCode::Success)
}

/// Remove the index file together with its SQLite side files.
fn remove_store(path: &Path) -> Result<()> {
    let mut files = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm"] {
        let mut name = path.as_os_str().to_os_string();
        name.push(suffix);
        files.push(name.into());
    }
    for file in files {
        match std::fs::remove_file(&file) {
            Ok(()) => log::debug!("Removed {}", file.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to remove {}", file.display()))
            }
        }
    }
    Ok(())
}
