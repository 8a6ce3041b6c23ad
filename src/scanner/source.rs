//! Source catalog construction.
//!
//! # Overview
//!
//! [`SourceCatalogBuilder`] finds every archive-like file under the source
//! directories, walks each one with the [`ArchiveWalker`], fingerprints every
//! entry in the same pass and stores the results in the [`Index`].
//!
//! With `recheck_archives` set, archives whose modification time and size
//! match the stored record are reused as-is. A re-scanned archive has all its
//! previous records replaced in one transaction. Archives the index still
//! knows about but that no longer exist on disk are dropped at the end of a
//! complete scan, and a change of quick-hash settings forces every stored
//! archive to be read again.
//!
//! Problems with individual archives or entries are logged and counted in
//! the [`SourceScanReport`]; only index failures abort the scan.

use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use super::{FileEntry, HashError, Hasher, Walker, WalkerConfig};
use crate::archive::ArchiveWalker;
use crate::index::{ArchiveRecord, FileRecord, Index, IndexResult};
use crate::progress::{ProgressCallback, ScanPhase, ScanProgress};

/// Counters for one source scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceScanReport {
    /// Archive-like files discovered.
    pub archives_found: usize,
    /// Archives walked and (re)indexed.
    pub archives_scanned: usize,
    /// Archives reused because they did not change.
    pub archives_skipped: usize,
    /// Archives that produced no entries because every handler failed.
    pub archives_failed: usize,
    /// Archives dropped from the index because they vanished from disk.
    pub archives_removed: usize,
    /// File records written.
    pub files_indexed: usize,
    /// Entries that could not be hashed.
    pub entries_failed: usize,
    /// Whether stored fingerprints were invalidated by new quick-hash settings.
    pub hash_settings_changed: bool,
    /// Whether the scan stopped on a shutdown request.
    pub interrupted: bool,
}

/// Result of a source scan.
#[derive(Debug, Clone, Default)]
pub struct SourceScan {
    /// Stored metadata of every archive seen, keyed by absolute path.
    pub archives: HashMap<PathBuf, ArchiveRecord>,
    pub report: SourceScanReport,
}

/// Builds the index from source archives.
pub struct SourceCatalogBuilder<'a> {
    index: &'a Index,
    walker: ArchiveWalker,
    hasher: Hasher,
    min_file_size: u64,
    recheck_archives: bool,
    ignore_patterns: Vec<String>,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for SourceCatalogBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCatalogBuilder")
            .field("walker", &self.walker)
            .field("hasher", &self.hasher)
            .field("min_file_size", &self.min_file_size)
            .field("recheck_archives", &self.recheck_archives)
            .field("ignore_patterns", &self.ignore_patterns)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish_non_exhaustive()
    }
}

impl<'a> SourceCatalogBuilder<'a> {
    /// Create a builder writing into `index`.
    #[must_use]
    pub fn new(index: &'a Index, walker: ArchiveWalker, hasher: Hasher) -> Self {
        Self {
            index,
            walker,
            hasher,
            min_file_size: 0,
            recheck_archives: false,
            ignore_patterns: Vec::new(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Skip entries smaller than `size` bytes.
    #[must_use]
    pub fn with_min_file_size(mut self, size: u64) -> Self {
        self.min_file_size = size;
        self
    }

    /// Reuse stored records of archives that have not changed.
    #[must_use]
    pub fn with_recheck_archives(mut self, recheck: bool) -> Self {
        self.recheck_archives = recheck;
        self
    }

    /// Gitignore-style patterns excluded from archive discovery.
    #[must_use]
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Set the shutdown flag, shared with the archive walker and hasher.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.walker = self.walker.with_shutdown_flag(Arc::clone(&flag));
        self.hasher = self.hasher.with_shutdown_flag(Arc::clone(&flag));
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn report_progress(&self, progress: &ScanProgress) {
        if let Some(ref callback) = self.progress_callback {
            callback.on_progress(progress);
        }
    }

    /// Find all archive-like files under `source_dirs`, sorted by path.
    fn find_archives(&self, source_dirs: &[PathBuf]) -> Vec<FileEntry> {
        let mut archives = Vec::new();
        for dir in source_dirs {
            let config = WalkerConfig::archives().with_ignore_patterns(self.ignore_patterns.clone());
            let mut walker = Walker::new(dir, config);
            if let Some(ref flag) = self.shutdown_flag {
                walker = walker.with_shutdown_flag(Arc::clone(flag));
            }
            // Walker errors are logged where they happen.
            archives.extend(walker.walk().filter_map(Result::ok));
        }
        archives.sort_by(|a, b| a.path.cmp(&b.path));
        archives.dedup_by(|a, b| a.path == b.path);
        archives
    }

    /// Scan `source_dirs` and bring the index up to date.
    ///
    /// # Errors
    ///
    /// Returns an error only when the index cannot be read or written.
    pub fn scan(&self, source_dirs: &[PathBuf]) -> IndexResult<SourceScan> {
        let mut scan = SourceScan::default();
        if self.index.sync_hash_parameters(self.hasher.parameters())? {
            log::warn!("Quick-hash settings changed; every archive will be read again");
            scan.report.hash_settings_changed = true;
        }

        let archives = self.find_archives(source_dirs);
        log::info!("Found {} archives in source directories", archives.len());

        scan.report.archives_found = archives.len();

        let mut progress = ScanProgress::new(ScanPhase::SourceScan);
        progress.total_archives = archives.len();
        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(ScanPhase::SourceScan, archives.len());
        }

        for archive in &archives {
            if self.is_shutdown_requested() {
                log::info!("Source scan interrupted by shutdown signal");
                scan.report.interrupted = true;
                break;
            }

            let path = absolute(&archive.path);
            let key = path.to_string_lossy().into_owned();
            progress.current_archive = Some(key.clone());
            progress.current_file = None;
            self.report_progress(&progress);

            match self.scan_archive(&key, archive, &mut progress, &mut scan.report)? {
                Some(record) => {
                    scan.archives.insert(path, record);
                }
                None if scan.report.interrupted => break,
                None => {}
            }

            progress.archives_processed += 1;
            self.report_progress(&progress);
        }
        // Discovery may have stopped early without any archive left to visit.
        scan.report.interrupted |= self.is_shutdown_requested();
        if !scan.report.interrupted {
            let discovered: HashSet<String> = archives
                .iter()
                .map(|a| absolute(&a.path).to_string_lossy().into_owned())
                .collect();
            scan.report.archives_removed = self.prune_vanished(&discovered)?;
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end(ScanPhase::SourceScan);
        }
        log::info!(
            "Source scan: {} scanned, {} unchanged, {} failed, {} removed, {} files indexed",
            scan.report.archives_scanned,
            scan.report.archives_skipped,
            scan.report.archives_failed,
            scan.report.archives_removed,
            scan.report.files_indexed
        );
        Ok(scan)
    }

    /// Drop stored archives that were not discovered and no longer exist.
    fn prune_vanished(&self, discovered: &HashSet<String>) -> IndexResult<usize> {
        let mut removed = 0;
        for path in self.index.known_archive_paths()? {
            if discovered.contains(&path) || Path::new(&path).symlink_metadata().is_ok() {
                continue;
            }
            let files = self.index.remove_archive(&path)?;
            log::info!("Removed vanished archive {} ({} files)", path, files);
            removed += 1;
        }
        Ok(removed)
    }

    /// Index one archive. Returns its stored record, or `None` when it failed
    /// or the scan was interrupted.
    fn scan_archive(
        &self,
        key: &str,
        archive: &FileEntry,
        progress: &mut ScanProgress,
        report: &mut SourceScanReport,
    ) -> IndexResult<Option<ArchiveRecord>> {
        let mtime = archive.mtime();

        if self.recheck_archives {
            if let Some(stored) = self.index.archive_info(key)? {
                if !stored.needs_rescan(mtime, archive.size) {
                    log::debug!("Skipping unchanged archive: {}", key);
                    report.archives_skipped += 1;
                    return Ok(Some(stored));
                }
            }
        }

        log::debug!("Scanning archive: {}", key);
        let mut records = Vec::new();
        let mut entries_failed = 0;
        let mut interrupted = false;

        let outcome = self.walker.walk(&archive.path, |entry| {
            if entry.size < self.min_file_size {
                return ControlFlow::Continue(());
            }
            progress.current_file = Some(entry.path.clone());
            match self.hasher.fingerprint_stream(entry.reader, entry.size) {
                Ok((full_hash, quick_hash)) => {
                    records.push(
                        FileRecord::new(key, entry.path.as_str(), entry.size, full_hash, quick_hash)
                            .with_nested_archive(entry.is_nested_archive),
                    );
                }
                Err(HashError::Interrupted) => {
                    interrupted = true;
                    return ControlFlow::Break(());
                }
                Err(e) => {
                    log::warn!("Failed to hash {}::{}: {}", key, entry.path, e);
                    entries_failed += 1;
                }
            }
            progress.files_processed += 1;
            self.report_progress(progress);
            ControlFlow::Continue(())
        });

        report.entries_failed += entries_failed;
        if interrupted || (outcome.stopped && self.is_shutdown_requested()) {
            // Leave the previous records of this archive untouched.
            report.interrupted = true;
            return Ok(None);
        }
        if outcome.is_empty() && !outcome.failures.is_empty() {
            log::warn!("Could not read archive {}", key);
            for (handler, reason) in &outcome.failures {
                log::debug!("  {}: {}", handler, reason);
            }
            report.archives_failed += 1;
            return Ok(None);
        }

        self.index
            .replace_archive(key, mtime, archive.size, &records)?;
        report.archives_scanned += 1;
        report.files_indexed += records.len();
        log::debug!("Indexed {} files from {}", records.len(), key);

        self.index.archive_info(key)
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
