//! Matching target files against the index.
//!
//! # Overview
//!
//! [`TargetMatcher`] walks the target directories and fingerprints every file
//! at or above the minimum size. Small files carry a full hash and are looked
//! up directly. Large files carry only a quick hash; their full hash is
//! computed only when the quick hash is present in the index, and the match
//! is then confirmed by full hash.
//!
//! Fingerprints are computed in parallel with rayon. All index access stays
//! on the calling thread.
//!
//! With `recheck_targets` set, fingerprints cached in the index are reused
//! for files whose modification time and size did not change. The cache is
//! emptied whenever the quick-hash settings differ from the stored ones.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use super::{FileEntry, HashError, Hasher, Walker, WalkerConfig};
use crate::duplicates::{DuplicateMatch, MatchMap};
use crate::index::{FileRecord, Index, IndexResult, TargetFileRecord};
use crate::progress::{ProgressCallback, ScanPhase, ScanProgress};

/// Counters for one target scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetScanReport {
    /// Files found at or above the minimum size.
    pub files_found: usize,
    /// Files fingerprinted from disk.
    pub files_hashed: usize,
    /// Files whose cached fingerprints were reused.
    pub cache_hits: usize,
    /// Files that could not be read.
    pub files_failed: usize,
    /// Full hashes computed to confirm a quick-hash hit.
    pub full_hashes_computed: usize,
    /// Total (archive entry, target) matches.
    pub matches: usize,
    /// Whether the scan stopped on a shutdown request.
    pub interrupted: bool,
}

/// Result of a target scan.
#[derive(Debug, Clone, Default)]
pub struct TargetScan {
    /// Matches grouped by source archive.
    pub matches: MatchMap,
    pub report: TargetScanReport,
}

/// A target file together with its fingerprints.
struct Fingerprinted {
    entry: FileEntry,
    /// Absolute path.
    path: PathBuf,
    key: String,
    full_hash: Option<String>,
    quick_hash: Option<String>,
    cached: bool,
}

/// Finds target files whose content is already stored in a source archive.
pub struct TargetMatcher<'a> {
    index: &'a Index,
    hasher: Hasher,
    min_file_size: u64,
    recheck_targets: bool,
    auto_select: bool,
    ignore_patterns: Vec<String>,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for TargetMatcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetMatcher")
            .field("hasher", &self.hasher)
            .field("min_file_size", &self.min_file_size)
            .field("recheck_targets", &self.recheck_targets)
            .field("auto_select", &self.auto_select)
            .field("ignore_patterns", &self.ignore_patterns)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish_non_exhaustive()
    }
}

impl<'a> TargetMatcher<'a> {
    /// Create a matcher reading from `index`.
    #[must_use]
    pub fn new(index: &'a Index, hasher: Hasher) -> Self {
        Self {
            index,
            hasher,
            min_file_size: 0,
            recheck_targets: false,
            auto_select: false,
            ignore_patterns: Vec::new(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Ignore target files smaller than `size` bytes.
    #[must_use]
    pub fn with_min_file_size(mut self, size: u64) -> Self {
        self.min_file_size = size;
        self
    }

    /// Reuse cached fingerprints of unchanged target files.
    #[must_use]
    pub fn with_recheck_targets(mut self, recheck: bool) -> Self {
        self.recheck_targets = recheck;
        self
    }

    /// Selection used for duplicates without a stored decision.
    #[must_use]
    pub fn with_auto_select(mut self, auto_select: bool) -> Self {
        self.auto_select = auto_select;
        self
    }

    /// Gitignore-style patterns excluded from the walk.
    #[must_use]
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Set the shutdown flag, shared with the hasher.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
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

    fn find_targets(&self, target_dirs: &[PathBuf]) -> Vec<FileEntry> {
        let mut files = Vec::new();
        for dir in target_dirs {
            let config = WalkerConfig::targets(self.min_file_size)
                .with_ignore_patterns(self.ignore_patterns.clone());
            let mut walker = Walker::new(dir, config);
            if let Some(ref flag) = self.shutdown_flag {
                walker = walker.with_shutdown_flag(Arc::clone(flag));
            }
            files.extend(walker.walk().filter_map(Result::ok));
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files.dedup_by(|a, b| a.path == b.path);
        files
    }

    /// Scan `target_dirs` and return the duplicates grouped by source archive.
    ///
    /// # Errors
    ///
    /// Returns an error only when the index cannot be read or written.
    pub fn scan(&self, target_dirs: &[PathBuf]) -> IndexResult<TargetScan> {
        if self.index.sync_hash_parameters(self.hasher.parameters())? {
            log::warn!("Quick-hash settings changed; cached target fingerprints dropped");
        }
        let files = self.find_targets(target_dirs);
        log::info!("Found {} target files", files.len());

        let mut scan = TargetScan::default();
        scan.report.files_found = files.len();
        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(ScanPhase::TargetScan, files.len());
        }

        // Split into cached fingerprints and files that need hashing.
        let mut ready = Vec::with_capacity(files.len());
        let mut pending = Vec::new();
        for entry in files {
            let path = std::path::absolute(&entry.path).unwrap_or_else(|_| entry.path.clone());
            let key = path.to_string_lossy().into_owned();
            let cached = if self.recheck_targets {
                self.index
                    .target_file_info(&key)?
                    .filter(|record| record.is_fresh(entry.mtime(), entry.size))
            } else {
                None
            };
            match cached {
                Some(record) => ready.push(Fingerprinted {
                    entry,
                    path,
                    key,
                    full_hash: record.full_hash,
                    quick_hash: record.quick_hash,
                    cached: true,
                }),
                None => pending.push((entry, path, key)),
            }
        }
        scan.report.cache_hits = ready.len();

        // The index connection stays on this thread; workers only see the
        // hasher and the progress sink.
        let hasher = &self.hasher;
        let shutdown_flag = self.shutdown_flag.as_deref();
        let progress_callback = self.progress_callback.as_deref();
        let processed = AtomicUsize::new(ready.len());
        let total = scan.report.files_found;
        let hashed: Vec<_> = pending
            .into_par_iter()
            .filter_map(|(entry, path, key)| {
                if shutdown_flag.is_some_and(|f| f.load(Ordering::SeqCst)) {
                    return None;
                }
                let result = hasher.fingerprint_file(&path, entry.size);
                let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(callback) = progress_callback {
                    let mut progress = ScanProgress::new(ScanPhase::TargetScan);
                    progress.current_file = Some(key.clone());
                    progress.files_processed = done;
                    progress.total_files = total;
                    callback.on_progress(&progress);
                }
                Some((entry, path, key, result))
            })
            .collect();

        for (entry, path, key, result) in hashed {
            match result {
                Ok((full_hash, quick_hash)) => {
                    scan.report.files_hashed += 1;
                    ready.push(Fingerprinted {
                        entry,
                        path,
                        key,
                        full_hash,
                        quick_hash,
                        cached: false,
                    });
                }
                Err(HashError::Interrupted) => scan.report.interrupted = true,
                Err(e) => {
                    log::warn!("Skipping {}: {}", path.display(), e);
                    scan.report.files_failed += 1;
                }
            }
        }
        if self.is_shutdown_requested() {
            scan.report.interrupted = true;
        }

        ready.sort_by(|a, b| a.path.cmp(&b.path));
        for mut file in ready {
            if self.is_shutdown_requested() {
                scan.report.interrupted = true;
                break;
            }
            let had_full_hash = file.full_hash.is_some();
            let (confirmed, records) = self.lookup(&mut file, &mut scan.report)?;
            if !file.cached || had_full_hash != file.full_hash.is_some() {
                self.index.update_target_file(&TargetFileRecord {
                    path: file.key.clone(),
                    mtime: file.entry.mtime(),
                    size: file.entry.size,
                    full_hash: file.full_hash.clone(),
                    quick_hash: file.quick_hash.clone(),
                })?;
            }
            let Some(hash) = confirmed else { continue };
            for source_file in records {
                let selected = self
                    .index
                    .selection_state(&hash, &file.key)?
                    .unwrap_or(self.auto_select);
                scan.matches
                    .entry(source_file.source_archive.clone())
                    .or_default()
                    .push(DuplicateMatch {
                        source_file,
                        target_path: file.path.clone(),
                        target_size: file.entry.size,
                        match_hash: hash.clone(),
                        selected_for_deletion: selected,
                    });
                scan.report.matches += 1;
            }
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end(ScanPhase::TargetScan);
        }
        log::info!(
            "Target scan: {} files, {} matches in {} archives",
            scan.report.files_found,
            scan.report.matches,
            scan.matches.len()
        );
        Ok(scan)
    }

    /// Look up the archive entries with the same content as `file`.
    ///
    /// Returns the confirming full hash and the matching records. A large
    /// file gets its full hash computed here when its quick hash is known to
    /// the index.
    fn lookup(
        &self,
        file: &mut Fingerprinted,
        report: &mut TargetScanReport,
    ) -> IndexResult<(Option<String>, Vec<FileRecord>)> {
        if file.full_hash.is_none() {
            let Some(ref quick) = file.quick_hash else {
                return Ok((None, Vec::new()));
            };
            if !self.index.quick_hash_exists(quick)? {
                return Ok((None, Vec::new()));
            }
            log::debug!("Quick hash hit for {}, computing full hash", file.key);
            file.full_hash = self.hasher.full_hash_only(&file.path);
            if file.full_hash.is_some() {
                report.full_hashes_computed += 1;
            }
        }
        let Some(hash) = file.full_hash.clone() else {
            return Ok((None, Vec::new()));
        };
        let records = self.index.find_by_full_hash(&hash)?;
        if records.is_empty() {
            return Ok((None, records));
        }
        Ok((Some(hash), records))
    }
}
