//! Rows stored in the index.

use serde::{Deserialize, Serialize};

/// Two modification times closer than this are treated as equal.
const MTIME_TOLERANCE: f64 = 1e-6;

fn same_mtime(a: f64, b: f64) -> bool {
    (a - b).abs() < MTIME_TOLERANCE
}

/// A file found inside a source archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Hash over the whole content.
    pub full_hash: Option<String>,
    /// Hash over the leading bytes; set for files at or above the threshold.
    pub quick_hash: Option<String>,
    /// Base name of the entry.
    pub filename: String,
    /// Path inside the archive, `/`-separated, including nested archive names.
    pub path_in_archive: String,
    /// Absolute path of the top-level archive on disk.
    pub source_archive: String,
    pub size: u64,
    pub is_nested_archive: bool,
}

impl FileRecord {
    /// Build a record; the file name is derived from `path_in_archive`.
    #[must_use]
    pub fn new(
        source_archive: impl Into<String>,
        path_in_archive: impl Into<String>,
        size: u64,
        full_hash: Option<String>,
        quick_hash: Option<String>,
    ) -> Self {
        let path_in_archive = path_in_archive.into();
        let filename = path_in_archive
            .rsplit('/')
            .next()
            .unwrap_or(&path_in_archive)
            .to_string();
        Self {
            full_hash,
            quick_hash,
            filename,
            path_in_archive,
            source_archive: source_archive.into(),
            size,
            is_nested_archive: false,
        }
    }

    /// Mark the record as describing a nested archive.
    #[must_use]
    pub fn with_nested_archive(mut self, nested: bool) -> Self {
        self.is_nested_archive = nested;
        self
    }

    /// Display form `archive::path`.
    #[must_use]
    pub fn location(&self) -> String {
        format!("{}::{}", self.source_archive, self.path_in_archive)
    }
}

/// Scan bookkeeping for one archive on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub path: String,
    /// Modification time in seconds since the Unix epoch.
    pub mtime: f64,
    pub size: u64,
    /// When the archive was last scanned (seconds since the Unix epoch).
    pub last_scanned: Option<f64>,
    pub file_count: u32,
}

impl ArchiveRecord {
    /// True when the archive was never scanned or changed since.
    #[must_use]
    pub fn needs_rescan(&self, mtime: f64, size: u64) -> bool {
        self.last_scanned.is_none() || !same_mtime(self.mtime, mtime) || self.size != size
    }
}

/// Cached fingerprints of a target file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetFileRecord {
    pub path: String,
    pub mtime: f64,
    pub size: u64,
    pub full_hash: Option<String>,
    pub quick_hash: Option<String>,
}

impl TargetFileRecord {
    /// True when the stored fingerprints still describe a file with this
    /// modification time and size.
    #[must_use]
    pub fn is_fresh(&self, mtime: f64, size: u64) -> bool {
        same_mtime(self.mtime, mtime) && self.size == size
    }
}

/// Quick-hash settings the stored fingerprints were computed with.
///
/// Quick hashes taken under different settings are not comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashParameters {
    pub partial_hash_threshold: u64,
    pub partial_hash_size: u64,
}

/// Row counts reported by [`super::Index::statistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub archive_count: u64,
    pub file_count: u64,
    pub nested_archive_count: u64,
}
