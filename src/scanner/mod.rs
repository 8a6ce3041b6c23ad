//! Scanner module: directory traversal, hashing and the two scan pipelines.
//!
//! This module provides functionality for:
//! - Sorted directory walking using jwalk
//! - Two-tier xxHash3 fingerprinting
//! - Building the source catalog from archives
//! - Matching target files against that catalog
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: Quick/full hashing (streaming)
//! - [`source`]: Archive discovery, extraction and indexing
//! - [`target`]: Target file hashing and duplicate matching
//!
//! # Example
//!
//! ```no_run
//! use arcdupe::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     min_size: Some(1024),
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(Path::new("."), config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod source;
pub mod target;
pub mod walker;

use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub use hasher::{hash_to_hex, Fingerprint, Hasher};
pub use source::{SourceCatalogBuilder, SourceScan, SourceScanReport};
pub use target::{TargetMatcher, TargetScan, TargetScanReport};
pub use walker::Walker;

/// Metadata for a file discovered on disk.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
}

impl FileEntry {
    /// Create a new FileEntry.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
        }
    }

    /// Modification time as fractional seconds since the Unix epoch.
    #[must_use]
    pub fn mtime(&self) -> f64 {
        system_time_to_secs(self.modified)
    }
}

/// Convert a `SystemTime` to fractional seconds since the Unix epoch.
///
/// Times before the epoch are reported as `0.0`.
#[must_use]
pub fn system_time_to_secs(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Which files a directory walk reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileFilter {
    /// Every regular file.
    #[default]
    All,
    /// Only files whose name looks like a supported archive.
    ArchivesOnly,
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Minimum file size to include (in bytes).
    pub min_size: Option<u64>,

    /// Glob patterns to ignore (gitignore-style).
    pub ignore_patterns: Vec<String>,

    /// Restrict the walk to archive-like file names.
    pub filter: FileFilter,
}

impl WalkerConfig {
    /// Configuration used to discover source archives.
    #[must_use]
    pub fn archives() -> Self {
        Self {
            filter: FileFilter::ArchivesOnly,
            ..Self::default()
        }
    }

    /// Configuration used to enumerate target files.
    #[must_use]
    pub fn targets(min_size: u64) -> Self {
        Self {
            min_size: Some(min_size),
            ..Self::default()
        }
    }

    /// Add gitignore-style exclusion patterns.
    #[must_use]
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Hashing stopped because shutdown was requested.
    #[error("Hashing interrupted")]
    Interrupted,

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Reading an archive entry stream failed.
    #[error("Stream read error: {0}")]
    Stream(#[source] io::Error),
}

impl HashError {
    /// Classify an I/O error raised while hashing `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            io::ErrorKind::Interrupted => Self::Interrupted,
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Classify an I/O error raised while hashing an archive entry stream.
    #[must_use]
    pub fn from_stream(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::Interrupted {
            Self::Interrupted
        } else {
            Self::Stream(error)
        }
    }
}
