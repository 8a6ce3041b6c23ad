//! Deleting duplicate target files.
//!
//! Files go to the system trash by default (recoverable) or are removed
//! permanently. A batch never stops at the first failure: every path ends up
//! either in [`BatchDeleteResult::successes`] or, with a reason, in
//! [`BatchDeleteResult::failures`].
//!
//! A dry run only checks that each file still exists.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How files are removed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Move to the system trash.
    #[default]
    Trash,
    /// Remove from disk.
    Permanent,
}

impl DeleteMode {
    #[must_use]
    pub fn is_permanent(self) -> bool {
        self == Self::Permanent
    }
}

impl std::fmt::Display for DeleteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trash => write!(f, "trash"),
            Self::Permanent => write!(f, "permanent"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("Moving {path} to trash failed: {message}")]
    TrashFailed { path: PathBuf, message: String },

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// One removed (or, in a dry run, removable) file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub path: PathBuf,
    pub size: u64,
}

/// Outcome of [`delete_files`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchDeleteResult {
    pub successes: Vec<DeleteResult>,
    /// Paths that could not be removed, with the reason.
    pub failures: Vec<(PathBuf, String)>,
    pub bytes_freed: u64,
    pub dry_run: bool,
}

impl BatchDeleteResult {
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failed paths that still exist and are worth another attempt.
    #[must_use]
    pub fn retry_set(&self) -> Vec<PathBuf> {
        self.failures
            .iter()
            .map(|(path, _)| path)
            .filter(|path| fs::symlink_metadata(path).is_ok())
            .cloned()
            .collect()
    }

    /// One-line summary for the report.
    #[must_use]
    pub fn summary(&self) -> String {
        let verb = if self.dry_run { "Would delete" } else { "Deleted" };
        let freed = bytesize::ByteSize::b(self.bytes_freed);
        if self.all_succeeded() {
            format!("{verb} {} file(s), {freed}", self.success_count())
        } else {
            format!(
                "{verb} {} file(s), {freed}; {} failed",
                self.success_count(),
                self.failure_count()
            )
        }
    }
}

/// Size of a regular file that is about to be removed.
fn target_size(path: &Path) -> Result<u64, DeleteError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| DeleteError::from_io(path, e))?;
    if !metadata.is_file() {
        return Err(DeleteError::NotAFile(path.to_path_buf()));
    }
    Ok(metadata.len())
}

/// Remove one file.
///
/// # Errors
///
/// Returns [`DeleteError`] if the file is missing or cannot be removed.
pub fn delete_file(path: &Path, mode: DeleteMode) -> Result<DeleteResult, DeleteError> {
    let size = target_size(path)?;
    match mode {
        DeleteMode::Trash => {
            trash::delete(path).map_err(|e| DeleteError::TrashFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            log::info!("Moved to trash: {}", path.display());
        }
        DeleteMode::Permanent => {
            fs::remove_file(path).map_err(|e| DeleteError::from_io(path, e))?;
            log::info!("Permanently deleted: {}", path.display());
        }
    }
    Ok(DeleteResult {
        path: path.to_path_buf(),
        size,
    })
}

/// Remove every path in `paths`, or with `dry_run` only check that they exist.
#[must_use]
pub fn delete_files(paths: &[PathBuf], mode: DeleteMode, dry_run: bool) -> BatchDeleteResult {
    let mut result = BatchDeleteResult {
        dry_run,
        ..BatchDeleteResult::default()
    };

    for path in paths {
        let outcome = if dry_run {
            target_size(path).map(|size| {
                log::info!("[DRY RUN] Would delete: {}", path.display());
                DeleteResult {
                    path: path.clone(),
                    size,
                }
            })
        } else {
            delete_file(path, mode)
        };

        match outcome {
            Ok(deleted) => {
                result.bytes_freed += deleted.size;
                result.successes.push(deleted);
            }
            Err(e) => {
                log::warn!("{}", e);
                result.failures.push((path.clone(), e.to_string()));
            }
        }
    }

    log::debug!("{}", result.summary());
    result
}
