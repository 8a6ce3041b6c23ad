//! Directory walker implementation using jwalk.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct used by both pipelines: the
//! source side walks for archive-like files, the target side for every file
//! above the minimum size. Children are sorted by name so scans are
//! deterministic.
//!
//! # Example
//!
//! ```no_run
//! use arcdupe::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/srv/archives"), WalkerConfig::archives());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;

use super::{FileEntry, FileFilter, ScanError, WalkerConfig};
use crate::archive::is_archive_name;

/// Directory walker for file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Build gitignore matcher from config patterns.
    fn build_gitignore(&self) -> Option<Gitignore> {
        if self.config.ignore_patterns.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new(&self.root);
        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if !gitignore.is_empty() => Some(gitignore),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    fn should_ignore(&self, path: &Path, gitignore: &Option<Gitignore>) -> bool {
        let Some(gi) = gitignore else {
            return false;
        };
        let relative_path = path.strip_prefix(&self.root).unwrap_or(path);
        gi.matched_path_or_any_parents(relative_path, false)
            .is_ignore()
    }

    fn passes_filter(&self, path: &Path, size: u64) -> bool {
        if let Some(min) = self.config.min_size {
            if size < min {
                return false;
            }
        }
        match self.config.filter {
            FileFilter::All => true,
            FileFilter::ArchivesOnly => path
                .file_name()
                .is_some_and(|name| is_archive_name(&name.to_string_lossy())),
        }
    }

    /// Walk the directory tree, yielding file entries.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration. A missing root yields a single `NotFound` error.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileEntry, ScanError>> + '_ {
        let gitignore = self.build_gitignore();

        let root_error = if !self.root.exists() {
            log::warn!("Directory does not exist: {}", self.root.display());
            Some(Err(ScanError::NotFound(self.root.clone())))
        } else if !self.root.is_dir() {
            Some(Err(ScanError::NotADirectory(self.root.clone())))
        } else {
            None
        };
        let walk_root = root_error.is_none();

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(self.config.skip_hidden)
            .process_read_dir(move |_depth, _path, _read_dir_state, children| {
                // Sort children for deterministic output
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        let entries = walk_dir
            .into_iter()
            .take_while(move |_| walk_root)
            .filter_map(move |entry_result| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    return None;
                }

                match entry_result {
                    Ok(entry) => {
                        let path = entry.path();
                        if path == self.root {
                            return None;
                        }

                        let file_type = entry.file_type();
                        if file_type.is_dir() {
                            return None;
                        }

                        if self.should_ignore(&path, &gitignore) {
                            log::trace!("Ignoring file: {}", path.display());
                            return None;
                        }

                        if file_type.is_symlink() && !self.config.follow_symlinks {
                            log::trace!("Skipping symlink: {}", path.display());
                            return None;
                        }

                        let metadata = if self.config.follow_symlinks {
                            std::fs::metadata(&path)
                        } else {
                            std::fs::symlink_metadata(&path)
                        };
                        match metadata {
                            Ok(m) if m.is_file() => self.process_file_entry(path, &m),
                            Ok(_) => None,
                            Err(e) => Some(self.handle_io_error(&path, e)),
                        }
                    }
                    Err(e) => {
                        let path = e
                            .path()
                            .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                        Some(self.handle_jwalk_error(path, e))
                    }
                }
            });

        root_error.into_iter().chain(entries)
    }

    fn process_file_entry(
        &self,
        path: PathBuf,
        metadata: &Metadata,
    ) -> Option<Result<FileEntry, ScanError>> {
        let size = metadata.len();
        if !self.passes_filter(&path, size) {
            log::trace!("Skipping file ({} bytes): {}", size, path.display());
            return None;
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Some(Ok(FileEntry::new(path, size, modified)))
    }

    fn handle_io_error(&self, path: &Path, error: std::io::Error) -> Result<FileEntry, ScanError> {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::PermissionDenied => {
                log::warn!("Permission denied: {}", path.display());
                Err(ScanError::PermissionDenied(path.to_path_buf()))
            }
            ErrorKind::NotFound => {
                log::debug!("File not found (may have been deleted): {}", path.display());
                Err(ScanError::NotFound(path.to_path_buf()))
            }
            _ => {
                log::warn!("I/O error for {}: {}", path.display(), error);
                Err(ScanError::Io {
                    path: path.to_path_buf(),
                    source: error,
                })
            }
        }
    }

    fn handle_jwalk_error(
        &self,
        path: PathBuf,
        error: jwalk::Error,
    ) -> Result<FileEntry, ScanError> {
        log::warn!("Walker error for {}: {}", path.display(), error);
        Err(ScanError::Io {
            path,
            source: std::io::Error::other(error.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("file1.txt"), b"Hello, world!\n").unwrap();
        fs::write(dir.path().join("bundle.zip"), b"PK\x03\x04not really").unwrap();
        let subdir = dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();
        fs::write(subdir.join("nested.txt"), b"Nested file content\n").unwrap();
        fs::write(subdir.join("release.tar.gz"), b"\x1f\x8b").unwrap();
        dir
    }

    #[test]
    fn test_walker_finds_files() {
        let dir = create_test_dir();
        let walker = Walker::new(dir.path(), WalkerConfig::default());

        let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
        assert_eq!(files.len(), 4);
        for file in &files {
            assert!(file.path.exists());
        }
    }

    #[test]
    fn test_walker_archives_only() {
        let dir = create_test_dir();
        let walker = Walker::new(dir.path(), WalkerConfig::archives());

        let mut names: Vec<String> = walker
            .walk()
            .filter_map(Result::ok)
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["bundle.zip", "release.tar.gz"]);
    }

    #[test]
    fn test_walker_min_size_filter() {
        let dir = create_test_dir();
        fs::write(dir.path().join("tiny.txt"), b"X").unwrap();

        let walker = Walker::new(dir.path(), WalkerConfig::targets(10));
        let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
        assert!(files.iter().all(|f| f.size >= 10));
        assert!(!files.iter().any(|f| f.path.ends_with("tiny.txt")));
    }

    #[test]
    fn test_walker_keeps_empty_files_without_min_size() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("empty.txt"), b"").unwrap();

        let walker = Walker::new(dir.path(), WalkerConfig::targets(0));
        let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].size, 0);
    }

    #[test]
    fn test_walker_ignore_patterns() {
        let dir = create_test_dir();
        let config = WalkerConfig::default().with_ignore_patterns(vec!["subdir/".to_string()]);
        let walker = Walker::new(dir.path(), config);

        let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| !f.path.to_string_lossy().contains("subdir")));
    }

    #[test]
    fn test_walker_shutdown_flag() {
        let dir = create_test_dir();
        let flag = Arc::new(AtomicBool::new(true));
        let walker = Walker::new(dir.path(), WalkerConfig::default()).with_shutdown_flag(flag);

        assert_eq!(walker.walk().filter_map(Result::ok).count(), 0);
    }

    #[test]
    fn test_walker_handles_nonexistent_path() {
        let walker = Walker::new(Path::new("/nonexistent/arcdupe/root"), WalkerConfig::default());
        let results: Vec<_> = walker.walk().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(ScanError::NotFound(_))));
    }
}
