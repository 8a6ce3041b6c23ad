//! Two-tier xxHash3 fingerprinting.
//!
//! # Overview
//!
//! Small files are hashed end to end. Files at or above the partial-hash
//! threshold only get a *quick hash* over their first bytes; the full hash is
//! paid for later, and only when a quick-hash hit makes a duplicate plausible.
//!
//! Streams coming out of an archive can only be read once, so for those the
//! quick and full hash are computed side by side in a single pass.
//!
//! # Example
//!
//! ```no_run
//! use arcdupe::scanner::Hasher;
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let (full, quick) = hasher.fingerprint_file(Path::new("movie.mkv"), 4_000_000_000).unwrap();
//! assert!(full.is_none());
//! assert!(quick.is_some());
//! ```

use std::fs::File;
use std::hash::Hasher as _;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::index::HashParameters;

use twox_hash::xxh3::Hash64;

use super::HashError;

/// Default size at which files switch to the quick-hash path (1 MiB).
pub const DEFAULT_PARTIAL_HASH_THRESHOLD: u64 = 1_048_576;

/// Default number of leading bytes covered by the quick hash (8 KiB).
pub const DEFAULT_PARTIAL_HASH_SIZE: u64 = 8192;

/// Read buffer size for streaming hashes (64 KiB).
pub const CHUNK_SIZE: usize = 65536;

/// Pair of optional fingerprints: `(full_hash, quick_hash)`.
pub type Fingerprint = (Option<String>, Option<String>);

/// Encode a 64-bit digest as a fixed-width lowercase hex string.
#[must_use]
pub fn hash_to_hex(hash: u64) -> String {
    format!("{hash:016x}")
}

/// Streaming xxHash3-64 hasher with the partial-hash optimization.
#[derive(Debug, Clone)]
pub struct Hasher {
    partial_hash_threshold: u64,
    partial_hash_size: u64,
    chunk_size: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default threshold (1 MiB) and quick-hash size (8 KiB).
    #[must_use]
    pub fn new() -> Self {
        Self {
            partial_hash_threshold: DEFAULT_PARTIAL_HASH_THRESHOLD,
            partial_hash_size: DEFAULT_PARTIAL_HASH_SIZE,
            chunk_size: CHUNK_SIZE,
            shutdown_flag: None,
        }
    }

    /// Set the size at which files are treated as "large".
    #[must_use]
    pub fn with_partial_hash_threshold(mut self, threshold: u64) -> Self {
        self.partial_hash_threshold = threshold;
        self
    }

    /// Set how many leading bytes the quick hash covers.
    #[must_use]
    pub fn with_partial_hash_size(mut self, size: u64) -> Self {
        self.partial_hash_size = size.max(1);
        self
    }

    /// Set the shutdown flag; long reads stop with `HashError::Interrupted`.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Size at which files take the quick-hash path.
    #[must_use]
    pub fn partial_hash_threshold(&self) -> u64 {
        self.partial_hash_threshold
    }

    /// Number of bytes covered by the quick hash.
    #[must_use]
    pub fn partial_hash_size(&self) -> u64 {
        self.partial_hash_size
    }

    /// The settings that make quick hashes comparable, as stored in the index.
    #[must_use]
    pub fn parameters(&self) -> HashParameters {
        HashParameters {
            partial_hash_threshold: self.partial_hash_threshold,
            partial_hash_size: self.partial_hash_size,
        }
    }

    /// Whether a file of `size` bytes is hashed with the quick-hash path.
    #[must_use]
    pub fn is_large(&self, size: u64) -> bool {
        size >= self.partial_hash_threshold
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Fingerprint a file on disk whose size is already known.
    ///
    /// Returns `(Some(full), None)` below the threshold and `(None, Some(quick))`
    /// at or above it.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn fingerprint_file(&self, path: &Path, size: u64) -> Result<Fingerprint, HashError> {
        let mut file = open(path)?;
        if self.is_large(size) {
            let quick = self
                .hash_prefix(&mut file)
                .map_err(|e| HashError::from_io(path, e))?;
            Ok((None, Some(quick)))
        } else {
            let full = self
                .hash_reader(&mut file)
                .map_err(|e| HashError::from_io(path, e))?;
            Ok((Some(full), None))
        }
    }

    /// Fingerprint a stream that can only be read once.
    ///
    /// `reported_size` is the length announced by the archive. At or above the
    /// threshold the stream is consumed once while feeding both the quick and
    /// the full hasher, and both fingerprints are returned.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Stream`] if reading the stream fails.
    pub fn fingerprint_stream<R: Read + ?Sized>(
        &self,
        reader: &mut R,
        reported_size: u64,
    ) -> Result<Fingerprint, HashError> {
        if self.is_large(reported_size) {
            let (full, quick) = self.hash_dual(reader).map_err(HashError::from_stream)?;
            Ok((Some(full), Some(quick)))
        } else {
            let full = self.hash_reader(reader).map_err(HashError::from_stream)?;
            Ok((Some(full), None))
        }
    }

    /// Compute the full hash of a file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn full_hash(&self, path: &Path) -> Result<String, HashError> {
        let mut file = open(path)?;
        self.hash_reader(&mut file)
            .map_err(|e| HashError::from_io(path, e))
    }

    /// Compute the full hash for a file that so far only had a quick hash.
    ///
    /// Failures are logged and reported as `None`; callers treat that as
    /// "could not verify".
    #[must_use]
    pub fn full_hash_only(&self, path: &Path) -> Option<String> {
        match self.full_hash(path) {
            Ok(hash) => Some(hash),
            Err(e) => {
                log::error!("Failed to compute full hash for {}: {}", path.display(), e);
                None
            }
        }
    }

    fn hash_reader<R: Read + ?Sized>(&self, reader: &mut R) -> io::Result<String> {
        let mut hasher = Hash64::with_seed(0);
        let mut buffer = vec![0u8; self.chunk_size];
        loop {
            if self.is_shutdown_requested() {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "hashing interrupted"));
            }
            let n = read_some(reader, &mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.write(&buffer[..n]);
        }
        Ok(hash_to_hex(hasher.finish()))
    }

    fn hash_prefix<R: Read + ?Sized>(&self, reader: &mut R) -> io::Result<String> {
        let mut hasher = Hash64::with_seed(0);
        let mut limited = (&mut *reader).take(self.partial_hash_size);
        let mut buffer = vec![0u8; self.chunk_size];
        loop {
            let n = read_some(&mut limited, &mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.write(&buffer[..n]);
        }
        Ok(hash_to_hex(hasher.finish()))
    }

    /// Single pass producing `(full, quick)`.
    fn hash_dual<R: Read + ?Sized>(&self, reader: &mut R) -> io::Result<(String, String)> {
        let mut full = Hash64::with_seed(0);
        let mut quick = Hash64::with_seed(0);
        let mut buffer = vec![0u8; self.chunk_size];
        let mut bytes_read: u64 = 0;
        loop {
            if self.is_shutdown_requested() {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "hashing interrupted"));
            }
            let n = read_some(reader, &mut buffer)?;
            if n == 0 {
                break;
            }
            full.write(&buffer[..n]);
            if bytes_read < self.partial_hash_size {
                let remaining = (self.partial_hash_size - bytes_read).min(n as u64) as usize;
                quick.write(&buffer[..remaining]);
            }
            bytes_read += n as u64;
        }
        Ok((hash_to_hex(full.finish()), hash_to_hex(quick.finish())))
    }
}

fn open(path: &Path) -> Result<File, HashError> {
    File::open(path).map_err(|e| HashError::from_io(path, e))
}

/// `read` that retries on `Interrupted` from the OS.
fn read_some<R: Read + ?Sized>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buffer) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}
