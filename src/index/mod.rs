//! Persistent fingerprint index.
//!
//! The index maps content fingerprints to the archive entries they were
//! found in, remembers when each archive was last scanned, caches target
//! file fingerprints, and stores the keep/delete decision for each
//! duplicate.
//!
//! # Architecture
//!
//! * [`database`]: SQLite persistence, schema and queries.
//! * [`records`]: the row types and their freshness checks.
//!
//! # Invalidation
//!
//! An archive (or target file) is re-read when its modification time or size
//! differs from the stored values. Re-scanning an archive replaces all of
//! its records, so entries removed from the archive do not linger. Archives
//! that disappear from disk are dropped after the next complete source scan.
//!
//! The quick-hash settings are stored alongside the data. When they change,
//! every archive is marked for re-reading and the target fingerprint cache is
//! emptied.

pub mod database;
pub mod records;

pub use database::{Index, IndexError, IndexResult};
pub use records::{ArchiveRecord, FileRecord, HashParameters, IndexStats, TargetFileRecord};
