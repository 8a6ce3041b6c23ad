//! SQLite-backed fingerprint index.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::records::{ArchiveRecord, FileRecord, HashParameters, IndexStats, TargetFileRecord};
use crate::scanner::system_time_to_secs;

/// Errors from the persistent index. Any of them ends the run.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to create index directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

const META_PARTIAL_THRESHOLD: &str = "partial_hash_threshold";
const META_PARTIAL_SIZE: &str = "partial_hash_size";

const FILE_COLUMNS: &str =
    "full_hash, quick_hash, filename, path_in_archive, source_archive, size, is_nested_archive";

fn to_db_size(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_db_size(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        full_hash: row.get(0)?,
        quick_hash: row.get(1)?,
        filename: row.get(2)?,
        path_in_archive: row.get(3)?,
        source_archive: row.get(4)?,
        size: from_db_size(row.get(5)?),
        is_nested_archive: row.get(6)?,
    })
}

fn archive_from_row(row: &Row<'_>) -> rusqlite::Result<ArchiveRecord> {
    Ok(ArchiveRecord {
        path: row.get(0)?,
        mtime: row.get(1)?,
        size: from_db_size(row.get(2)?),
        last_scanned: row.get(3)?,
        file_count: row.get(4)?,
    })
}

/// Persistent store of archive contents, target fingerprints and selection
/// decisions.
///
/// Every mutating call commits before it returns.
pub struct Index {
    conn: Connection,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index").field("path", &self.path).finish()
    }
}

impl Index {
    /// Open (or create) the index at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if the directory or database cannot be created.
    pub fn open(path: &Path) -> IndexResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| IndexError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        let index = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        index.configure_pragmas()?;
        index.init_schema()?;
        log::debug!("Opened index at {}", path.display());
        Ok(index)
    }

    /// Open a private in-memory index.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if SQLite fails to initialize.
    pub fn open_in_memory() -> IndexResult<Self> {
        let index = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        index.init_schema()?;
        Ok(index)
    }

    /// Location on disk, `None` for in-memory indexes.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn configure_pragmas(&self) -> IndexResult<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    fn init_schema(&self) -> IndexResult<()> {
        self.conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    // ===== Archives =====

    /// Stored scan metadata for an archive.
    pub fn archive_info(&self, path: &str) -> IndexResult<Option<ArchiveRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT path, mtime, size, last_scanned, file_count FROM archives WHERE path = ?1",
                params![path],
                archive_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Insert or replace an archive's metadata, stamping `last_scanned` with now.
    pub fn update_archive(&self, path: &str, mtime: f64, size: u64, file_count: u32) -> IndexResult<()> {
        let now = system_time_to_secs(SystemTime::now());
        self.conn.execute(
            "INSERT OR REPLACE INTO archives (path, mtime, size, last_scanned, file_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![path, mtime, to_db_size(size), now, file_count],
        )?;
        Ok(())
    }

    /// Every archive known to the index, ordered by path.
    pub fn all_archives(&self) -> IndexResult<Vec<ArchiveRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, mtime, size, last_scanned, file_count FROM archives ORDER BY path",
        )?;
        let rows = stmt.query_map([], archive_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Paths of every archive with stored metadata or file records.
    pub fn known_archive_paths(&self) -> IndexResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT path FROM archives UNION SELECT source_archive FROM files ORDER BY 1",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Forget an archive: its metadata and all of its file records, in one
    /// transaction. Returns the number of file records removed.
    pub fn remove_archive(&self, path: &str) -> IndexResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = self.remove_archive_files(path)?;
        tx.execute("DELETE FROM archives WHERE path = ?1", params![path])?;
        tx.commit()?;
        Ok(removed)
    }

    // ===== Files =====

    /// Upsert file records keyed by `(source_archive, path_in_archive)` in
    /// one transaction. Returns the number of rows written.
    pub fn add_files(&self, records: &[FileRecord]) -> IndexResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let written = insert_files(&tx, records)?;
        tx.commit()?;
        Ok(written)
    }

    /// Drop every file record that belongs to `source_archive`.
    pub fn remove_archive_files(&self, source_archive: &str) -> IndexResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM files WHERE source_archive = ?1",
            params![source_archive],
        )?;
        Ok(removed)
    }

    /// Replace an archive's file records and metadata in one transaction.
    ///
    /// Records from an earlier scan that no longer exist in the archive are
    /// removed.
    pub fn replace_archive(
        &self,
        path: &str,
        mtime: f64,
        size: u64,
        records: &[FileRecord],
    ) -> IndexResult<()> {
        let now = system_time_to_secs(SystemTime::now());
        let file_count = u32::try_from(records.len()).unwrap_or(u32::MAX);

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM files WHERE source_archive = ?1", params![path])?;
        insert_files(&tx, records)?;
        tx.execute(
            "INSERT OR REPLACE INTO archives (path, mtime, size, last_scanned, file_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![path, mtime, to_db_size(size), now, file_count],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// All records stored for one archive, ordered by path inside it.
    pub fn files_by_archive(&self, source_archive: &str) -> IndexResult<Vec<FileRecord>> {
        self.query_files(
            &format!(
                "SELECT {FILE_COLUMNS} FROM files WHERE source_archive = ?1 ORDER BY path_in_archive"
            ),
            source_archive,
        )
    }

    /// Records whose full hash equals `hash`.
    pub fn find_by_full_hash(&self, hash: &str) -> IndexResult<Vec<FileRecord>> {
        self.query_files(
            &format!("SELECT {FILE_COLUMNS} FROM files WHERE full_hash = ?1 ORDER BY id"),
            hash,
        )
    }

    /// Records whose quick hash equals `hash`.
    pub fn find_by_quick_hash(&self, hash: &str) -> IndexResult<Vec<FileRecord>> {
        self.query_files(
            &format!("SELECT {FILE_COLUMNS} FROM files WHERE quick_hash = ?1 ORDER BY id"),
            hash,
        )
    }

    /// Whether any record carries this quick hash.
    pub fn quick_hash_exists(&self, hash: &str) -> IndexResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM files WHERE quick_hash = ?1 LIMIT 1",
                params![hash],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Store a full hash computed later for an existing record.
    ///
    /// Returns `false` when no such record exists.
    pub fn upgrade_hash(
        &self,
        source_archive: &str,
        path_in_archive: &str,
        full_hash: &str,
    ) -> IndexResult<bool> {
        let updated = self.conn.execute(
            "UPDATE files SET full_hash = ?1 WHERE source_archive = ?2 AND path_in_archive = ?3",
            params![full_hash, source_archive, path_in_archive],
        )?;
        Ok(updated > 0)
    }

    fn query_files(&self, sql: &str, key: &str) -> IndexResult<Vec<FileRecord>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![key], file_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ===== Target files =====

    /// Cached fingerprints for a target file.
    pub fn target_file_info(&self, path: &str) -> IndexResult<Option<TargetFileRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT path, mtime, size, full_hash, quick_hash FROM target_files WHERE path = ?1",
                params![path],
                |row| {
                    Ok(TargetFileRecord {
                        path: row.get(0)?,
                        mtime: row.get(1)?,
                        size: from_db_size(row.get(2)?),
                        full_hash: row.get(3)?,
                        quick_hash: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Insert or replace the cached fingerprints of a target file.
    pub fn update_target_file(&self, record: &TargetFileRecord) -> IndexResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO target_files (path, mtime, size, full_hash, quick_hash)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.path,
                record.mtime,
                to_db_size(record.size),
                record.full_hash,
                record.quick_hash
            ],
        )?;
        Ok(())
    }

    // ===== Selection state =====

    /// The stored keep/delete decision for a duplicate, if any.
    pub fn selection_state(&self, file_hash: &str, target_path: &str) -> IndexResult<Option<bool>> {
        let selected = self
            .conn
            .query_row(
                "SELECT selected FROM selection_state WHERE file_hash = ?1 AND target_path = ?2",
                params![file_hash, target_path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(selected)
    }

    /// Persist a keep/delete decision.
    pub fn set_selection_state(
        &self,
        file_hash: &str,
        target_path: &str,
        selected: bool,
    ) -> IndexResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO selection_state (file_hash, target_path, selected)
             VALUES (?1, ?2, ?3)",
            params![file_hash, target_path, selected],
        )?;
        Ok(())
    }

    // ===== Hash parameters =====

    /// The quick-hash settings stored with the index, if recorded.
    pub fn hash_parameters(&self) -> IndexResult<Option<HashParameters>> {
        let threshold = self.meta_u64(META_PARTIAL_THRESHOLD)?;
        let size = self.meta_u64(META_PARTIAL_SIZE)?;
        Ok(match (threshold, size) {
            (Some(partial_hash_threshold), Some(partial_hash_size)) => Some(HashParameters {
                partial_hash_threshold,
                partial_hash_size,
            }),
            _ => None,
        })
    }

    /// Record the quick-hash settings of this run.
    ///
    /// When stored data was fingerprinted under other (or unrecorded)
    /// settings, every archive is marked for re-reading and the target
    /// fingerprint cache is emptied. Returns `true` in that case.
    pub fn sync_hash_parameters(&self, current: HashParameters) -> IndexResult<bool> {
        let stored = self.hash_parameters()?;
        if stored == Some(current) {
            return Ok(false);
        }

        let tx = self.conn.unchecked_transaction()?;
        let has_data: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM archives) OR EXISTS (SELECT 1 FROM target_files)",
            [],
            |row| row.get(0),
        )?;
        if has_data {
            tx.execute("UPDATE archives SET last_scanned = NULL", [])?;
            tx.execute("DELETE FROM target_files", [])?;
        }
        let mut stmt =
            tx.prepare_cached("INSERT OR REPLACE INTO index_meta (key, value) VALUES (?1, ?2)")?;
        stmt.execute(params![
            META_PARTIAL_THRESHOLD,
            current.partial_hash_threshold.to_string()
        ])?;
        stmt.execute(params![META_PARTIAL_SIZE, current.partial_hash_size.to_string()])?;
        drop(stmt);
        tx.commit()?;

        if has_data {
            log::debug!(
                "Hash parameters changed from {:?} to {:?}; stored fingerprints invalidated",
                stored,
                current
            );
        }
        Ok(has_data)
    }

    fn meta_u64(&self, key: &str) -> IndexResult<Option<u64>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.and_then(|v| v.parse().ok()))
    }

    // ===== Maintenance =====

    /// Row counts for archives, files and nested archives.
    pub fn statistics(&self) -> IndexResult<IndexStats> {
        let count = |sql: &str| -> IndexResult<u64> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(from_db_size(n))
        };
        Ok(IndexStats {
            archive_count: count("SELECT COUNT(*) FROM archives")?,
            file_count: count("SELECT COUNT(*) FROM files")?,
            nested_archive_count: count("SELECT COUNT(*) FROM files WHERE is_nested_archive = 1")?,
        })
    }

    /// Delete every row; the schema stays in place.
    pub fn clear(&self) -> IndexResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(
            "DELETE FROM files;
             DELETE FROM archives;
             DELETE FROM target_files;
             DELETE FROM selection_state;
             DELETE FROM index_meta;",
        )?;
        tx.commit()?;
        log::debug!("Index cleared");
        Ok(())
    }
}

fn insert_files(conn: &Connection, records: &[FileRecord]) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare_cached(&format!(
        "INSERT OR REPLACE INTO files ({FILE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
    ))?;
    for record in records {
        stmt.execute(params![
            record.full_hash,
            record.quick_hash,
            record.filename,
            record.path_in_archive,
            record.source_archive,
            to_db_size(record.size),
            record.is_nested_archive,
        ])?;
    }
    Ok(records.len())
}
