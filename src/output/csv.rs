//! CSV report, one row per match.
//!
//! Columns: `archive`, `path_in_archive`, `target`, `size`, `hash`,
//! `selected`, `target_modified` (RFC 3339, or `unknown`).

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::duplicates::MatchMap;

#[derive(Debug, Error)]
pub enum CsvOutputError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    archive: &'a str,
    path_in_archive: &'a str,
    target: String,
    size: u64,
    hash: &'a str,
    selected: bool,
    target_modified: String,
}

pub struct CsvOutput<'a> {
    matches: &'a MatchMap,
}

impl<'a> CsvOutput<'a> {
    #[must_use]
    pub fn new(matches: &'a MatchMap) -> Self {
        Self { matches }
    }

    /// Write the header and all rows.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for (archive, matches) in self.matches {
            for m in matches {
                csv_writer.serialize(CsvRow {
                    archive,
                    path_in_archive: &m.source_file.path_in_archive,
                    target: m.target_path.to_string_lossy().into_owned(),
                    size: m.target_size,
                    hash: &m.match_hash,
                    selected: m.selected_for_deletion,
                    target_modified: modified_time(&m.target_path),
                })?;
            }
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Render into a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn modified_time(path: &Path) -> String {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|m| DateTime::<Utc>::from(m).to_rfc3339())
        .unwrap_or_else(|_| "unknown".to_string())
}
