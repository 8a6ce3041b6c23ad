//! JSON report.
//!
//! ```json
//! {
//!   "archives": [
//!     {
//!       "archive": "/src/photos.zip",
//!       "matches": [
//!         {
//!           "path_in_archive": "2019/img_001.jpg",
//!           "target": "/home/me/Pictures/img_001.jpg",
//!           "size": 48213,
//!           "hash": "9c1e...",
//!           "selected": true
//!         }
//!       ]
//!     }
//!   ],
//!   "summary": { "archives": 1, "total_matches": 1, ... },
//!   "source": { ... },
//!   "target": { ... },
//!   "exit_code": 0,
//!   "exit_code_name": "AD000"
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use crate::actions::BatchDeleteResult;
use crate::duplicates::{DuplicateMatch, DuplicateSummary};
use crate::scanner::{SourceScanReport, TargetScanReport};
use crate::ScanReport;

#[derive(Debug, Clone, Serialize)]
pub struct JsonMatch {
    pub path_in_archive: String,
    pub target: String,
    pub size: u64,
    pub hash: String,
    pub selected: bool,
    pub nested_archive: bool,
}

impl JsonMatch {
    #[must_use]
    pub fn from_match(m: &DuplicateMatch) -> Self {
        Self {
            path_in_archive: m.source_file.path_in_archive.clone(),
            target: m.target_path.to_string_lossy().into_owned(),
            size: m.target_size,
            hash: m.match_hash.clone(),
            selected: m.selected_for_deletion,
            nested_archive: m.source_file.is_nested_archive,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonArchive {
    pub archive: String,
    pub matches: Vec<JsonMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    pub archives: Vec<JsonArchive>,
    pub summary: DuplicateSummary,
    pub source: SourceScanReport,
    pub target: TargetScanReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion: Option<BatchDeleteResult>,
    pub exit_code: i32,
    pub exit_code_name: String,
}

impl JsonOutput {
    #[must_use]
    pub fn new(report: &ScanReport) -> Self {
        Self {
            archives: report
                .matches
                .iter()
                .map(|(archive, matches)| JsonArchive {
                    archive: archive.clone(),
                    matches: matches.iter().map(JsonMatch::from_match).collect(),
                })
                .collect(),
            summary: report.summary.clone(),
            source: report.source.clone(),
            target: report.target.clone(),
            deletion: report.deletion.clone(),
            exit_code: report.exit_code.as_i32(),
            exit_code_name: report.exit_code.code_prefix().to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error while writing JSON: {0}")]
    Io(#[from] std::io::Error),
}
