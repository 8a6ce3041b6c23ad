//! Duplicate matches between target files and archive contents.
//!
//! This module provides:
//! - [`DuplicateMatch`], one target file paired with one archive entry
//! - Grouping of matches by source archive and selection bookkeeping

pub mod groups;

use std::path::PathBuf;

use serde::Serialize;

use crate::index::{FileRecord, Index, IndexResult};

/// A target file whose content also exists inside a source archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateMatch {
    /// The archive entry holding the same content.
    pub source_file: FileRecord,
    /// The duplicate on disk.
    pub target_path: PathBuf,
    pub target_size: u64,
    /// Full hash that confirmed the match; key of the stored selection.
    pub match_hash: String,
    /// Whether the target is slated for deletion.
    pub selected_for_deletion: bool,
}

impl DuplicateMatch {
    /// Change the selection and persist it in the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be written.
    pub fn set_selected(&mut self, index: &Index, selected: bool) -> IndexResult<()> {
        index.set_selection_state(&self.match_hash, &self.target_key(), selected)?;
        self.selected_for_deletion = selected;
        Ok(())
    }

    /// Target path in the string form used as an index key.
    #[must_use]
    pub fn target_key(&self) -> String {
        self.target_path.to_string_lossy().into_owned()
    }
}

pub use groups::{select_all, select_under, selected_targets, DuplicateSummary, MatchMap};
