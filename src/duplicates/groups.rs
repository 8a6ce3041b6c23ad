//! Grouping and summarizing duplicate matches.
//!
//! Matches are grouped by the source archive that holds the original copy.
//! One target file can match several archive entries (the same content
//! stored twice), so per-target figures are de-duplicated by path.
//!
//! # Example
//!
//! ```
//! use arcdupe::duplicates::{DuplicateSummary, MatchMap};
//!
//! let matches = MatchMap::new();
//! let summary = DuplicateSummary::from_matches(&matches);
//! assert_eq!(summary.total_matches, 0);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::DuplicateMatch;
use crate::index::{Index, IndexResult};

/// Matches keyed by source archive path.
pub type MatchMap = BTreeMap<String, Vec<DuplicateMatch>>;

/// Totals over a [`MatchMap`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateSummary {
    /// Archives with at least one match.
    pub archives: usize,
    /// Number of (archive entry, target) pairs.
    pub total_matches: usize,
    /// Distinct target files with a match.
    pub duplicate_targets: usize,
    /// Distinct target files selected for deletion.
    pub selected_targets: usize,
    /// Bytes freed by deleting every selected target.
    pub reclaimable_bytes: u64,
}

impl DuplicateSummary {
    /// Summarize a match map.
    #[must_use]
    pub fn from_matches(matches: &MatchMap) -> Self {
        let mut targets = BTreeSet::new();
        let mut selected = BTreeMap::new();
        let mut total_matches = 0;

        for m in matches.values().flatten() {
            total_matches += 1;
            targets.insert(&m.target_path);
            if m.selected_for_deletion {
                selected.insert(&m.target_path, m.target_size);
            }
        }

        Self {
            archives: matches.values().filter(|v| !v.is_empty()).count(),
            total_matches,
            duplicate_targets: targets.len(),
            selected_targets: selected.len(),
            reclaimable_bytes: selected.values().sum(),
        }
    }

    /// Human readable reclaimable size.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        bytesize::ByteSize::b(self.reclaimable_bytes).to_string()
    }
}

/// Distinct target paths selected for deletion, sorted.
#[must_use]
pub fn selected_targets(matches: &MatchMap) -> Vec<PathBuf> {
    matches
        .values()
        .flatten()
        .filter(|m| m.selected_for_deletion)
        .map(|m| m.target_path.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Set the selection of every match and persist it.
///
/// # Errors
///
/// Returns an error if the index cannot be written.
pub fn select_all(matches: &mut MatchMap, index: &Index, selected: bool) -> IndexResult<()> {
    for m in matches.values_mut().flatten() {
        m.set_selected(index, selected)?;
    }
    Ok(())
}

/// Set and persist the selection of every match whose target is `root` or
/// lies under it. Returns the number of matches changed.
///
/// # Errors
///
/// Returns an error if the index cannot be written.
pub fn select_under(
    matches: &mut MatchMap,
    index: &Index,
    root: &Path,
    selected: bool,
) -> IndexResult<usize> {
    let mut changed = 0;
    for m in matches
        .values_mut()
        .flatten()
        .filter(|m| m.target_path.starts_with(root))
    {
        m.set_selected(index, selected)?;
        changed += 1;
    }
    Ok(changed)
}
