//! Human-readable report.

use std::io::{self, Write};

use bytesize::ByteSize;
use yansi::Paint;

use crate::ScanReport;

/// Plain-text report grouped by source archive.
pub struct TextOutput<'a> {
    report: &'a ScanReport,
}

impl<'a> TextOutput<'a> {
    #[must_use]
    pub fn new(report: &'a ScanReport) -> Self {
        Self { report }
    }

    /// Write the report.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let report = self.report;

        for (archive, matches) in &report.matches {
            writeln!(w, "{}", archive.bold())?;
            for m in matches {
                let marker = if m.selected_for_deletion {
                    "[x]".red().to_string()
                } else {
                    "[ ]".dim().to_string()
                };
                writeln!(
                    w,
                    "  {marker} {} ({})",
                    m.target_path.display(),
                    ByteSize::b(m.target_size)
                )?;
                writeln!(w, "        = {}", m.source_file.path_in_archive.dim())?;
            }
        }

        let source = &report.source;
        let target = &report.target;
        let summary = &report.summary;
        if !report.matches.is_empty() {
            writeln!(w)?;
        }
        writeln!(
            w,
            "Archives: {} found, {} scanned, {} unchanged, {} unreadable",
            source.archives_found,
            source.archives_scanned,
            source.archives_skipped,
            source.archives_failed
        )?;
        if source.archives_removed > 0 {
            writeln!(
                w,
                "          {} vanished archive(s) removed from the index",
                source.archives_removed
            )?;
        }
        writeln!(
            w,
            "Targets:  {} files, {} hashed, {} cached, {} unreadable",
            target.files_found, target.files_hashed, target.cache_hits, target.files_failed
        )?;
        writeln!(
            w,
            "Found {} duplicate file(s) in {} archive(s); {} selected, {} reclaimable",
            summary.duplicate_targets.bold(),
            summary.archives,
            summary.selected_targets,
            summary.reclaimable_display().green()
        )?;
        if let Some(ref deletion) = report.deletion {
            writeln!(w, "{}", deletion.summary())?;
            for (path, reason) in &deletion.failures {
                writeln!(w, "  {} {}: {}", "failed".red(), path.display(), reason)?;
            }
        }
        if source.interrupted || target.interrupted {
            writeln!(w, "{}", "Scan interrupted; results are incomplete".yellow())?;
        }
        Ok(())
    }

    /// Render into a string.
    #[must_use]
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        // Writing into a Vec does not fail.
        let _ = self.write_to(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
