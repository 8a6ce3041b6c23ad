//! Per-format entry readers, dispatched through [`HandlerKind::run`].

mod carving;
mod generic;
mod rar;
mod selfextract;
mod sevenz;
mod tarball;
mod zipfile;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use walkdir::WalkDir;

use super::capability::Capabilities;
use super::{EntrySink, ExtractError, HandlerKind};

/// Everything a handler needs to know about the file being walked.
pub(crate) struct HandlerContext<'a> {
    pub path: &'a Path,
    /// Logical name (the entry name for nested archives).
    pub name: &'a str,
    pub head: &'a [u8],
    pub capabilities: &'a Capabilities,
    /// The full plan this attempt belongs to.
    pub plan: &'a [HandlerKind],
}

impl HandlerKind {
    pub(crate) fn run(
        self,
        ctx: &HandlerContext<'_>,
        sink: &mut EntrySink<'_, '_>,
    ) -> Result<(), ExtractError> {
        match self {
            Self::Zip => zipfile::extract(ctx, sink),
            Self::SevenZip => sevenz::extract(ctx, sink),
            Self::Rar => rar::extract(ctx, sink),
            Self::Tar => tarball::extract(ctx, sink),
            Self::Generic => generic::extract(ctx, sink),
            Self::Executable => selfextract::extract(ctx, sink),
            Self::Carving => carving::extract(ctx, sink),
        }
    }
}

/// Emit every regular file under `root`, sorted, with paths relative to it.
pub(crate) fn emit_directory(root: &Path, sink: &mut EntrySink<'_, '_>) -> Result<(), ExtractError> {
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("Skipping unreadable extracted path: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let file = match File::open(entry.path()) {
            Ok(file) => file,
            Err(e) => {
                log::debug!("Cannot open extracted {}: {}", entry.path().display(), e);
                continue;
            }
        };
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);
        let mut reader = BufReader::new(file);
        if sink.emit(&name, &mut reader, size)?.is_break() {
            break;
        }
    }
    Ok(())
}
