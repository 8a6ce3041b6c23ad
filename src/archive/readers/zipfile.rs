use std::fs::File;
use std::io::BufReader;

use zip::ZipArchive;

use super::HandlerContext;
use crate::archive::{EntrySink, ExtractError};

/// Read a zip archive (including jar/war/ear and zip-based self-extractors).
pub(super) fn extract(ctx: &HandlerContext<'_>, sink: &mut EntrySink<'_, '_>) -> Result<(), ExtractError> {
    let file = File::open(ctx.path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("Skipping zip entry {} of {}: {}", i, ctx.path.display(), e);
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let size = entry.size();
        if sink.emit(&name, &mut entry, size)?.is_break() {
            break;
        }
    }
    Ok(())
}
