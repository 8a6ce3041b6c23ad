use std::io::Cursor;

use unrar::Archive;

use super::HandlerContext;
use crate::archive::{EntrySink, ExtractError};

fn rar_error(e: unrar::error::UnrarError) -> ExtractError {
    ExtractError::Rar(e.to_string())
}

/// Read a rar archive through the bundled unrar library.
///
/// unrar hands out whole entries, so each one is buffered in memory.
pub(super) fn extract(ctx: &HandlerContext<'_>, sink: &mut EntrySink<'_, '_>) -> Result<(), ExtractError> {
    let mut archive = Archive::new(ctx.path)
        .open_for_processing()
        .map_err(rar_error)?;

    while let Some(header) = archive.read_header().map_err(rar_error)? {
        let entry = header.entry();
        if !entry.is_file() {
            archive = header.skip().map_err(rar_error)?;
            continue;
        }
        let name = entry.filename.to_string_lossy().into_owned();
        let size = entry.unpacked_size;

        let (data, rest) = header.read().map_err(rar_error)?;
        archive = rest;
        if sink.emit(&name, &mut Cursor::new(data), size)?.is_break() {
            break;
        }
    }
    Ok(())
}
