use std::ops::ControlFlow;

use sevenz_rust::{Password, SevenZReader};

use super::HandlerContext;
use crate::archive::{EntrySink, ExtractError};

/// Read a 7z archive with the in-process decoder.
pub(super) fn extract(ctx: &HandlerContext<'_>, sink: &mut EntrySink<'_, '_>) -> Result<(), ExtractError> {
    let mut archive = SevenZReader::open(ctx.path, Password::empty())
        .map_err(|e| ExtractError::SevenZip(e.to_string()))?;

    // The decoder drives the loop, so sink errors are parked here and the
    // iteration is stopped.
    let mut failure = None;
    archive
        .for_each_entries(|entry, reader| {
            if entry.is_directory() {
                return Ok(true);
            }
            match sink.emit(entry.name(), reader, entry.size()) {
                Ok(ControlFlow::Continue(())) => Ok(true),
                Ok(ControlFlow::Break(())) => Ok(false),
                Err(e) => {
                    failure = Some(e);
                    Ok(false)
                }
            }
        })
        .map_err(|e| ExtractError::SevenZip(e.to_string()))?;

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
