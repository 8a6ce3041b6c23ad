use std::fs::File;
use std::io::{BufReader, Read};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use xz2::read::XzDecoder;

use super::HandlerContext;
use crate::archive::detect::{sniff, Magic};
use crate::archive::{EntrySink, ExtractError};

/// Open `file` behind the decompressor its magic bytes call for.
fn decoder(file: File, head: &[u8]) -> Result<Box<dyn Read>, ExtractError> {
    let reader = BufReader::new(file);
    Ok(match sniff(head) {
        Some(Magic::Gzip) => Box::new(GzDecoder::new(reader)),
        Some(Magic::Bzip2) => Box::new(BzDecoder::new(reader)),
        Some(Magic::Xz) => Box::new(XzDecoder::new(reader)),
        Some(Magic::Zstd) => Box::new(zstd::stream::read::Decoder::with_buffer(reader)?),
        _ => Box::new(reader),
    })
}

/// Read a tar archive, optionally gzip/bzip2/xz/zstd compressed.
pub(super) fn extract(ctx: &HandlerContext<'_>, sink: &mut EntrySink<'_, '_>) -> Result<(), ExtractError> {
    let file = File::open(ctx.path)?;
    let mut archive = tar::Archive::new(decoder(file, ctx.head)?);

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path()?.to_string_lossy().into_owned();
        let size = entry.size();
        if sink.emit(&name, &mut entry, size)?.is_break() {
            break;
        }
    }
    Ok(())
}
