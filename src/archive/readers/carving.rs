//! Locate containers embedded in larger binaries.
//!
//! Installers and AppImages often carry a payload after an executable stub.
//! The first [`CARVE_WINDOW`] bytes are searched for known signatures at a
//! non-zero offset. Signatures are tried in the order of [`CARVE_SIGNATURES`];
//! for each one, successive occurrences are tried until a copy starting at
//! the match produces entries.

use std::fs::File;

use memmap2::Mmap;

use super::HandlerContext;
use crate::archive::{archive_extension, EntrySink, ExtractError, HandlerKind};

/// How much of the file is searched for signatures.
pub(crate) const CARVE_WINDOW: usize = 16 * 1024 * 1024;

/// Upper bound on candidate offsets tried per file.
const MAX_ATTEMPTS: usize = 8;

/// Name prefix of carved copies. A carved copy is never carved again.
const CARVED_PREFIX: &str = "carved.";

/// Signature, and the name given to the carved copy so the nested walk
/// picks a matching handler.
const CARVE_SIGNATURES: &[(&[u8], &str)] = &[
    (b"hsqs", "carved.squashfs"),
    (b"sqsh", "carved.squashfs"),
    (b"qshs", "carved.squashfs"),
    (b"shsq", "carved.squashfs"),
    (b"PK\x03\x04", "carved.zip"),
    (b"7z\xBC\xAF\x27\x1C", "carved.7z"),
    (b"Rar!\x1A\x07", "carved.rar"),
    (b"\xFD7zXZ\x00", "carved.tar.xz"),
    (b"\x1F\x8B\x08", "carved.tar.gz"),
    (b"BZh", "carved.tar.bz2"),
    (b"\x28\xB5\x2F\xFD", "carved.tar.zst"),
    (b"MSCF\x00\x00\x00\x00", "carved.cab"),
];

/// Offsets of the ISO 9660 primary volume descriptor identifier.
const ISO_OFFSETS: &[usize] = &[0x8001, 0x8801, 0x9001];
const ISO_MAGIC: &[u8] = b"CD001";

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

/// Candidate `(offset, name)` pairs in the order they are tried.
pub(crate) fn candidates(window: &[u8]) -> Vec<(usize, &'static str)> {
    let mut found = Vec::new();
    for (magic, name) in CARVE_SIGNATURES {
        let mut from = 1;
        while let Some(offset) = find(window, magic, from) {
            found.push((offset, *name));
            if found.len() >= MAX_ATTEMPTS {
                return found;
            }
            from = offset + 1;
        }
    }
    found
}

pub(crate) fn is_iso(window: &[u8]) -> bool {
    ISO_OFFSETS
        .iter()
        .any(|&off| window.get(off..off + ISO_MAGIC.len()) == Some(ISO_MAGIC))
}

pub(super) fn extract(ctx: &HandlerContext<'_>, sink: &mut EntrySink<'_, '_>) -> Result<(), ExtractError> {
    if ctx.name.starts_with(CARVED_PREFIX) {
        return Ok(());
    }
    let mut file = File::open(ctx.path)?;
    if file.metadata()?.len() == 0 {
        return Ok(());
    }
    // SAFETY: read-only mapping that does not outlive this function. Another
    // process truncating the file meanwhile is the usual mmap caveat.
    let map = unsafe { Mmap::map(&file)? };
    let window = &map[..map.len().min(CARVE_WINDOW)];

    for (offset, name) in candidates(window) {
        log::debug!("Trying {} at offset {} in {}", name, offset, ctx.path.display());
        let suffix = archive_extension(name).unwrap_or_default();
        let (carved, _) = sink.arena().spill_from(&mut file, offset as u64, suffix)?;
        let flow = sink.descend(carved.path(), name);
        if sink.emitted() > 0 || flow.is_break() {
            return Ok(());
        }
    }

    // An ISO image (AppImage type 1) is the whole file; only the container
    // tool can read it, so run it here unless the plan already did.
    if is_iso(window) && !ctx.plan.contains(&HandlerKind::Generic) {
        if ctx.capabilities.container_tool.is_some() {
            return HandlerKind::Generic.run(ctx, sink);
        }
        return Err(ExtractError::Unsupported("ISO 9660 image needs a container tool".into()));
    }
    Ok(())
}
