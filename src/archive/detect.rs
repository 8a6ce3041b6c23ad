//! Archive recognition: file-name predicate, magic sniffing and handler planning.

use std::fmt;

use super::capability::Capabilities;

/// Number of leading bytes inspected when sniffing a container format.
pub const SNIFF_LEN: usize = 262;

/// Extensions (lowercase, with leading dot) treated as archive-like.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[
    ".zip", ".jar", ".war", ".ear", ".zipx", ".7z", ".rar", ".tar", ".tar.gz", ".tgz",
    ".tar.bz2", ".tbz2", ".tar.xz", ".txz", ".tar.zst", ".tzst", ".rpm", ".deb", ".msi",
    ".cab", ".ar", ".xar", ".pkg", ".exe", ".appimage", ".run", ".iso", ".img", ".dmg",
    ".vmdk", ".vdi", ".vhd", ".squashfs", ".cpio", ".wim", ".lzh", ".lha", ".lz",
];

const ZIP_EXTENSIONS: &[&str] = &[".zip", ".jar", ".war", ".ear", ".zipx"];
const TAR_EXTENSIONS: &[&str] = &[
    ".tar", ".tar.gz", ".tgz", ".tar.bz2", ".tbz2", ".tar.xz", ".txz", ".tar.zst", ".tzst",
];
const SELF_EXTRACT_EXTENSIONS: &[&str] = &[".appimage", ".run"];

/// Whether a file name looks like a supported archive (case-insensitive).
#[must_use]
pub fn is_archive_name(name: &str) -> bool {
    archive_extension(name).is_some()
}

/// The longest archive extension `name` ends with, if any.
#[must_use]
pub fn archive_extension(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    ARCHIVE_EXTENSIONS
        .iter()
        .copied()
        .filter(|ext| lower.ends_with(ext))
        .max_by_key(|ext| ext.len())
}

fn has_extension(lower: &str, set: &[&str]) -> bool {
    set.iter().any(|ext| lower.ends_with(ext))
}

/// Container signatures recognized at the start of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Magic {
    Zip,
    SevenZip,
    Rar,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
    Ustar,
    Ole,
    Pe,
    Elf,
    Cab,
    Ar,
    Rpm,
    Squashfs,
}

const SIGNATURES: &[(Magic, &[u8])] = &[
    (Magic::Zip, b"PK\x03\x04"),
    (Magic::Zip, b"PK\x05\x06"),
    (Magic::Zip, b"PK\x07\x08"),
    (Magic::SevenZip, b"7z\xBC\xAF\x27\x1C"),
    (Magic::Rar, b"Rar!\x1A\x07"),
    (Magic::Gzip, b"\x1F\x8B"),
    (Magic::Bzip2, b"BZh"),
    (Magic::Xz, b"\xFD7zXZ\x00"),
    (Magic::Zstd, b"\x28\xB5\x2F\xFD"),
    (Magic::Ole, b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1"),
    (Magic::Cab, b"MSCF"),
    (Magic::Ar, b"!<arch>\n"),
    (Magic::Rpm, b"\xED\xAB\xEE\xDB"),
    (Magic::Squashfs, b"hsqs"),
    (Magic::Squashfs, b"sqsh"),
    (Magic::Elf, b"\x7FELF"),
    (Magic::Pe, b"MZ"),
];

/// Identify the container format from the first bytes of a file.
#[must_use]
pub fn sniff(head: &[u8]) -> Option<Magic> {
    if let Some((magic, _)) = SIGNATURES.iter().find(|(_, sig)| head.starts_with(sig)) {
        return Some(*magic);
    }
    if head.len() >= 262 && &head[257..262] == b"ustar" {
        return Some(Magic::Ustar);
    }
    None
}

/// A way of pulling entries out of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    /// In-process zip reader (also self-extracting zips).
    Zip,
    /// In-process 7z reader.
    SevenZip,
    /// In-process rar reader.
    Rar,
    /// In-process tar reader with gzip/bzip2/xz/zstd decompression.
    Tar,
    /// External container tool (`7z` or `bsdtar`).
    Generic,
    /// Self-extracting executable (AppImage or makeself).
    Executable,
    /// Search the raw bytes for an embedded container.
    Carving,
}

impl HandlerKind {
    /// Short lowercase label for logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::SevenZip => "7z",
            Self::Rar => "rar",
            Self::Tar => "tar",
            Self::Generic => "generic",
            Self::Executable => "executable",
            Self::Carving => "carving",
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the ordered, de-duplicated list of handlers to try for one file.
///
/// Handlers implied by the magic bytes come first, then those implied by the
/// extension, then the external container tool (when available) and finally
/// carving.
#[must_use]
pub fn plan_handlers(name: &str, head: &[u8], caps: &Capabilities) -> Vec<HandlerKind> {
    let mut plan = Vec::new();
    let mut push = |kind: HandlerKind| {
        let available = match kind {
            HandlerKind::Generic => caps.container_tool.is_some(),
            HandlerKind::Executable => caps.allow_self_extract,
            _ => true,
        };
        if available && !plan.contains(&kind) {
            plan.push(kind);
        }
    };

    match sniff(head) {
        Some(Magic::Zip) => push(HandlerKind::Zip),
        Some(Magic::SevenZip) => push(HandlerKind::SevenZip),
        Some(Magic::Rar) => push(HandlerKind::Rar),
        Some(Magic::Gzip | Magic::Bzip2 | Magic::Xz | Magic::Zstd | Magic::Ustar) => {
            push(HandlerKind::Tar);
        }
        Some(Magic::Ole | Magic::Cab | Magic::Ar | Magic::Rpm | Magic::Squashfs) => {
            push(HandlerKind::Generic);
        }
        Some(Magic::Pe) => {
            push(HandlerKind::Zip);
            push(HandlerKind::Generic);
        }
        Some(Magic::Elf) => push(HandlerKind::Executable),
        None => {}
    }

    let lower = name.to_lowercase();
    if has_extension(&lower, ZIP_EXTENSIONS) {
        push(HandlerKind::Zip);
    } else if lower.ends_with(".7z") {
        push(HandlerKind::SevenZip);
    } else if lower.ends_with(".rar") {
        push(HandlerKind::Rar);
    } else if has_extension(&lower, TAR_EXTENSIONS) {
        push(HandlerKind::Tar);
    } else if lower.ends_with(".exe") {
        push(HandlerKind::Zip);
        push(HandlerKind::Generic);
    } else if has_extension(&lower, SELF_EXTRACT_EXTENSIONS) {
        push(HandlerKind::Executable);
    }

    push(HandlerKind::Generic);
    push(HandlerKind::Carving);
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn with_tool() -> Capabilities {
        Capabilities::builtin_only().with_container_tool(Some(
            super::super::capability::ContainerTool::seven_zip(PathBuf::from("/usr/bin/7z")),
        ))
    }

    #[test]
    fn test_is_archive_name() {
        assert!(is_archive_name("bundle.zip"));
        assert!(is_archive_name("BUNDLE.ZIP"));
        assert!(is_archive_name("release.tar.gz"));
        assert!(is_archive_name("tool.AppImage"));
        assert!(is_archive_name("lib.jar"));
        assert!(!is_archive_name("notes.txt"));
        assert!(!is_archive_name("zip"));
        assert!(!is_archive_name("archive.zip.txt"));
    }

    #[test]
    fn test_archive_extension_prefers_longest() {
        assert_eq!(archive_extension("a.tar.gz"), Some(".tar.gz"));
        assert_eq!(archive_extension("a.tar"), Some(".tar"));
        assert_eq!(archive_extension("a.txt"), None);
    }

    #[test]
    fn test_sniff_signatures() {
        assert_eq!(sniff(b"PK\x03\x04rest"), Some(Magic::Zip));
        assert_eq!(sniff(b"7z\xBC\xAF\x27\x1C\x00"), Some(Magic::SevenZip));
        assert_eq!(sniff(b"\x1F\x8B\x08"), Some(Magic::Gzip));
        assert_eq!(sniff(b"MZ\x90\x00"), Some(Magic::Pe));
        assert_eq!(sniff(b"plain text"), None);

        let mut tar_head = vec![0u8; 512];
        tar_head[257..262].copy_from_slice(b"ustar");
        assert_eq!(sniff(&tar_head[..SNIFF_LEN]), Some(Magic::Ustar));
    }

    #[test]
    fn test_plan_magic_before_extension() {
        // A zip renamed to .7z: magic wins, extension handler follows.
        let plan = plan_handlers("misnamed.7z", b"PK\x03\x04", &Capabilities::builtin_only());
        assert_eq!(
            plan,
            vec![HandlerKind::Zip, HandlerKind::SevenZip, HandlerKind::Carving]
        );
    }

    #[test]
    fn test_plan_is_deduplicated() {
        let plan = plan_handlers("bundle.zip", b"PK\x03\x04", &with_tool());
        assert_eq!(
            plan,
            vec![HandlerKind::Zip, HandlerKind::Generic, HandlerKind::Carving]
        );
    }

    #[test]
    fn test_plan_exe() {
        let plan = plan_handlers("setup.exe", b"MZ\x90\x00", &with_tool());
        assert_eq!(
            plan,
            vec![HandlerKind::Zip, HandlerKind::Generic, HandlerKind::Carving]
        );
    }

    #[test]
    fn test_plan_self_extract_respects_capabilities() {
        let caps = Capabilities::builtin_only();
        let plan = plan_handlers("tool.AppImage", b"\x7FELF", &caps);
        assert_eq!(plan, vec![HandlerKind::Carving]);

        let caps = Capabilities::builtin_only().with_self_extract(true);
        let plan = plan_handlers("tool.AppImage", b"\x7FELF", &caps);
        assert_eq!(plan, vec![HandlerKind::Executable, HandlerKind::Carving]);
    }

    #[test]
    fn test_plan_unknown_format_without_tool() {
        let plan = plan_handlers("disk.vmdk", b"KDMV", &Capabilities::builtin_only());
        assert_eq!(plan, vec![HandlerKind::Carving]);
    }
}
