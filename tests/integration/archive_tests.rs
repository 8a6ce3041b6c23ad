use std::fs;
use std::ops::ControlFlow;

use arcdupe::archive::{ArchiveWalker, Capabilities, HandlerKind};
use tempfile::TempDir;

use super::fixtures::{noise, tar_gz_bytes, walker, zip_bytes};

fn collect(walker: &ArchiveWalker, path: &std::path::Path) -> (Vec<String>, arcdupe::archive::WalkOutcome) {
    let mut names = Vec::new();
    let outcome = walker.walk(path, |entry| {
        names.push(entry.path.clone());
        ControlFlow::Continue(())
    });
    (names, outcome)
}

#[test]
fn test_carves_zip_after_stub() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("disk.img");
    let mut data = b"STUB".repeat(256);
    data.extend(zip_bytes(&[("payload.txt", b"payload")]));
    fs::write(&path, data).unwrap();

    let (names, outcome) = collect(&walker(), &path);

    assert_eq!(names, vec!["payload.txt".to_string()]);
    assert_eq!(outcome.handler, Some(HandlerKind::Carving));
}

#[test]
fn test_renamed_zip_found_by_magic() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("backup.rar");
    fs::write(&path, zip_bytes(&[("a.txt", b"a")])).unwrap();

    let (names, outcome) = collect(&walker(), &path);

    assert_eq!(names, vec!["a.txt".to_string()]);
    assert_eq!(outcome.handler, Some(HandlerKind::Zip));
}

#[test]
fn test_truncated_tar_gz_keeps_first_entries() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cut.tar.gz");
    let big = noise(256 * 1024, 7);
    let bytes = tar_gz_bytes(&[("first.txt", b"first"), ("second.bin", &big)]);
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let (names, outcome) = collect(&walker(), &path);

    // Committed to the tar handler after the first entry; no fallback runs.
    assert_eq!(names[0], "first.txt");
    assert_eq!(outcome.handler, Some(HandlerKind::Tar));
    assert!(!outcome.failures.is_empty());
    assert!(outcome
        .failures
        .iter()
        .all(|(kind, _)| *kind == HandlerKind::Tar));
}

#[test]
fn test_zip_inside_tar_gz() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mixed.tgz");
    let inner = zip_bytes(&[("doc.txt", b"doc")]);
    fs::write(&path, tar_gz_bytes(&[("pkg/inner.zip", &inner)])).unwrap();

    let (names, _) = collect(&walker(), &path);
    assert_eq!(
        names,
        vec!["pkg/inner.zip".to_string(), "pkg/inner.zip/doc.txt".to_string()]
    );
}

#[test]
fn test_plain_file_yields_nothing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.zip");
    fs::write(&path, b"just text, no archive here").unwrap();

    let (names, outcome) = collect(&walker(), &path);
    assert!(names.is_empty());
    assert!(outcome.is_empty());
    assert!(!outcome.failures.is_empty());
}

#[test]
fn test_scratch_root_is_left_clean() {
    let dir = TempDir::new().unwrap();
    let scratch = dir.path().join("scratch");
    fs::create_dir(&scratch).unwrap();
    let path = dir.path().join("outer.zip");
    let inner = zip_bytes(&[("x", b"x")]);
    fs::write(&path, zip_bytes(&[("inner.zip", &inner)])).unwrap();

    let walker = ArchiveWalker::new(Capabilities::builtin_only(), 3).with_scratch_root(scratch.clone());
    let (names, _) = collect(&walker, &path);

    assert_eq!(names.len(), 2);
    assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
}
