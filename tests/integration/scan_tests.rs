use std::fs;

use arcdupe::archive::{ArchiveWalker, Capabilities};
use arcdupe::index::Index;
use arcdupe::scanner::{Hasher, SourceCatalogBuilder, TargetMatcher};

use super::fixtures::{
    noise, scan_sources, scan_targets, tar_gz_bytes, walker, write_zip, zip_bytes, Corpus,
};

#[test]
fn test_match_in_flat_zip() {
    let corpus = Corpus::new();
    write_zip(&corpus.source_file("a.zip"), &[("x.txt", b"hello")]);
    corpus.write_target("y.txt", b"hello");
    corpus.write_target("z.txt", b"something else");

    let index = Index::open_in_memory().unwrap();
    let hasher = Hasher::new();
    scan_sources(&index, &corpus, &hasher);
    let scan = scan_targets(&index, &corpus, &hasher);

    assert_eq!(scan.report.matches, 1);
    let (archive, matches) = scan.matches.iter().next().unwrap();
    assert!(archive.ends_with("a.zip"));
    assert_eq!(matches[0].source_file.filename, "x.txt");
    assert!(matches[0].target_path.ends_with("y.txt"));
}

#[test]
fn test_match_in_nested_zip() {
    let corpus = Corpus::new();
    let inner = zip_bytes(&[("deep.txt", b"d")]);
    write_zip(&corpus.source_file("outer.zip"), &[("inner.zip", &inner)]);
    corpus.write_target("deep.txt", b"d");

    let index = Index::open_in_memory().unwrap();
    let hasher = Hasher::new();
    let source = scan_sources(&index, &corpus, &hasher);
    assert_eq!(source.report.files_indexed, 2);

    let scan = scan_targets(&index, &corpus, &hasher);
    let matches: Vec<_> = scan.matches.values().flatten().collect();
    assert_eq!(matches.len(), 1);
    assert!(matches[0]
        .source_file
        .path_in_archive
        .contains("inner.zip/deep.txt"));
}

#[test]
fn test_nested_archive_recorded_as_nested() {
    let corpus = Corpus::new();
    let inner = zip_bytes(&[("deep.txt", b"d")]);
    let outer = corpus.source_file("outer.zip");
    write_zip(&outer, &[("inner.zip", &inner)]);

    let index = Index::open_in_memory().unwrap();
    scan_sources(&index, &corpus, &Hasher::new());

    let key = std::path::absolute(&outer).unwrap();
    let records = index.files_by_archive(&key.to_string_lossy()).unwrap();
    let nested = records
        .iter()
        .find(|r| r.path_in_archive == "inner.zip")
        .unwrap();
    assert!(nested.is_nested_archive);
    assert_eq!(index.statistics().unwrap().nested_archive_count, 1);
}

#[test]
fn test_depth_zero_does_not_open_nested() {
    let corpus = Corpus::new();
    let inner = zip_bytes(&[("deep.txt", b"d")]);
    let outer = corpus.source_file("outer.zip");
    write_zip(&outer, &[("inner.zip", &inner)]);

    let index = Index::open_in_memory().unwrap();
    let scan = SourceCatalogBuilder::new(
        &index,
        ArchiveWalker::new(Capabilities::builtin_only(), 0),
        Hasher::new(),
    )
    .scan(&[corpus.source()])
    .unwrap();

    assert_eq!(scan.report.files_indexed, 1);
    let key = std::path::absolute(&outer).unwrap();
    let records = index.files_by_archive(&key.to_string_lossy()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path_in_archive, "inner.zip");
}

#[test]
fn test_corrupt_zip_does_not_abort_scan() {
    let corpus = Corpus::new();
    fs::write(corpus.source_file("broken.zip"), b"PK\x03\x04 this is not a zip").unwrap();
    corpus.write_target("t.txt", b"anything");

    let index = Index::open_in_memory().unwrap();
    let hasher = Hasher::new();
    let source = scan_sources(&index, &corpus, &hasher);

    assert_eq!(source.report.archives_found, 1);
    assert_eq!(source.report.files_indexed, 0);
    assert!(source.archives.values().all(|record| record.file_count == 0));
    assert_eq!(index.statistics().unwrap().file_count, 0);

    let targets = scan_targets(&index, &corpus, &hasher);
    assert!(targets.matches.is_empty());
}

#[test]
fn test_large_files_matched_through_quick_hash() {
    const MIB: usize = 1024 * 1024;
    let corpus = Corpus::new();
    let same = noise(2 * MIB, 1);
    let different = noise(2 * MIB, 2);
    write_zip(&corpus.source_file("big.zip"), &[("same.bin", &same)]);
    corpus.write_target("same.bin", &same);
    corpus.write_target("different.bin", &different);

    let index = Index::open_in_memory().unwrap();
    let hasher = Hasher::new().with_partial_hash_threshold(MIB as u64);
    scan_sources(&index, &corpus, &hasher);

    let quick_same = hasher
        .fingerprint_file(&corpus.target().join("same.bin"), same.len() as u64)
        .unwrap()
        .1
        .unwrap();
    let quick_different = hasher
        .fingerprint_file(&corpus.target().join("different.bin"), different.len() as u64)
        .unwrap()
        .1
        .unwrap();
    assert_ne!(quick_same, quick_different);
    assert_eq!(index.find_by_quick_hash(&quick_same).unwrap().len(), 1);

    let scan = scan_targets(&index, &corpus, &hasher);
    assert_eq!(scan.report.full_hashes_computed, 1);
    assert_eq!(scan.report.matches, 1);
    let matched = scan.matches.values().flatten().next().unwrap();
    assert!(matched.target_path.ends_with("same.bin"));
}

#[test]
fn test_deselection_survives_rescan() {
    let corpus = Corpus::new();
    write_zip(&corpus.source_file("a.zip"), &[("x.txt", b"hello")]);
    corpus.write_target("y.txt", b"hello");

    let index = Index::open_in_memory().unwrap();
    let hasher = Hasher::new();
    scan_sources(&index, &corpus, &hasher);

    let first = scan_targets(&index, &corpus, &hasher);
    let m = first.matches.values().flatten().next().unwrap();
    assert!(m.selected_for_deletion);
    index
        .set_selection_state(&m.match_hash, &m.target_key(), false)
        .unwrap();

    let second = scan_targets(&index, &corpus, &hasher);
    let m = second.matches.values().flatten().next().unwrap();
    assert!(!m.selected_for_deletion);
}

#[test]
fn test_tar_gz_source() {
    let corpus = Corpus::new();
    fs::write(
        corpus.source_file("bundle.tar.gz"),
        tar_gz_bytes(&[("docs/readme.md", b"# readme"), ("bin/tool", b"\x7fELF")]),
    )
    .unwrap();
    corpus.write_target("readme.md", b"# readme");

    let index = Index::open_in_memory().unwrap();
    let hasher = Hasher::new();
    let source = scan_sources(&index, &corpus, &hasher);
    assert_eq!(source.report.files_indexed, 2);

    let scan = scan_targets(&index, &corpus, &hasher);
    let m = scan.matches.values().flatten().next().unwrap();
    assert_eq!(m.source_file.path_in_archive, "docs/readme.md");
}

#[test]
fn test_multiple_source_directories() {
    let corpus = Corpus::new();
    let extra = corpus.dir.path().join("extra");
    fs::create_dir(&extra).unwrap();
    write_zip(&corpus.source_file("a.zip"), &[("a.txt", b"a")]);
    write_zip(&extra.join("b.zip"), &[("b.txt", b"b")]);

    let index = Index::open_in_memory().unwrap();
    let scan = SourceCatalogBuilder::new(&index, walker(), Hasher::new())
        .scan(&[corpus.source(), extra])
        .unwrap();

    assert_eq!(scan.report.archives_scanned, 2);
    assert_eq!(scan.archives.len(), 2);
}

// ===== Index Maintenance Tests =====

#[test]
fn test_deleted_archive_no_longer_matches() {
    let corpus = Corpus::new();
    let archive = corpus.source_file("a.zip");
    write_zip(&archive, &[("x.txt", b"gone soon")]);
    corpus.write_target("x.txt", b"gone soon");

    let index = Index::open_in_memory().unwrap();
    let hasher = Hasher::new();
    scan_sources(&index, &corpus, &hasher);
    assert_eq!(scan_targets(&index, &corpus, &hasher).report.matches, 1);

    fs::remove_file(&archive).unwrap();
    let source = scan_sources(&index, &corpus, &hasher);
    assert_eq!(source.report.archives_found, 0);
    assert_eq!(source.report.archives_removed, 1);

    let scan = scan_targets(&index, &corpus, &hasher);
    assert_eq!(scan.report.matches, 0);
    assert!(scan.matches.is_empty());
    assert_eq!(index.statistics().unwrap().file_count, 0);
}

#[test]
fn test_changed_partial_hash_size_keeps_large_matches() {
    let corpus = Corpus::new();
    let data = noise(2 * 1024 * 1024, 11);
    write_zip(&corpus.source_file("big.zip"), &[("big.bin", &data)]);
    corpus.write_target("big.bin", &data);

    let index = Index::open_in_memory().unwrap();
    let first = Hasher::new().with_partial_hash_size(8192);
    SourceCatalogBuilder::new(&index, walker(), first)
        .with_recheck_archives(true)
        .scan(&[corpus.source()])
        .unwrap();

    let second = Hasher::new().with_partial_hash_size(16384);
    let source = SourceCatalogBuilder::new(&index, walker(), second.clone())
        .with_recheck_archives(true)
        .scan(&[corpus.source()])
        .unwrap();
    assert!(source.report.hash_settings_changed);
    assert_eq!(source.report.archives_skipped, 0);
    assert_eq!(source.report.archives_scanned, 1);

    let scan = TargetMatcher::new(&index, second)
        .with_recheck_targets(true)
        .scan(&[corpus.target()])
        .unwrap();
    assert_eq!(scan.report.matches, 1);
    assert_eq!(scan.report.full_hashes_computed, 1);
}
