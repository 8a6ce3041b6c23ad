use std::time::{Duration, SystemTime};

use arcdupe::index::{FileRecord, Index};
use arcdupe::scanner::{Hasher, SourceCatalogBuilder};
use filetime::FileTime;
use tempfile::TempDir;

use super::fixtures::{walker, write_zip, Corpus};

fn rescan_builder(index: &Index) -> SourceCatalogBuilder<'_> {
    SourceCatalogBuilder::new(index, walker(), Hasher::new()).with_recheck_archives(true)
}

#[test]
fn test_unchanged_archive_is_not_reread() {
    let corpus = Corpus::new();
    write_zip(&corpus.source_file("a.zip"), &[("1", b"one"), ("2", b"two")]);
    let index = Index::open_in_memory().unwrap();

    let first = rescan_builder(&index).scan(&[corpus.source()]).unwrap();
    assert_eq!(first.report.archives_scanned, 1);
    let count = index.statistics().unwrap().file_count;

    let second = rescan_builder(&index).scan(&[corpus.source()]).unwrap();
    assert_eq!(second.report.archives_scanned, 0);
    assert_eq!(second.report.archives_skipped, 1);
    assert_eq!(second.report.files_indexed, 0);
    assert_eq!(index.statistics().unwrap().file_count, count);
    assert_eq!(second.archives.values().next().unwrap().file_count, 2);
}

#[test]
fn test_changed_archive_replaces_records() {
    let corpus = Corpus::new();
    let archive = corpus.source_file("a.zip");
    write_zip(&archive, &[("old.txt", b"old"), ("kept.txt", b"kept")]);
    let index = Index::open_in_memory().unwrap();
    rescan_builder(&index).scan(&[corpus.source()]).unwrap();

    write_zip(&archive, &[("kept.txt", b"kept"), ("new.txt", b"new")]);
    let later = SystemTime::now() + Duration::from_secs(10);
    filetime::set_file_mtime(&archive, FileTime::from_system_time(later)).unwrap();

    let scan = rescan_builder(&index).scan(&[corpus.source()]).unwrap();
    assert_eq!(scan.report.archives_scanned, 1);

    let key = std::path::absolute(&archive).unwrap();
    let names: Vec<_> = index
        .files_by_archive(&key.to_string_lossy())
        .unwrap()
        .into_iter()
        .map(|r| r.path_in_archive)
        .collect();
    assert_eq!(names, vec!["kept.txt".to_string(), "new.txt".to_string()]);
}

#[test]
fn test_without_recheck_archive_is_always_reread() {
    let corpus = Corpus::new();
    write_zip(&corpus.source_file("a.zip"), &[("1", b"one")]);
    let index = Index::open_in_memory().unwrap();

    for _ in 0..2 {
        let scan = SourceCatalogBuilder::new(&index, walker(), Hasher::new())
            .scan(&[corpus.source()])
            .unwrap();
        assert_eq!(scan.report.archives_scanned, 1);
    }
    assert_eq!(index.statistics().unwrap().file_count, 1);
}

#[test]
fn test_upgrade_hash_round_trip() {
    let index = Index::open_in_memory().unwrap();
    let record = FileRecord::new("/a.zip", "big.bin", 5_000_000, None, Some("q1".into()));
    index.add_files(&[record]).unwrap();

    assert!(index.upgrade_hash("/a.zip", "big.bin", "f1").unwrap());

    let by_full = index.find_by_full_hash("f1").unwrap();
    assert_eq!(by_full.len(), 1);
    assert_eq!(by_full[0].quick_hash.as_deref(), Some("q1"));
    let by_quick = index.find_by_quick_hash("q1").unwrap();
    assert_eq!(by_quick[0].full_hash.as_deref(), Some("f1"));

    assert!(!index.upgrade_hash("/a.zip", "missing", "f2").unwrap());
}

#[test]
fn test_natural_key_replacement() {
    let index = Index::open_in_memory().unwrap();
    index
        .add_files(&[FileRecord::new("/a.zip", "x", 1, Some("h1".into()), None)])
        .unwrap();
    index
        .add_files(&[FileRecord::new("/a.zip", "x", 2, Some("h2".into()), None)])
        .unwrap();

    assert_eq!(index.statistics().unwrap().file_count, 1);
    assert!(index.find_by_full_hash("h1").unwrap().is_empty());
    assert_eq!(index.find_by_full_hash("h2").unwrap()[0].size, 2);
}

#[test]
fn test_threshold_boundary() {
    let dir = TempDir::new().unwrap();
    let hasher = Hasher::new()
        .with_partial_hash_threshold(1024)
        .with_partial_hash_size(128);

    let below = dir.path().join("below");
    std::fs::write(&below, vec![1u8; 1023]).unwrap();
    let (full, quick) = hasher.fingerprint_file(&below, 1023).unwrap();
    assert!(full.is_some());
    assert!(quick.is_none());

    let at = dir.path().join("at");
    std::fs::write(&at, vec![1u8; 1024]).unwrap();
    let (full, quick) = hasher.fingerprint_file(&at, 1024).unwrap();
    assert!(full.is_none());
    assert!(quick.is_some());

    // Streams at the threshold carry both fingerprints.
    let data = vec![1u8; 1024];
    let (full, quick) = hasher.fingerprint_stream(&mut &data[..], 1024).unwrap();
    assert_eq!(full, hasher.full_hash(&at).ok());
    assert_eq!(quick, hasher.fingerprint_file(&at, 1024).unwrap().1);
}

#[test]
fn test_index_persists_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/dir/index.db");
    {
        let index = Index::open(&path).unwrap();
        index
            .add_files(&[FileRecord::new("/a.zip", "x", 1, Some("h".into()), None)])
            .unwrap();
    }
    let index = Index::open(&path).unwrap();
    assert_eq!(index.find_by_full_hash("h").unwrap().len(), 1);
    assert_eq!(index.path(), Some(path.as_path()));
}
