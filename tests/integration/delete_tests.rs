use std::fs;

use arcdupe::actions::{delete_files, DeleteMode};
use arcdupe::duplicates::{select_all, selected_targets};
use arcdupe::index::Index;
use arcdupe::scanner::Hasher;

use super::fixtures::{scan_sources, scan_targets, write_zip, Corpus};

#[test]
fn test_delete_selected_duplicates_permanently() {
    let corpus = Corpus::new();
    write_zip(&corpus.source_file("a.zip"), &[("keep.txt", b"shared")]);
    let dup = corpus.write_target("dup.txt", b"shared");
    let unique = corpus.write_target("unique.txt", b"only here");

    let index = Index::open_in_memory().unwrap();
    let hasher = Hasher::new();
    scan_sources(&index, &corpus, &hasher);
    let scan = scan_targets(&index, &corpus, &hasher);

    let paths = selected_targets(&scan.matches);
    assert_eq!(paths.len(), 1);

    let result = delete_files(&paths, DeleteMode::Permanent, false);
    assert!(result.all_succeeded());
    assert_eq!(result.bytes_freed, 6);
    assert!(!dup.exists());
    assert!(unique.exists());
}

#[test]
fn test_dry_run_reports_without_deleting() {
    let corpus = Corpus::new();
    write_zip(&corpus.source_file("a.zip"), &[("x", b"payload")]);
    let dup = corpus.write_target("x", b"payload");

    let index = Index::open_in_memory().unwrap();
    let hasher = Hasher::new();
    scan_sources(&index, &corpus, &hasher);
    let scan = scan_targets(&index, &corpus, &hasher);

    let result = delete_files(&selected_targets(&scan.matches), DeleteMode::Permanent, true);
    assert!(result.dry_run);
    assert_eq!(result.success_count(), 1);
    assert_eq!(result.bytes_freed, 7);
    assert!(dup.exists());
    assert!(result.summary().starts_with("Would delete"));
}

#[test]
fn test_vanished_target_is_not_retried() {
    let corpus = Corpus::new();
    write_zip(&corpus.source_file("a.zip"), &[("x", b"payload")]);
    let dup = corpus.write_target("x", b"payload");

    let index = Index::open_in_memory().unwrap();
    let hasher = Hasher::new();
    scan_sources(&index, &corpus, &hasher);
    let scan = scan_targets(&index, &corpus, &hasher);
    fs::remove_file(&dup).unwrap();

    let result = delete_files(&selected_targets(&scan.matches), DeleteMode::Permanent, false);
    assert_eq!(result.failure_count(), 1);
    assert!(result.failures[0].1.contains("File not found"));
    assert!(result.retry_set().is_empty());
}

#[test]
fn test_deselected_match_is_not_deleted() {
    let corpus = Corpus::new();
    write_zip(&corpus.source_file("a.zip"), &[("x", b"payload")]);
    let dup = corpus.write_target("x", b"payload");

    let index = Index::open_in_memory().unwrap();
    let hasher = Hasher::new();
    scan_sources(&index, &corpus, &hasher);
    let mut scan = scan_targets(&index, &corpus, &hasher);
    select_all(&mut scan.matches, &index, false).unwrap();

    let paths = selected_targets(&scan.matches);
    assert!(paths.is_empty());
    let result = delete_files(&paths, DeleteMode::Permanent, false);
    assert_eq!(result.success_count(), 0);
    assert!(dup.exists());
}
