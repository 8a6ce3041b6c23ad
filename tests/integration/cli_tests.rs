use arcdupe::cli::{Cli, Commands, ScanArgs};
use arcdupe::config::AppConfig;
use arcdupe::error::ExitCode;
use arcdupe::index::Index;
use arcdupe::run_scan;
use arcdupe::signal::ShutdownHandler;
use clap::Parser;

use super::fixtures::{write_zip, Corpus};

fn scan_args(extra: &[&str]) -> ScanArgs {
    let mut argv = vec!["arcdupe", "scan"];
    argv.extend_from_slice(extra);
    match Cli::try_parse_from(argv).unwrap().command {
        Commands::Scan(args) => args,
        _ => panic!("Expected Scan command"),
    }
}

fn config_for(corpus: &Corpus, args: &ScanArgs) -> AppConfig {
    let mut config = AppConfig {
        source_dirs: vec![corpus.source()],
        target_dirs: vec![corpus.target()],
        store_path: corpus.dir.path().join("store/index.db"),
        ..AppConfig::default()
    };
    args.apply_to(&mut config);
    config.validate().unwrap();
    config
}

#[test]
fn test_scan_finds_duplicates() {
    let corpus = Corpus::new();
    write_zip(&corpus.source_file("a.zip"), &[("f.txt", b"same bytes")]);
    corpus.write_target("f.txt", b"same bytes");

    let args = scan_args(&["--output", "json"]);
    let config = config_for(&corpus, &args);
    let code = run_scan(&config, &args, true, &ShutdownHandler::new()).unwrap();

    assert_eq!(code, ExitCode::Success);
    let index = Index::open(&config.store_path).unwrap();
    assert_eq!(index.statistics().unwrap().file_count, 1);
}

#[test]
fn test_scan_without_matches_exits_with_no_duplicates() {
    let corpus = Corpus::new();
    write_zip(&corpus.source_file("a.zip"), &[("f.txt", b"inside")]);
    corpus.write_target("g.txt", b"outside");

    let args = scan_args(&["--output", "csv"]);
    let config = config_for(&corpus, &args);
    let code = run_scan(&config, &args, true, &ShutdownHandler::new()).unwrap();

    assert_eq!(code, ExitCode::NoDuplicates);
}

#[test]
fn test_no_keep_store_removes_index() {
    let corpus = Corpus::new();
    write_zip(&corpus.source_file("a.zip"), &[("f.txt", b"data")]);

    let args = scan_args(&["--no-keep-store", "--output", "json"]);
    let config = config_for(&corpus, &args);
    assert!(!config.keep_store_between_runs);
    run_scan(&config, &args, true, &ShutdownHandler::new()).unwrap();

    assert!(!config.store_path.exists());
}

#[test]
fn test_delete_with_yes_removes_duplicates() {
    let corpus = Corpus::new();
    write_zip(&corpus.source_file("a.zip"), &[("f.txt", b"same bytes")]);
    let dup = corpus.write_target("f.txt", b"same bytes");

    let args = scan_args(&["--delete", "--delete-mode", "permanent", "-y", "--output", "json"]);
    let config = config_for(&corpus, &args);
    let code = run_scan(&config, &args, true, &ShutdownHandler::new()).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(!dup.exists());
}

#[test]
fn test_dry_run_keeps_duplicates() {
    let corpus = Corpus::new();
    write_zip(&corpus.source_file("a.zip"), &[("f.txt", b"same bytes")]);
    let dup = corpus.write_target("f.txt", b"same bytes");

    let args = scan_args(&["--dry-run", "--output", "json"]);
    let config = config_for(&corpus, &args);
    let code = run_scan(&config, &args, true, &ShutdownHandler::new()).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(dup.exists());
}

#[test]
fn test_interrupted_scan_exits_130() {
    let corpus = Corpus::new();
    write_zip(&corpus.source_file("a.zip"), &[("f.txt", b"same bytes")]);
    corpus.write_target("f.txt", b"same bytes");

    let args = scan_args(&["--output", "json"]);
    let config = config_for(&corpus, &args);
    let handler = ShutdownHandler::new();
    handler.request_shutdown();

    let code = run_scan(&config, &args, true, &handler).unwrap();
    assert_eq!(code, ExitCode::Interrupted);
    assert_eq!(code.as_i32(), 130);
}

// ===== Selection Tests =====

#[test]
fn test_keep_spares_path_and_is_remembered() {
    let corpus = Corpus::new();
    write_zip(
        &corpus.source_file("a.zip"),
        &[("keep.txt", b"keep me"), ("drop.txt", b"drop me")],
    );
    let kept = corpus.write_target("keep.txt", b"keep me");
    let dropped = corpus.write_target("drop.txt", b"drop me");

    let keep = kept.to_string_lossy().into_owned();
    let args = scan_args(&[
        "--keep", keep.as_str(), "--delete", "--delete-mode", "permanent", "-y", "--output", "json",
    ]);
    let config = config_for(&corpus, &args);
    run_scan(&config, &args, true, &ShutdownHandler::new()).unwrap();
    assert!(kept.exists());
    assert!(!dropped.exists());

    // A later run without --keep still honours the stored decision.
    let args = scan_args(&["--delete", "--delete-mode", "permanent", "-y", "--output", "json"]);
    let config = config_for(&corpus, &args);
    run_scan(&config, &args, true, &ShutdownHandler::new()).unwrap();
    assert!(kept.exists());
}

#[test]
fn test_select_overrides_no_auto_select() {
    let corpus = Corpus::new();
    write_zip(&corpus.source_file("a.zip"), &[("a.txt", b"aaa"), ("b.txt", b"bbb")]);
    let nested = corpus.target().join("picked");
    std::fs::create_dir(&nested).unwrap();
    let picked = nested.join("a.txt");
    std::fs::write(&picked, b"aaa").unwrap();
    let other = corpus.write_target("b.txt", b"bbb");

    let select = nested.to_string_lossy().into_owned();
    let args = scan_args(&[
        "--no-auto-select", "--select", select.as_str(), "--delete", "--delete-mode", "permanent", "-y",
        "--output", "json",
    ]);
    let config = config_for(&corpus, &args);
    run_scan(&config, &args, true, &ShutdownHandler::new()).unwrap();

    assert!(!picked.exists());
    assert!(other.exists());
}

#[test]
fn test_deselect_all_is_persisted() {
    let corpus = Corpus::new();
    write_zip(&corpus.source_file("a.zip"), &[("f.txt", b"same bytes")]);
    let dup = corpus.write_target("f.txt", b"same bytes");

    let args = scan_args(&["--deselect-all", "--output", "json"]);
    let config = config_for(&corpus, &args);
    run_scan(&config, &args, true, &ShutdownHandler::new()).unwrap();

    let args = scan_args(&["--delete", "--delete-mode", "permanent", "-y", "--output", "json"]);
    let config = config_for(&corpus, &args);
    let code = run_scan(&config, &args, true, &ShutdownHandler::new()).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(dup.exists());
}
