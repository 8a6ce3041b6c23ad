use std::fs;
use std::path::PathBuf;

use arcdupe::actions::DeleteMode;
use arcdupe::config::{AppConfig, ConfigError};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    let figment = Figment::from(Serialized::defaults(AppConfig::default()));
    let config = AppConfig::from_figment(figment).unwrap();

    assert_eq!(config, AppConfig::default());
    assert!(config.keep_store_between_runs);
    assert!(config.auto_select_duplicates);
    assert_eq!(config.delete_mode, DeleteMode::Trash);
    assert_eq!(config.partial_hash_threshold, 1_048_576);
    assert_eq!(config.partial_hash_size, 8192);
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let toml_content = r#"
source_dirs = ["/archives", "/more-archives"]
target_dirs = ["/home/user"]
store_path = "/var/lib/arcdupe/index.db"
min_file_size = 4096
delete_mode = "permanent"
ignore_patterns = ["*.tmp"]
"#;
    fs::write(&config_path, toml_content).unwrap();

    let config = AppConfig::load(Some(&config_path)).unwrap();

    assert_eq!(config.source_dirs.len(), 2);
    assert_eq!(config.target_dirs, vec![PathBuf::from("/home/user")]);
    assert_eq!(config.store_path, PathBuf::from("/var/lib/arcdupe/index.db"));
    assert_eq!(config.min_file_size, 4096);
    assert_eq!(config.delete_mode, DeleteMode::Permanent);
    assert_eq!(config.ignore_patterns, vec!["*.tmp".to_string()]);
    // Untouched keys keep their defaults.
    assert!(!config.recheck_archives);
    assert!(config.keep_store_between_runs);
}

#[test]
fn test_config_round_trips_through_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let original = AppConfig {
        source_dirs: vec![PathBuf::from("/a")],
        recheck_targets: true,
        extract_timeout_secs: 42,
        ..AppConfig::default()
    };
    fs::write(&config_path, toml::to_string_pretty(&original).unwrap()).unwrap();

    let figment = Figment::from(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(&config_path));
    assert_eq!(AppConfig::from_figment(figment).unwrap(), original);
}

#[test]
fn test_env_overrides_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "max_recursion_depth = 3\n").unwrap();

    // Only this test sets this variable.
    std::env::set_var("ARCDUPE_MAX_RECURSION_DEPTH", "7");
    let figment = Figment::from(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(&config_path))
        .merge(Env::prefixed("ARCDUPE_"));
    let config = AppConfig::from_figment(figment);
    std::env::remove_var("ARCDUPE_MAX_RECURSION_DEPTH");

    assert_eq!(config.unwrap().max_recursion_depth, 7);
}

#[test]
fn test_missing_explicit_config_file_fails() {
    let temp_dir = tempdir().unwrap();
    let result = AppConfig::load(Some(&temp_dir.path().join("nope.toml")));
    assert!(matches!(result, Err(ConfigError::Load(_))));
}

#[test]
fn test_malformed_toml_fails() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "min_file_size = \"lots\"\n").unwrap();
    assert!(AppConfig::load(Some(&config_path)).is_err());
}

#[test]
fn test_validate_lists_every_problem() {
    let temp_dir = tempdir().unwrap();
    let file = temp_dir.path().join("file.txt");
    fs::write(&file, b"x").unwrap();

    let config = AppConfig {
        source_dirs: vec![file],
        target_dirs: vec![temp_dir.path().join("missing")],
        partial_hash_size: 0,
        ..AppConfig::default()
    };

    match config.validate() {
        Err(ConfigError::Invalid(problems)) => {
            assert_eq!(problems.len(), 3, "{problems:?}");
        }
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[test]
fn test_validate_accepts_existing_dirs() {
    let temp_dir = tempdir().unwrap();
    let config = AppConfig {
        source_dirs: vec![temp_dir.path().to_path_buf()],
        target_dirs: vec![temp_dir.path().to_path_buf()],
        store_path: temp_dir.path().join("index.db"),
        ..AppConfig::default()
    };
    assert!(config.validate().is_ok());
}
