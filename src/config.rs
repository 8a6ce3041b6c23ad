//! Application configuration.
//!
//! Settings are layered, later layers winning:
//!
//! 1. built-in defaults ([`AppConfig::default`])
//! 2. a TOML file (`--config`, or `config.toml` in the platform config dir)
//! 3. `ARCDUPE_*` environment variables (`ARCDUPE_MIN_FILE_SIZE=4096`)
//! 4. command-line flags, applied by the caller
//!
//! [`AppConfig::validate`] reports every problem at once.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::actions::delete::DeleteMode;
use crate::archive::DEFAULT_MAX_RECURSION_DEPTH;
use crate::archive::capability::DEFAULT_EXTRACT_TIMEOUT;
use crate::scanner::hasher::{DEFAULT_PARTIAL_HASH_SIZE, DEFAULT_PARTIAL_HASH_THRESHOLD};

/// Prefix of environment variables read by [`AppConfig::load`].
pub const ENV_PREFIX: &str = "ARCDUPE_";

const STORE_FILE_NAME: &str = "index.db";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A layer could not be read or has the wrong shape.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// The merged configuration is unusable.
    #[error("Invalid configuration:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

/// Everything a scan needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directories holding the archives to index.
    pub source_dirs: Vec<PathBuf>,
    /// Directories searched for duplicates.
    pub target_dirs: Vec<PathBuf>,
    /// Index database file.
    pub store_path: PathBuf,
    /// Keep the index after the run; when false every run starts empty.
    pub keep_store_between_runs: bool,
    /// Reuse stored results for archives that did not change.
    pub recheck_archives: bool,
    /// Reuse cached fingerprints for target files that did not change.
    pub recheck_targets: bool,
    /// Report what would be deleted without touching anything.
    pub dry_run: bool,
    pub delete_mode: DeleteMode,
    /// Selection of duplicates that have no stored decision.
    pub auto_select_duplicates: bool,
    /// Files (and archive entries) below this size are ignored.
    pub min_file_size: u64,
    /// Files of at least this size get a quick hash instead of a full hash.
    pub partial_hash_threshold: u64,
    /// Bytes covered by the quick hash.
    pub partial_hash_size: u64,
    /// How many levels of archives inside archives are opened.
    pub max_recursion_depth: u32,
    /// Run self-extracting executables found in source directories.
    pub allow_self_extract: bool,
    /// Limit for one external extraction process.
    pub extract_timeout_secs: u64,
    /// Gitignore-style patterns skipped in source and target walks.
    pub ignore_patterns: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_dirs: Vec::new(),
            target_dirs: Vec::new(),
            store_path: default_store_path(),
            keep_store_between_runs: true,
            recheck_archives: false,
            recheck_targets: false,
            dry_run: false,
            delete_mode: DeleteMode::Trash,
            auto_select_duplicates: true,
            min_file_size: 0,
            partial_hash_threshold: DEFAULT_PARTIAL_HASH_THRESHOLD,
            partial_hash_size: DEFAULT_PARTIAL_HASH_SIZE,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            allow_self_extract: false,
            extract_timeout_secs: DEFAULT_EXTRACT_TIMEOUT.as_secs(),
            ignore_patterns: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Merge defaults, the config file and the environment.
    ///
    /// An explicit `config_file` must exist; the platform default is optional.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] for unreadable or malformed layers.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        match config_file {
            Some(path) => figment = figment.merge(Toml::file_exact(path)),
            None => {
                if let Some(path) = default_config_path() {
                    log::debug!("Looking for config file at {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Extract a configuration from an already assembled figment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when extraction fails.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Check the merged configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] listing every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.source_dirs.is_empty() {
            problems.push("At least one source directory is required".to_string());
        }
        if self.target_dirs.is_empty() {
            problems.push("At least one target directory is required".to_string());
        }
        for dir in self.source_dirs.iter().chain(&self.target_dirs) {
            if !dir.is_dir() {
                problems.push(format!("Not a directory: {}", dir.display()));
            }
        }
        if self.partial_hash_size == 0 {
            problems.push("partial_hash_size must be greater than 0".to_string());
        }
        if self.partial_hash_size > self.partial_hash_threshold {
            problems.push(format!(
                "partial_hash_size ({}) must not exceed partial_hash_threshold ({})",
                self.partial_hash_size, self.partial_hash_threshold
            ));
        }
        if self.extract_timeout_secs == 0 {
            problems.push("extract_timeout_secs must be greater than 0".to_string());
        }
        if self.store_path.as_os_str().is_empty() {
            problems.push("store_path must not be empty".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    #[must_use]
    pub fn extract_timeout(&self) -> Duration {
        Duration::from_secs(self.extract_timeout_secs)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "arcdupe", "arcdupe")
}

/// `config.toml` in the platform configuration directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Index location in the platform data directory, or the working directory.
#[must_use]
pub fn default_store_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join(STORE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(STORE_FILE_NAME))
}
