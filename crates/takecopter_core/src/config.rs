//! Installation-level configuration.
//!
//! # Responsibility
//! - Resolve the application data directory (env override, then platform default).
//! - Derive every per-installation path from that one directory.
//!
//! # Invariants
//! - Project data never lives in the data directory itself; it only holds the
//!   bootstrap record, the default project root and the secondary storage tier.

use crate::repo::{RepoError, RepoResult};
use std::path::{Path, PathBuf};

/// Overrides the platform data directory when set to a non-blank value.
pub const DATA_DIR_ENV: &str = "TAKECOPTER_DATA_DIR";
/// Application identifier, also the export envelope `app` tag.
pub const APP_ID: &str = "takecopter";
/// Storage key of the database image.
pub const DATABASE_IMAGE_KEY: &str = "takecopter.sqlite3";
/// Storage key of the pre-envelope JSON document migrated at first boot.
pub const LEGACY_DOCUMENT_KEY: &str = "takecopter-project.json";

const BOOTSTRAP_RECORD_FILE: &str = "active_root_path.txt";
const FALLBACK_DIR: &str = "fallback";
const LOG_DIR: &str = "logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    data_dir: PathBuf,
}

impl RepositoryConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Resolves the data directory from [`DATA_DIR_ENV`] or the platform default.
    pub fn from_env() -> RepoResult<Self> {
        if let Ok(value) = std::env::var(DATA_DIR_ENV) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Ok(Self::new(trimmed));
            }
        }
        dirs::data_dir()
            .map(|dir| Self::new(dir.join(APP_ID)))
            .ok_or_else(|| {
                RepoError::Config(format!(
                    "no platform data directory; set {DATA_DIR_ENV} to choose one"
                ))
            })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Root used when the user initializes without choosing a directory.
    pub fn default_root_path(&self) -> PathBuf {
        self.data_dir.join("projects").join("default.takecopter")
    }

    /// File remembering the active project root across restarts.
    pub fn bootstrap_record_path(&self) -> PathBuf {
        self.data_dir.join(BOOTSTRAP_RECORD_FILE)
    }

    /// Parent directory of the secondary storage tier.
    pub fn fallback_dir(&self) -> PathBuf {
        self.data_dir.join(FALLBACK_DIR)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join(LOG_DIR)
    }
}
