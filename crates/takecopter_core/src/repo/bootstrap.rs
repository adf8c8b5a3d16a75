//! Active-root bookkeeping and on-disk root layout.

use super::{RepoError, RepoResult};
use crate::clock::now_rfc3339;
use crate::config::{RepositoryConfig, DATABASE_IMAGE_KEY};
use std::fs;
use std::path::{Path, PathBuf};

pub const EXPORTS_DIR: &str = "exports";
pub const LOCK_FILE: &str = ".lock";
/// Manifest of the per-story-database layout that predates the single image.
pub const LEGACY_MANIFEST_FILE: &str = "project.json";

/// Reads the remembered root. A missing or blank record means "not set up".
pub(crate) fn read_active_root(config: &RepositoryConfig) -> RepoResult<Option<PathBuf>> {
    let path = config.bootstrap_record_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(RepoError::Config(format!(
                "cannot read bootstrap record {}: {err}",
                path.display()
            )))
        }
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(PathBuf::from(trimmed)))
}

pub(crate) fn write_active_root(config: &RepositoryConfig, root: &Path) -> RepoResult<()> {
    let path = config.bootstrap_record_path();
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, root.to_string_lossy().as_bytes())
    };
    write().map_err(|err| {
        RepoError::Config(format!(
            "cannot write bootstrap record {}: {err}",
            path.display()
        ))
    })
}

/// Creates `<root>/exports/` and refreshes the `.lock` marker.
pub(crate) fn ensure_root_layout(root: &Path) -> RepoResult<()> {
    let prepare = || -> std::io::Result<()> {
        fs::create_dir_all(root.join(EXPORTS_DIR))?;
        let lock = format!("pid={}\nupdated_at={}\n", std::process::id(), now_rfc3339());
        fs::write(root.join(LOCK_FILE), lock)
    };
    prepare().map_err(|err| {
        RepoError::Config(format!(
            "cannot prepare project root {}: {err}",
            root.display()
        ))
    })
}

/// Whether `root` holds a database image or a legacy manifest in place.
pub(crate) fn has_project_files(root: &Path) -> bool {
    root.join(DATABASE_IMAGE_KEY).is_file() || root.join(LEGACY_MANIFEST_FILE).is_file()
}

#[cfg(test)]
mod tests {
    use super::{ensure_root_layout, read_active_root, write_active_root, EXPORTS_DIR, LOCK_FILE};
    use crate::config::RepositoryConfig;

    #[test]
    fn blank_record_reads_as_not_set_up() {
        let dir = tempfile::tempdir().unwrap();
        let config = RepositoryConfig::new(dir.path());
        assert_eq!(read_active_root(&config).unwrap(), None);

        std::fs::write(config.bootstrap_record_path(), "  \n").unwrap();
        assert_eq!(read_active_root(&config).unwrap(), None);

        let root = dir.path().join("novel");
        write_active_root(&config, &root).unwrap();
        assert_eq!(read_active_root(&config).unwrap(), Some(root));
    }

    #[test]
    fn layout_creates_exports_and_lock() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("project");
        ensure_root_layout(&root).unwrap();
        assert!(root.join(EXPORTS_DIR).is_dir());
        let lock = std::fs::read_to_string(root.join(LOCK_FILE)).unwrap();
        assert!(lock.starts_with(&format!("pid={}", std::process::id())));
    }
}
