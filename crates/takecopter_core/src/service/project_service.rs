//! Export, import and backup files for the active project.
//!
//! # Responsibility
//! - Write export envelopes and database backups under `<root>/exports/`.
//! - Read envelope files and hand them to the repository's import path.
//!
//! # Invariants
//! - File names carry a UTC `YYYYMMDD-HHMMSS` stamp.
//! - Import files are parsed before the repository is touched; unparsable
//!   files fail with `InvalidSource`.

use crate::clock::file_stamp;
use crate::model::story::Story;
use crate::repo::{ProjectDataRepository, RepoError, RepoResult, EXPORTS_DIR};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

static FILE_NAME_UNSAFE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("valid file name regex"));

/// File-level operations over any [`ProjectDataRepository`].
pub struct ProjectService<R: ProjectDataRepository> {
    repo: R,
}

impl<R: ProjectDataRepository> ProjectService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn repo_mut(&mut self) -> &mut R {
        &mut self.repo
    }

    pub fn into_inner(self) -> R {
        self.repo
    }

    /// Writes the whole project envelope to
    /// `exports/takecopter-project-<stamp>.json`.
    pub fn export_project_to_file(&mut self) -> RepoResult<PathBuf> {
        let envelope = self.repo.export_project()?;
        let path = self
            .exports_dir()?
            .join(format!("takecopter-project-{}.json", file_stamp()));
        write_json(&path, &envelope)?;
        info!(
            "event=export_file module=service status=ok scope=project stories={}",
            envelope.data.stories.len()
        );
        Ok(path)
    }

    /// Writes one story envelope to
    /// `exports/takecopter-story-<id>-<stamp>.json`.
    pub fn export_story_to_file(&mut self, story_id: &str) -> RepoResult<PathBuf> {
        let envelope = self.repo.export_story(story_id)?;
        let safe_id = FILE_NAME_UNSAFE_RE.replace_all(story_id, "_");
        let path = self
            .exports_dir()?
            .join(format!("takecopter-story-{}-{}.json", safe_id, file_stamp()));
        write_json(&path, &envelope)?;
        info!(
            "event=export_file module=service status=ok scope=story story_id={}",
            story_id
        );
        Ok(path)
    }

    /// Copies the current database image to `exports/backup-<stamp>.sqlite3`.
    pub fn backup_database(&mut self) -> RepoResult<PathBuf> {
        let image = self.repo.database_image()?;
        let path = self
            .exports_dir()?
            .join(format!("backup-{}.sqlite3", file_stamp()));
        fs::write(&path, &image).map_err(|source| RepoError::Io {
            path: path.clone(),
            source,
        })?;
        info!(
            "event=backup module=service status=ok bytes={}",
            image.len()
        );
        Ok(path)
    }

    pub fn import_project_file(&mut self, path: &Path) -> RepoResult<()> {
        let envelope = read_json(path)?;
        self.repo.import_project(&envelope)
    }

    pub fn import_story_file(&mut self, path: &Path) -> RepoResult<Story> {
        let envelope = read_json(path)?;
        self.repo.import_story(&envelope)
    }

    fn exports_dir(&self) -> RepoResult<PathBuf> {
        let root = self.repo.active_root().ok_or(RepoError::SetupRequired)?;
        let dir = root.join(EXPORTS_DIR);
        fs::create_dir_all(&dir).map_err(|source| RepoError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RepoResult<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|err| RepoError::InvalidData(format!("serialize failed: {err}")))?;
    fs::write(path, bytes).map_err(|source| RepoError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json(path: &Path) -> RepoResult<Value> {
    let bytes = fs::read(path).map_err(|source| RepoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|err| {
        RepoError::InvalidSource(format!("{} is not valid JSON: {err}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::FILE_NAME_UNSAFE_RE;

    #[test]
    fn story_ids_are_made_file_name_safe() {
        assert_eq!(FILE_NAME_UNSAFE_RE.replace_all("a/b c", "_"), "a_b_c");
        assert_eq!(
            FILE_NAME_UNSAFE_RE.replace_all("4f1c-9a_x", "_"),
            "4f1c-9a_x"
        );
    }
}
