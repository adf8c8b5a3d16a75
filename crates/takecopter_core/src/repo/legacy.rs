//! One-shot migration of pre-image storage formats.
//!
//! # Responsibility
//! - Find a legacy JSON document under the legacy key in either storage tier.
//! - Find the per-story-database layout (`project.json` + `stories/<folder>/story.db`).
//! - Turn either into normalized [`ProjectData`].
//!
//! # Invariants
//! - Discovery never mutates anything; [`finish`] retires the legacy source
//!   and must only run after the migrated image is durably saved.
//! - Unparsable legacy documents are left in place and skipped.

use super::bootstrap::LEGACY_MANIFEST_FILE;
use super::{RepoError, RepoResult};
use crate::clock::now_rfc3339;
use crate::config::{APP_ID, LEGACY_DOCUMENT_KEY};
use crate::model::story::ProjectData;
use crate::normalize::normalize_project;
use crate::storage::TieredPersistence;
use log::{info, warn};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const STORIES_DIR: &str = "stories";
const STORY_DB_FILE: &str = "story.db";
const MIGRATED_SUFFIX: &str = ".migrated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LegacySource {
    Document,
    Manifest(PathBuf),
}

impl LegacySource {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Manifest(_) => "manifest",
        }
    }
}

#[derive(Debug)]
pub(crate) struct LegacyImport {
    pub source: LegacySource,
    pub data: ProjectData,
}

/// Looks for legacy data; the tier document wins over the on-disk manifest.
pub(crate) fn discover(
    root: &Path,
    persistence: &TieredPersistence,
) -> RepoResult<Option<LegacyImport>> {
    if let Some(data) = read_document(persistence) {
        return Ok(Some(LegacyImport {
            source: LegacySource::Document,
            data,
        }));
    }

    let manifest_path = root.join(LEGACY_MANIFEST_FILE);
    if manifest_path.is_file() {
        let data = read_manifest_layout(root, &manifest_path)?;
        return Ok(Some(LegacyImport {
            source: LegacySource::Manifest(manifest_path),
            data,
        }));
    }
    Ok(None)
}

/// Retires the legacy source so migration runs at most once.
pub(crate) fn finish(source: &LegacySource, persistence: &TieredPersistence) {
    match source {
        LegacySource::Document => persistence.erase_legacy(LEGACY_DOCUMENT_KEY),
        LegacySource::Manifest(path) => {
            let mut retired = path.clone().into_os_string();
            retired.push(MIGRATED_SUFFIX);
            if let Err(err) = fs::rename(path, &retired) {
                warn!(
                    "event=legacy_retire module=repo status=error source=manifest error={}",
                    err
                );
            }
        }
    }
}

fn read_document(persistence: &TieredPersistence) -> Option<ProjectData> {
    let bytes = persistence.read_legacy(LEGACY_DOCUMENT_KEY)?;
    let raw: Value = match serde_json::from_slice(&bytes) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(
                "event=legacy_read module=repo status=skipped source=document bytes={} error={}",
                bytes.len(),
                err
            );
            return None;
        }
    };
    let payload = match raw.get("data") {
        Some(data) if data.is_object() => data,
        _ => &raw,
    };
    let mut data = normalize_project(payload);
    fill_blank_timestamps(&mut data);
    info!(
        "event=legacy_read module=repo status=ok source=document stories={}",
        data.stories.len()
    );
    Some(data)
}

fn read_manifest_layout(root: &Path, manifest_path: &Path) -> RepoResult<ProjectData> {
    let text = fs::read_to_string(manifest_path).map_err(|err| {
        RepoError::InvalidData(format!("cannot read {}: {err}", manifest_path.display()))
    })?;
    let manifest: Value = serde_json::from_str(&text).map_err(|err| {
        RepoError::InvalidData(format!("{} is not valid JSON: {err}", manifest_path.display()))
    })?;
    let Some(object) = manifest.as_object() else {
        return Err(RepoError::InvalidData(format!(
            "{} is not a JSON object",
            manifest_path.display()
        )));
    };
    if let Some(app) = object.get("app") {
        if app.as_str() != Some(APP_ID) {
            return Err(RepoError::InvalidSource(format!(
                "{} was written by {app}",
                manifest_path.display()
            )));
        }
    }

    let mut stories = Vec::new();
    let mut workspaces = Map::new();
    for entry in object
        .get("stories")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
    {
        // Entries are `{story, folderName}`; the oldest manifests list bare stories.
        let story = entry.get("story").filter(|s| s.is_object()).unwrap_or(entry);
        let Some(id) = story.get("id").and_then(Value::as_str) else {
            continue;
        };
        let folder = match entry.get("folderName").and_then(Value::as_str) {
            Some(folder) if !folder.trim().is_empty() => folder.to_string(),
            _ => story_folder_name(
                story.get("title").and_then(Value::as_str).unwrap_or_default(),
                id,
            ),
        };
        if let Some(workspace) = read_story_db(root, &folder, id)? {
            workspaces.insert(id.to_string(), workspace);
        }
        stories.push(story.clone());
    }

    let mut raw = json!({ "stories": stories, "workspaces": workspaces });
    if let Some(library) = object.get("sharedLibrary") {
        raw["sharedLibrary"] = library.clone();
    }
    let mut data = normalize_project(&raw);
    fill_blank_timestamps(&mut data);
    info!(
        "event=legacy_read module=repo status=ok source=manifest stories={}",
        data.stories.len()
    );
    Ok(data)
}

/// Reads the single workspace row of a per-story database as raw JSON.
fn read_story_db(root: &Path, folder: &str, story_id: &str) -> RepoResult<Option<Value>> {
    let stories_dir = root.join(STORIES_DIR);
    let path = [
        stories_dir.join(folder).join(STORY_DB_FILE),
        stories_dir.join(story_id).join(STORY_DB_FILE),
    ]
    .into_iter()
    .find(|path| path.is_file());
    let Some(path) = path else {
        return Ok(None);
    };

    let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let row = conn
        .query_row("SELECT * FROM workspace ORDER BY id LIMIT 1;", [], |row| {
            let settings: Option<String> = row.get("settings_json")?;
            let tree: Option<String> = row.get("tree_json")?;
            // Databases created before story libraries lack this column.
            let library: Option<String> = row.get("library_json").ok().flatten();
            Ok((settings, tree, library))
        })
        .optional()?;
    let Some((settings, tree, library)) = row else {
        return Ok(None);
    };

    let parse = |text: Option<String>| -> Value {
        text.and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or(Value::Null)
    };
    Ok(Some(json!({
        "settings": parse(settings),
        "tree": parse(tree),
        "library": parse(library),
    })))
}

/// Folder naming of the per-story layout: ASCII slug of the title plus the
/// first eight characters of the id.
fn story_folder_name(title: &str, story_id: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "story" } else { slug };
    let short_id: String = story_id.chars().take(8).collect();
    format!("{slug}-{short_id}")
}

fn fill_blank_timestamps(data: &mut ProjectData) {
    let now = now_rfc3339();
    for story in &mut data.stories {
        if story.updated_at.trim().is_empty() {
            story.updated_at = now.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::story_folder_name;

    #[test]
    fn folder_names_follow_slug_and_short_id() {
        assert_eq!(
            story_folder_name("The Long Night!", "0123456789abcdef"),
            "the-long-night-01234567"
        );
        assert_eq!(story_folder_name("长夜", "abc"), "story-abc");
    }
}
