//! Row-level SQL for stories, workspaces and the global library.
//!
//! Every function takes a plain `&Connection`, so callers pass either the
//! engine connection (reads) or an open transaction (writes).

use super::{RepoError, RepoResult};
use crate::model::library::SettingLibrary;
use crate::model::story::{ProjectData, Story, Workspace};
use crate::normalize::{normalize_cards, normalize_library, normalize_tree};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

const GLOBAL_LIBRARY_KEY: &str = "global_library";

const STORY_SELECT_SQL: &str = "SELECT id, title, description, updated_at, cover_color FROM stories";

/// JSON columns of the `workspaces` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkspaceColumn {
    Settings,
    Tree,
    Library,
}

impl WorkspaceColumn {
    fn name(self) -> &'static str {
        match self {
            Self::Settings => "settings_json",
            Self::Tree => "tree_json",
            Self::Library => "library_json",
        }
    }

    fn update_sql(self) -> &'static str {
        match self {
            Self::Settings => "UPDATE workspaces SET settings_json = ?1 WHERE story_id = ?2;",
            Self::Tree => "UPDATE workspaces SET tree_json = ?1 WHERE story_id = ?2;",
            Self::Library => "UPDATE workspaces SET library_json = ?1 WHERE story_id = ?2;",
        }
    }
}

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("serialize failed: {err}")))
}

pub(crate) fn insert_story(conn: &Connection, story: &Story) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO stories (id, title, description, updated_at, cover_color)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            story.id.as_str(),
            story.title.as_str(),
            story.description.as_str(),
            story.updated_at.as_str(),
            story.cover_color.as_str(),
        ],
    )?;
    Ok(())
}

pub(crate) fn insert_workspace(
    conn: &Connection,
    story_id: &str,
    workspace: &Workspace,
) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO workspaces (story_id, settings_json, tree_json, library_json)
         VALUES (?1, ?2, ?3, ?4);",
        params![
            story_id,
            to_json(&workspace.settings)?,
            to_json(&workspace.tree)?,
            to_json(&workspace.library)?,
        ],
    )?;
    Ok(())
}

pub(crate) fn find_story(conn: &Connection, story_id: &str) -> RepoResult<Option<Story>> {
    let story = conn
        .query_row(
            &format!("{STORY_SELECT_SQL} WHERE id = ?1;"),
            [story_id],
            parse_story_row,
        )
        .optional()?;
    Ok(story)
}

pub(crate) fn rename_story(
    conn: &Connection,
    story_id: &str,
    title: &str,
    updated_at: &str,
) -> RepoResult<bool> {
    let changed = conn.execute(
        "UPDATE stories SET title = ?1, updated_at = ?2 WHERE id = ?3;",
        params![title, updated_at, story_id],
    )?;
    Ok(changed > 0)
}

pub(crate) fn touch_story(conn: &Connection, story_id: &str, updated_at: &str) -> RepoResult<bool> {
    let changed = conn.execute(
        "UPDATE stories SET updated_at = ?1 WHERE id = ?2;",
        params![updated_at, story_id],
    )?;
    Ok(changed > 0)
}

/// Deletes the story; its workspace row goes with it through the FK cascade.
pub(crate) fn delete_story(conn: &Connection, story_id: &str) -> RepoResult<bool> {
    let changed = conn.execute("DELETE FROM stories WHERE id = ?1;", [story_id])?;
    Ok(changed > 0)
}

pub(crate) fn update_workspace_column(
    conn: &Connection,
    story_id: &str,
    column: WorkspaceColumn,
    json: &str,
) -> RepoResult<bool> {
    let changed = conn.execute(column.update_sql(), params![json, story_id])?;
    Ok(changed > 0)
}

pub(crate) fn delete_all_stories(conn: &Connection) -> RepoResult<()> {
    conn.execute_batch("DELETE FROM workspaces; DELETE FROM stories;")?;
    Ok(())
}

pub(crate) fn story_count(conn: &Connection) -> RepoResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM stories;", [], |row| row.get(0))?)
}

pub(crate) fn read_global_library(conn: &Connection) -> RepoResult<Option<SettingLibrary>> {
    let raw: Option<Option<String>> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = ?1;",
            [GLOBAL_LIBRARY_KEY],
            |row| row.get(0),
        )
        .optional()?;
    match raw.flatten() {
        Some(text) => Ok(Some(normalize_library(&parse_json(&text, "meta.global_library")?))),
        None => Ok(None),
    }
}

pub(crate) fn write_global_library(conn: &Connection, library: &SettingLibrary) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        params![GLOBAL_LIBRARY_KEY, to_json(library)?],
    )?;
    Ok(())
}

/// Reads every story with its workspace, newest first.
pub(crate) fn read_project(conn: &Connection) -> RepoResult<ProjectData> {
    let mut stmt = conn.prepare(&format!(
        "{STORY_SELECT_SQL} ORDER BY updated_at DESC, id ASC;"
    ))?;
    let stories = stmt
        .query_map([], parse_story_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT story_id, settings_json, tree_json, library_json FROM workspaces;",
    )?;
    let mut rows = stmt.query([])?;
    let mut stored = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let story_id: String = row.get(0)?;
        let workspace = parse_workspace_row(row, &story_id)?;
        stored.insert(story_id, workspace);
    }

    let workspaces = stories
        .iter()
        .map(|story| {
            let workspace = stored.remove(&story.id).unwrap_or_default();
            (story.id.clone(), workspace)
        })
        .collect();

    Ok(ProjectData {
        stories,
        workspaces,
        shared_library: read_global_library(conn)?.unwrap_or_default(),
    })
}

pub(crate) fn read_workspace(conn: &Connection, story_id: &str) -> RepoResult<Option<Workspace>> {
    let mut stmt = conn.prepare(
        "SELECT story_id, settings_json, tree_json, library_json FROM workspaces WHERE story_id = ?1;",
    )?;
    let mut rows = stmt.query([story_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_workspace_row(row, story_id)?)),
        None => Ok(None),
    }
}

fn parse_story_row(row: &Row<'_>) -> rusqlite::Result<Story> {
    Ok(Story {
        id: row.get(0)?,
        title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        updated_at: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        cover_color: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
    })
}

fn parse_workspace_row(row: &Row<'_>, story_id: &str) -> RepoResult<Workspace> {
    let settings: Option<String> = row.get(1)?;
    let tree: Option<String> = row.get(2)?;
    let library: Option<String> = row.get(3)?;

    let settings = normalize_cards(&parse_column(settings, story_id, WorkspaceColumn::Settings)?);
    let tree = normalize_tree(&parse_column(tree, story_id, WorkspaceColumn::Tree)?);
    let library = parse_column(library, story_id, WorkspaceColumn::Library)?;

    Ok(Workspace {
        settings,
        tree,
        library: normalize_library(&library),
    })
}

fn parse_column(text: Option<String>, story_id: &str, column: WorkspaceColumn) -> RepoResult<Value> {
    match text {
        Some(text) if !text.trim().is_empty() => {
            parse_json(&text, &format!("workspace {story_id} {}", column.name()))
        }
        _ => Ok(Value::Null),
    }
}

fn parse_json(text: &str, location: &str) -> RepoResult<Value> {
    serde_json::from_str(text)
        .map_err(|err| RepoError::InvalidData(format!("{location} is not valid JSON: {err}")))
}
