//! Story, workspace and project-level normalization.

use super::{non_blank_field, normalize_cards, normalize_library, string_or_default, Normalize};
use crate::model::library::SettingLibrary;
use crate::model::story::{ProjectData, Story, Workspace, COVER_COLORS};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

impl Normalize for Workspace {
    fn normalize(raw: &Value) -> Self {
        normalize_workspace(raw)
    }
}

impl Normalize for ProjectData {
    fn normalize(raw: &Value) -> Self {
        normalize_project(raw)
    }
}

/// Returns `None` when the story has no usable id.
pub fn normalize_story(raw: &Value) -> Option<Story> {
    let object = raw.as_object()?;
    let id = non_blank_field(object, "id")?;
    Some(Story {
        id: id.to_string(),
        title: string_or_default(object, "title", ""),
        description: string_or_default(object, "description", ""),
        updated_at: string_or_default(object, "updatedAt", ""),
        cover_color: non_blank_field(object, "coverColor")
            .unwrap_or(COVER_COLORS[0])
            .to_string(),
    })
}

/// The outline tree is opaque; anything but an array becomes empty.
pub fn normalize_tree(raw: &Value) -> Vec<Value> {
    raw.as_array().cloned().unwrap_or_default()
}

pub fn normalize_workspace(raw: &Value) -> Workspace {
    let Some(object) = raw.as_object() else {
        return Workspace::default();
    };
    Workspace {
        settings: normalize_cards(object.get("settings").unwrap_or(&Value::Null)),
        tree: normalize_tree(object.get("tree").unwrap_or(&Value::Null)),
        library: normalize_library(object.get("library").unwrap_or(&Value::Null)),
    }
}

/// Stories without an id, and later stories repeating an id, are dropped.
/// Every kept story gets a workspace; workspaces of unknown stories are dropped.
/// A missing shared library falls back to the seeded library.
pub fn normalize_project(raw: &Value) -> ProjectData {
    let Some(object) = raw.as_object() else {
        return ProjectData {
            shared_library: SettingLibrary::seeded(),
            ..ProjectData::default()
        };
    };

    let mut seen = HashSet::new();
    let stories: Vec<Story> = object
        .get("stories")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .filter_map(normalize_story)
        .filter(|story| seen.insert(story.id.clone()))
        .collect();

    let raw_workspaces = object.get("workspaces").and_then(Value::as_object);
    let workspaces: BTreeMap<String, Workspace> = stories
        .iter()
        .map(|story| {
            let workspace = raw_workspaces
                .and_then(|map| map.get(&story.id))
                .map(normalize_workspace)
                .unwrap_or_default();
            (story.id.clone(), workspace)
        })
        .collect();

    let shared_library = match object.get("sharedLibrary") {
        Some(raw_library) if raw_library.is_object() => normalize_library(raw_library),
        _ => SettingLibrary::seeded(),
    };

    ProjectData {
        stories,
        workspaces,
        shared_library,
    }
}
