//! Story, workspace and whole-project aggregates.

use crate::model::library::SettingLibrary;
use crate::model::setting::SettingCard;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Story identifier. Generated as a v4 UUID string for new stories, but
/// imported stories keep whatever non-empty id they arrive with.
pub type StoryId = String;

/// Palette used for new story covers.
pub const COVER_COLORS: [&str; 5] = [
    "var(--coral-400)",
    "var(--violet-400)",
    "var(--teal-400)",
    "var(--amber-400)",
    "var(--rose-400)",
];

/// Top-level creative project. Owns exactly one [`Workspace`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: StoryId,
    pub title: String,
    pub description: String,
    /// RFC 3339 timestamp, bumped on every workspace mutation.
    pub updated_at: String,
    pub cover_color: String,
}

/// Per-story bundle of setting cards, outline tree and story-scoped library.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub settings: Vec<SettingCard>,
    /// Structural outline. Opaque to the repository; stored verbatim.
    pub tree: Vec<Value>,
    pub library: SettingLibrary,
}

/// Everything `load()` returns: stories, their workspaces and the global library.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectData {
    /// Sorted by `updated_at` descending, then id.
    pub stories: Vec<Story>,
    /// Keyed by story id; one entry per story.
    pub workspaces: BTreeMap<StoryId, Workspace>,
    pub shared_library: SettingLibrary,
}

impl ProjectData {
    pub fn story(&self, story_id: &str) -> Option<&Story> {
        self.stories.iter().find(|story| story.id == story_id)
    }

    pub fn workspace(&self, story_id: &str) -> Option<&Workspace> {
        self.workspaces.get(story_id)
    }
}

/// Whether a project root has been chosen for this installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapState {
    pub needs_setup: bool,
    pub default_root_path: String,
    pub active_root_path: Option<String>,
}

/// Input for `create_story`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoryInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl CreateStoryInput {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}
