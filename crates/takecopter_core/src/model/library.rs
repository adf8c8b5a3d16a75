//! Tag/category/template vocabulary, held globally and per story.

use crate::model::setting::{CustomField, SettingType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Categories the global library is seeded with.
pub const DEFAULT_CATEGORIES: [&str; 3] = ["世界观", "角色", "道具"];

/// Named color tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingTag {
    pub name: String,
    pub color: String,
}

/// Fields pre-filling a new card created from a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePreset {
    #[serde(rename = "type")]
    pub kind: SettingType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub tags: Vec<SettingTag>,
    pub custom_fields: Vec<CustomField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingTemplate {
    pub id: String,
    pub name: String,
    pub preset: TemplatePreset,
}

/// Library vocabulary. Global and story scopes are persisted independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingLibrary {
    pub tags: Vec<SettingTag>,
    pub categories: Vec<String>,
    pub templates: Vec<SettingTemplate>,
}

impl SettingLibrary {
    /// The library a fresh installation starts with.
    pub fn seeded() -> Self {
        Self {
            tags: Vec::new(),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            templates: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.categories.is_empty() && self.templates.is_empty()
    }

    /// Display-time merge of the global library with a story library.
    ///
    /// Categories keep global order first. Tags (by name) and templates (by id)
    /// prefer the story-scoped entry on conflict.
    pub fn merged(global: &SettingLibrary, story: &SettingLibrary) -> SettingLibrary {
        let story_tag_names: HashSet<&str> =
            story.tags.iter().map(|tag| tag.name.as_str()).collect();
        let mut tags: Vec<SettingTag> = global
            .tags
            .iter()
            .filter(|tag| !story_tag_names.contains(tag.name.as_str()))
            .cloned()
            .collect();
        tags.extend(story.tags.iter().cloned());

        let mut seen = HashSet::new();
        let categories = global
            .categories
            .iter()
            .chain(story.categories.iter())
            .filter(|category| seen.insert(category.as_str()))
            .cloned()
            .collect();

        let story_template_ids: HashSet<&str> = story
            .templates
            .iter()
            .map(|template| template.id.as_str())
            .collect();
        let mut templates: Vec<SettingTemplate> = global
            .templates
            .iter()
            .filter(|template| !story_template_ids.contains(template.id.as_str()))
            .cloned()
            .collect();
        templates.extend(story.templates.iter().cloned());

        SettingLibrary {
            tags,
            categories,
            templates,
        }
    }
}
