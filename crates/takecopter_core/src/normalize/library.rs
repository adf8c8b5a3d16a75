//! Library vocabulary normalization (tags, categories, templates).

use super::{non_blank_field, normalize_custom_fields, optional_string, Normalize};
use crate::model::library::{SettingLibrary, SettingTag, SettingTemplate, TemplatePreset};
use crate::model::setting::SettingType;
use serde_json::Value;
use std::collections::HashSet;

impl Normalize for SettingLibrary {
    fn normalize(raw: &Value) -> Self {
        normalize_library(raw)
    }
}

/// Non-object input yields an empty library.
pub fn normalize_library(raw: &Value) -> SettingLibrary {
    let Some(object) = raw.as_object() else {
        return SettingLibrary::default();
    };
    SettingLibrary {
        tags: normalize_tags(object.get("tags").unwrap_or(&Value::Null)),
        categories: normalize_categories(object.get("categories").unwrap_or(&Value::Null)),
        templates: normalize_templates(object.get("templates").unwrap_or(&Value::Null)),
    }
}

/// Tags missing a `name` or a `color` are dropped.
pub fn normalize_tags(raw: &Value) -> Vec<SettingTag> {
    raw.as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|object| {
            let name = non_blank_field(object, "name")?;
            let color = non_blank_field(object, "color")?;
            Some(SettingTag {
                name: name.trim().to_string(),
                color: color.to_string(),
            })
        })
        .collect()
}

/// Trimmed, non-empty, first occurrence wins.
pub fn normalize_categories(raw: &Value) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|category| !category.is_empty())
        .filter(|category| seen.insert(category.to_string()))
        .map(str::to_string)
        .collect()
}

/// Templates need an `id` and a `name`; a later template reusing an id is dropped.
pub fn normalize_templates(raw: &Value) -> Vec<SettingTemplate> {
    let mut seen = HashSet::new();
    raw.as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|object| {
            let id = non_blank_field(object, "id")?;
            let name = non_blank_field(object, "name")?;
            if !seen.insert(id.to_string()) {
                return None;
            }
            Some(SettingTemplate {
                id: id.to_string(),
                name: name.to_string(),
                preset: normalize_preset(object.get("preset").unwrap_or(&Value::Null)),
            })
        })
        .collect()
}

fn normalize_preset(raw: &Value) -> TemplatePreset {
    let Some(object) = raw.as_object() else {
        return TemplatePreset::default();
    };
    TemplatePreset {
        kind: object
            .get("type")
            .and_then(Value::as_str)
            .and_then(SettingType::parse)
            .unwrap_or_default(),
        summary: optional_string(object, "summary"),
        content: optional_string(object, "content"),
        image_url: optional_string(object, "imageUrl"),
        category: optional_string(object, "category"),
        tags: normalize_tags(object.get("tags").unwrap_or(&Value::Null)),
        custom_fields: normalize_custom_fields(object.get("customFields").unwrap_or(&Value::Null)),
        color: optional_string(object, "color"),
    }
}
