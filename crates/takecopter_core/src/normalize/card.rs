//! Setting card normalization.
//!
//! Per card, in order: id dedupe, relations, custom fields, iterations.

use super::{
    claim_unique_id, non_blank_field, optional_string, str_field, string_or_default, Normalize,
};
use crate::model::setting::{
    CustomField, FieldSize, Iteration, Position, ReasonType, Relation, SettingCard, SettingType,
    DEFAULT_CARD_COLOR, DEFAULT_RELATION_TYPE,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Custom fields are laid out on a grid this many columns wide by default.
const FIELD_GRID_COLUMNS: usize = 3;

static NULL: Value = Value::Null;

fn field<'a>(object: &'a Map<String, Value>, key: &str) -> &'a Value {
    object.get(key).unwrap_or(&NULL)
}

impl Normalize for Vec<SettingCard> {
    fn normalize(raw: &Value) -> Self {
        normalize_cards(raw)
    }
}

/// Normalizes a card sequence. Non-object elements are dropped; missing ids
/// are generated from the element index; duplicate ids are suffixed.
pub fn normalize_cards(raw: &Value) -> Vec<SettingCard> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };

    let mut seen_ids = HashSet::new();
    let mut cards = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Some(object) = item.as_object() else {
            continue;
        };
        let fallback_id = format!("card-{}", index + 1);
        let raw_id = non_blank_field(object, "id").unwrap_or(fallback_id.as_str());
        let id = claim_unique_id(&mut seen_ids, raw_id);
        cards.push(normalize_card(id, object));
    }
    cards
}

fn normalize_card(id: String, object: &Map<String, Value>) -> SettingCard {
    let relations = normalize_relations(field(object, "relations"));
    let custom_fields = normalize_custom_fields(field(object, "customFields"));
    let summary_iterations = normalize_iterations(field(object, "summaryIterations"));

    let mut summary = string_or_default(object, "summary", "");
    let active_summary_iteration_id =
        resolve_active(object, "activeSummaryIterationId", &summary_iterations);
    if let Some(active) = active_summary_iteration_id
        .as_deref()
        .and_then(|active_id| summary_iterations.iter().find(|it| it.id == active_id))
    {
        summary = active.value.clone();
    }

    SettingCard {
        id,
        title: string_or_default(object, "title", ""),
        kind: str_field(object, "type")
            .and_then(SettingType::parse)
            .unwrap_or_default(),
        summary,
        content: optional_string(object, "content"),
        image_url: optional_string(object, "imageUrl"),
        category: optional_string(object, "category"),
        color: non_blank_field(object, "color")
            .unwrap_or(DEFAULT_CARD_COLOR)
            .to_string(),
        position: normalize_position(field(object, "position")),
        tags: super::normalize_tags(field(object, "tags")),
        custom_fields,
        relations,
        summary_iterations,
        active_summary_iteration_id,
    }
}

fn normalize_position(raw: &Value) -> Position {
    let Some(object) = raw.as_object() else {
        return Position::default();
    };
    Position {
        x: object.get("x").and_then(Value::as_f64).unwrap_or(0.0),
        y: object.get("y").and_then(Value::as_f64).unwrap_or(0.0),
    }
}

/// Keeps relations with a non-empty `targetId`; blank `type` becomes the
/// default relation label.
pub fn normalize_relations(raw: &Value) -> Vec<Relation> {
    raw.as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|object| {
            let target_id = non_blank_field(object, "targetId")?;
            Some(Relation {
                target_id: target_id.to_string(),
                kind: non_blank_field(object, "type")
                    .unwrap_or(DEFAULT_RELATION_TYPE)
                    .to_string(),
                source_field_id: optional_string(object, "sourceFieldId"),
                target_field_id: optional_string(object, "targetFieldId"),
            })
        })
        .collect()
}

/// Keeps fields that carry a string `name`. Ids, size and grid placement
/// default from the field's position in the output sequence.
pub fn normalize_custom_fields(raw: &Value) -> Vec<CustomField> {
    let mut seen_ids = HashSet::new();
    let mut fields = Vec::new();
    for object in raw
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .filter_map(Value::as_object)
    {
        let Some(name) = str_field(object, "name") else {
            continue;
        };
        let index = fields.len();
        let fallback_id = format!("field-{}", index + 1);
        let raw_id = non_blank_field(object, "id").unwrap_or(fallback_id.as_str());
        let id = claim_unique_id(&mut seen_ids, raw_id);

        let iterations = normalize_iterations(field(object, "iterations"));
        let active_iteration_id = resolve_active(object, "activeIterationId", &iterations);
        let value = active_iteration_id
            .as_deref()
            .and_then(|active_id| iterations.iter().find(|it| it.id == active_id))
            .map(|active| active.value.clone())
            .unwrap_or_else(|| string_or_default(object, "value", ""));

        fields.push(CustomField {
            id,
            name: name.to_string(),
            value,
            size: str_field(object, "size")
                .and_then(FieldSize::parse)
                .unwrap_or_default(),
            x: grid_value(object, "x").unwrap_or((index % FIELD_GRID_COLUMNS) as i64),
            y: grid_value(object, "y").unwrap_or((index / FIELD_GRID_COLUMNS) as i64),
            w: grid_value(object, "w").filter(|w| *w >= 1).unwrap_or(1),
            h: grid_value(object, "h").filter(|h| *h >= 1).unwrap_or(1),
            iterations,
            active_iteration_id,
        });
    }
    fields
}

/// Keeps iterations that carry string `id` and `value`.
pub fn normalize_iterations(raw: &Value) -> Vec<Iteration> {
    let mut seen_ids = HashSet::new();
    raw.as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|object| {
            let raw_id = non_blank_field(object, "id")?;
            let value = str_field(object, "value")?;
            Some(Iteration {
                id: claim_unique_id(&mut seen_ids, raw_id),
                value: value.to_string(),
                version_tag: optional_string(object, "versionTag"),
                reason_type: str_field(object, "reasonType")
                    .and_then(ReasonType::parse)
                    .unwrap_or_default(),
                reason_text: optional_string(object, "reasonText"),
                reason_card_id: optional_string(object, "reasonCardId"),
                created_at: normalize_created_at(object.get("createdAt")),
            })
        })
        .collect()
}

/// Active pointer survives only when it names an existing iteration.
fn resolve_active(
    object: &Map<String, Value>,
    key: &str,
    iterations: &[Iteration],
) -> Option<String> {
    let active_id = non_blank_field(object, key)?;
    iterations
        .iter()
        .any(|iteration| iteration.id == active_id)
        .then(|| active_id.to_string())
}

fn grid_value(object: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = object.get(key)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|v| v.is_finite()).map(|v| v.round() as i64))
}

/// Strings pass through; epoch-millisecond numbers become RFC 3339.
fn normalize_created_at(raw: Option<&Value>) -> String {
    match raw {
        Some(Value::String(value)) => value.clone(),
        Some(Value::Number(number)) => number
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default(),
        _ => String::new(),
    }
}
