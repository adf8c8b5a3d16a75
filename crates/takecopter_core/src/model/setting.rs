//! Setting card model.
//!
//! # Invariants
//! - Card ids are unique within one workspace.
//! - When `active_iteration_id` is set, `CustomField::value` equals that
//!   iteration's value (same for card summaries).
//! - Iteration history is append-only; selecting a version moves a pointer.

use crate::model::library::SettingTag;
use serde::{Deserialize, Serialize};

/// Default relation label.
pub const DEFAULT_RELATION_TYPE: &str = "关联";
/// Default card accent color.
pub const DEFAULT_CARD_COLOR: &str = "var(--coral-400)";

/// Card category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingType {
    #[default]
    Character,
    Location,
    Item,
    Event,
}

impl SettingType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "character" => Some(Self::Character),
            "location" => Some(Self::Location),
            "item" => Some(Self::Item),
            "event" => Some(Self::Event),
            _ => None,
        }
    }
}

/// Display size of a custom field tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSize {
    Sm,
    #[default]
    Md,
    Lg,
}

impl FieldSize {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sm" => Some(Self::Sm),
            "md" => Some(Self::Md),
            "lg" => Some(Self::Lg),
            _ => None,
        }
    }
}

/// Why an iteration was recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonType {
    #[default]
    Manual,
    /// Triggered by another card (see `Iteration::reason_card_id`).
    Card,
}

impl ReasonType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(Self::Manual),
            "card" => Some(Self::Card),
            _ => None,
        }
    }
}

/// Canvas coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// One historical version of a field or summary value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Iteration {
    pub id: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_tag: Option<String>,
    pub reason_type: ReasonType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_card_id: Option<String>,
    /// RFC 3339 timestamp; empty when the source never recorded one.
    pub created_at: String,
}

/// User-defined attribute on a card, laid out on a small grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomField {
    pub id: String,
    pub name: String,
    pub value: String,
    pub size: FieldSize,
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
    pub iterations: Vec<Iteration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_iteration_id: Option<String>,
}

/// Directed edge from a card (or one of its fields) to another card (or field).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub target_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_field_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_field_id: Option<String>,
}

/// Structured note about a character, location, item or event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingCard {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: SettingType,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub color: String,
    pub position: Position,
    pub tags: Vec<SettingTag>,
    pub custom_fields: Vec<CustomField>,
    pub relations: Vec<Relation>,
    pub summary_iterations: Vec<Iteration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_summary_iteration_id: Option<String>,
}

impl SettingCard {
    /// Creates an empty card of the given type.
    pub fn new(id: impl Into<String>, kind: SettingType, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind,
            summary: String::new(),
            content: None,
            image_url: None,
            category: None,
            color: DEFAULT_CARD_COLOR.to_string(),
            position: Position::default(),
            tags: Vec::new(),
            custom_fields: Vec::new(),
            relations: Vec::new(),
            summary_iterations: Vec::new(),
            active_summary_iteration_id: None,
        }
    }

    /// Returns the currently selected summary iteration, if any.
    pub fn active_summary_iteration(&self) -> Option<&Iteration> {
        let active_id = self.active_summary_iteration_id.as_deref()?;
        self.summary_iterations
            .iter()
            .find(|iteration| iteration.id == active_id)
    }
}

impl CustomField {
    /// Returns the currently selected iteration, if any.
    pub fn active_iteration(&self) -> Option<&Iteration> {
        let active_id = self.active_iteration_id.as_deref()?;
        self.iterations
            .iter()
            .find(|iteration| iteration.id == active_id)
    }
}

/// Removes one card and prunes every relation that pointed at it.
///
/// Returns the removed card, or `None` when no card has `card_id`.
pub fn remove_card(cards: &mut Vec<SettingCard>, card_id: &str) -> Option<SettingCard> {
    let index = cards.iter().position(|card| card.id == card_id)?;
    let removed = cards.remove(index);
    for card in cards.iter_mut() {
        card.relations.retain(|relation| relation.target_id != card_id);
    }
    Some(removed)
}

/// Resolves a relation target within one workspace by id lookup.
///
/// Dangling targets (deleted cards, cards of other stories) resolve to `None`
/// and are skipped by callers at render time.
pub fn resolve_relation<'a>(
    cards: &'a [SettingCard],
    relation: &Relation,
) -> Option<&'a SettingCard> {
    cards.iter().find(|card| card.id == relation.target_id)
}
