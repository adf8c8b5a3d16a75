//! Defensive normalization of untrusted JSON into well-typed entities.
//!
//! # Responsibility
//! - Turn arbitrarily malformed nested JSON (import payloads, legacy rows,
//!   persisted blobs) into values that respect every model invariant.
//!
//! # Invariants
//! - Normalization never fails: bad scalars fall back to documented defaults,
//!   elements missing required fields are dropped from their sequence.
//! - Normalization is idempotent: normalizing the serialized output of a
//!   previous pass yields the same value.
//! - Defaults never depend on wall-clock time or randomness.

mod card;
mod library;
mod project;

pub use card::{normalize_cards, normalize_custom_fields, normalize_iterations, normalize_relations};
pub use library::{normalize_categories, normalize_library, normalize_tags, normalize_templates};
pub use project::{normalize_project, normalize_story, normalize_tree, normalize_workspace};

use serde_json::{Map, Value};
use std::collections::HashSet;

/// Entity kinds that can be rebuilt from untrusted JSON.
pub trait Normalize: Sized {
    fn normalize(raw: &Value) -> Self;
}

/// Returns a string field, or `None` when absent or not a string.
pub(crate) fn str_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}

/// Returns a string field that is non-empty after trimming.
pub(crate) fn non_blank_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    str_field(object, key).filter(|value| !value.trim().is_empty())
}

pub(crate) fn string_or_default(object: &Map<String, Value>, key: &str, default: &str) -> String {
    str_field(object, key).unwrap_or(default).to_string()
}

pub(crate) fn optional_string(object: &Map<String, Value>, key: &str) -> Option<String> {
    non_blank_field(object, key).map(str::to_string)
}

/// Makes `candidate` unique within `seen` and records it.
///
/// The first occurrence is kept as-is; the k-th duplicate becomes
/// `candidate__k`, skipping suffixes that are already taken.
pub(crate) fn claim_unique_id(seen: &mut HashSet<String>, candidate: &str) -> String {
    if seen.insert(candidate.to_string()) {
        return candidate.to_string();
    }
    let mut k = 2usize;
    loop {
        let renamed = format!("{candidate}__{k}");
        if seen.insert(renamed.clone()) {
            return renamed;
        }
        k += 1;
    }
}
