//! Export envelopes and import validation.
//!
//! # Responsibility
//! - Wrap project/story snapshots with the application tag and schema version.
//! - Validate incoming envelopes before anything is mutated.
//! - Accept legacy unwrapped payloads and upgrade them through the normalizer.
//!
//! # Invariants
//! - A present `app` tag other than [`APP_ID`] is always rejected.
//! - A `schemaVersion` above [`CURRENT_SCHEMA_VERSION`] is always rejected;
//!   there is no partial forward-compatible import.
//! - Decoded payloads are fully normalized.

use crate::clock::now_rfc3339;
use crate::config::APP_ID;
use crate::db::schema::CURRENT_SCHEMA_VERSION;
use crate::model::story::{ProjectData, Story, Workspace};
use crate::normalize::{normalize_project, normalize_story, normalize_workspace};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Envelope around a whole-project snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedProjectData {
    pub app: String,
    pub schema_version: i64,
    pub exported_at: String,
    pub data: ProjectData,
}

/// Envelope around one story and its workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedStoryData {
    pub app: String,
    pub schema_version: i64,
    pub exported_at: String,
    pub story: Story,
    pub workspace: Workspace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Not produced by this application, or not an envelope at all.
    InvalidSource(String),
    /// Produced by a newer application version.
    VersionTooNew { found: i64, supported: i64 },
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSource(reason) => write!(f, "invalid import source: {reason}"),
            Self::VersionTooNew { found, supported } => write!(
                f,
                "import uses schema version {found}, newer than supported {supported}; upgrade the application first"
            ),
        }
    }
}

impl Error for CodecError {}

pub fn wrap_project(data: ProjectData) -> ExportedProjectData {
    ExportedProjectData {
        app: APP_ID.to_string(),
        schema_version: CURRENT_SCHEMA_VERSION,
        exported_at: now_rfc3339(),
        data,
    }
}

pub fn wrap_story(story: Story, workspace: Workspace) -> ExportedStoryData {
    ExportedStoryData {
        app: APP_ID.to_string(),
        schema_version: CURRENT_SCHEMA_VERSION,
        exported_at: now_rfc3339(),
        story,
        workspace,
    }
}

struct Header<'a> {
    object: &'a Map<String, Value>,
    legacy: bool,
    schema_version: i64,
    exported_at: String,
}

/// Validates and normalizes a project envelope (or a legacy bare `ProjectData`).
pub fn decode_project(raw: &Value) -> Result<ExportedProjectData, CodecError> {
    let header = read_header(raw, "stories")?;
    let payload = if header.legacy {
        raw
    } else {
        header
            .object
            .get("data")
            .filter(|data| data.is_object())
            .ok_or_else(|| CodecError::InvalidSource("envelope has no `data` object".to_string()))?
    };

    let mut data = normalize_project(payload);
    for story in &mut data.stories {
        fill_timestamp(story, &header.exported_at);
    }
    Ok(ExportedProjectData {
        app: APP_ID.to_string(),
        schema_version: header.schema_version,
        exported_at: header.exported_at,
        data,
    })
}

/// Validates and normalizes a story envelope (or a legacy bare `{story, workspace}`).
pub fn decode_story(raw: &Value) -> Result<ExportedStoryData, CodecError> {
    let header = read_header(raw, "story")?;
    let mut story = header
        .object
        .get("story")
        .and_then(normalize_story)
        .ok_or_else(|| CodecError::InvalidSource("story payload has no usable id".to_string()))?;
    fill_timestamp(&mut story, &header.exported_at);
    let workspace = normalize_workspace(header.object.get("workspace").unwrap_or(&Value::Null));

    Ok(ExportedStoryData {
        app: APP_ID.to_string(),
        schema_version: header.schema_version,
        exported_at: header.exported_at,
        story,
        workspace,
    })
}

/// `legacy_marker` is the key a bare (pre-envelope) payload of this kind carries.
fn read_header<'a>(raw: &'a Value, legacy_marker: &str) -> Result<Header<'a>, CodecError> {
    let object = raw
        .as_object()
        .ok_or_else(|| CodecError::InvalidSource("payload is not a JSON object".to_string()))?;

    let legacy = match object.get("app") {
        Some(Value::String(app)) if app == APP_ID => false,
        Some(other) => {
            return Err(CodecError::InvalidSource(format!(
                "unexpected app tag {other}"
            )))
        }
        None if object.get(legacy_marker).is_some_and(|v| !v.is_null()) => true,
        None => {
            return Err(CodecError::InvalidSource(
                "payload has no app tag".to_string(),
            ))
        }
    };

    let schema_version = match object.get("schemaVersion") {
        None | Some(Value::Null) => 0,
        Some(value) => read_schema_version(value)?,
    };
    if schema_version > CURRENT_SCHEMA_VERSION {
        return Err(CodecError::VersionTooNew {
            found: schema_version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    let exported_at = object
        .get("exportedAt")
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(now_rfc3339);

    Ok(Header {
        object,
        legacy,
        schema_version,
        exported_at,
    })
}

/// Numeric schema versions beyond the signed range, or written as floats,
/// still compare against the supported version. Fractions at or below it
/// are malformed.
fn read_schema_version(value: &Value) -> Result<i64, CodecError> {
    if let Some(version) = value.as_i64() {
        return Ok(version);
    }
    if value.as_u64().is_some() {
        return Ok(i64::MAX);
    }
    match value.as_f64() {
        Some(version) if version > CURRENT_SCHEMA_VERSION as f64 => Ok(version.ceil() as i64),
        Some(version) if version.fract() == 0.0 => Ok(version as i64),
        _ => Err(CodecError::InvalidSource(format!(
            "schemaVersion {value} is not an integer"
        ))),
    }
}

fn fill_timestamp(story: &mut Story, fallback: &str) {
    if story.updated_at.trim().is_empty() {
        story.updated_at = fallback.to_string();
    }
}
