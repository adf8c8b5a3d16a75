//! Wall-clock formatting shared by stories, envelopes and export files.

use chrono::{SecondsFormat, Utc};

/// Current UTC time as RFC 3339 with second precision, e.g. `2024-05-01T08:00:00Z`.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current UTC time for file names, e.g. `20240501-080000`.
pub fn file_stamp() -> String {
    Utc::now().format("%Y%m%d-%H%M%S").to_string()
}

/// Current UTC time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
