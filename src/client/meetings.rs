//! Display fields derived from loosely structured meeting records.
//!
//! Every field on an upstream meeting may be missing or shaped differently
//! from one record to the next, so each derivation falls back step by step
//! and never fails.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;

/// Label languages in order of preference.
pub const LABEL_LANGUAGES: [&str; 2] = ["en", "fr"];

/// Used when a meeting carries no locality reference.
pub const DEFAULT_LOCATION: &str = "Strasbourg";

const STRASBOURG_CODE: &str = "FRA_SXB";
const PLENARY_SITTING: &str = "def/ep-activities/PLENARY_SITTING";

/// Offset used when fewer meetings exist than the window holds.
pub const FALLBACK_OFFSET: u64 = 0;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MeetingSummary {
    pub id: String,
    pub title: String,
    pub date: String,
    pub location: String,
    pub activity_type: String,
}

impl MeetingSummary {
    pub fn from_value(meeting: &Value) -> Self {
        Self {
            id: meeting_id(meeting),
            title: meeting_title(meeting),
            date: meeting_date(meeting)
                .map(|raw| format_long_date(&raw))
                .unwrap_or_default(),
            location: meeting_location(meeting),
            activity_type: meeting
                .get("had_activity_type")
                .and_then(literal)
                .map(|raw| activity_type_label(&raw))
                .unwrap_or_default(),
        }
    }
}

/// Offset of the last `window` meetings out of `total`.
pub fn window_offset(total: u64, window: u64) -> u64 {
    if total > window {
        total - window
    } else {
        FALLBACK_OFFSET
    }
}

/// Plain string of a JSON-LD literal: either a bare string or `{"@value": ...}`.
pub(crate) fn literal(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("@value").and_then(literal),
        Value::Array(items) => items.iter().find_map(literal),
        _ => None,
    }
}

/// Localized label from a `{lang: text}` map, preferring [`LABEL_LANGUAGES`].
pub(crate) fn localized(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            let non_empty = |v: &Value| literal(v).filter(|label| !label.trim().is_empty());
            LABEL_LANGUAGES
                .iter()
                .find_map(|lang| map.get(*lang).and_then(non_empty))
                .or_else(|| map.values().find_map(non_empty))
        }
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

pub fn meeting_id(meeting: &Value) -> String {
    ["activity_id", "identifier", "id"]
        .iter()
        .find_map(|key| meeting.get(*key).and_then(literal))
        .map(|id| id.rsplit('/').next().unwrap_or(id.as_str()).to_string())
        .unwrap_or_default()
}

fn meeting_date(meeting: &Value) -> Option<String> {
    ["activity_date", "activity_start_date", "date"]
        .iter()
        .find_map(|key| meeting.get(*key).and_then(literal))
}

pub fn meeting_title(meeting: &Value) -> String {
    meeting
        .get("activity_label")
        .and_then(localized)
        .or_else(|| meeting_date(meeting).map(|raw| format_long_date(&raw)))
        .unwrap_or_default()
}

pub fn meeting_location(meeting: &Value) -> String {
    let Some(reference) = meeting.get("hasLocality").and_then(|locality| match locality {
        Value::Object(map) => map.get("id").and_then(literal),
        other => literal(other),
    }) else {
        return DEFAULT_LOCATION.to_string();
    };

    let code = reference
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    match code {
        "" => DEFAULT_LOCATION.to_string(),
        STRASBOURG_CODE => "Strasbourg".to_string(),
        other => other.replace('_', "-"),
    }
}

/// Long calendar form (`20 January 2025`); unparseable input comes back as is.
pub fn format_long_date(raw: &str) -> String {
    let trimmed = raw.trim();
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(trimmed).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        });

    match date {
        Some(date) => date.format("%-d %B %Y").to_string(),
        None => raw.to_string(),
    }
}

pub fn activity_type_label(raw: &str) -> String {
    match raw {
        PLENARY_SITTING => "Plenary sitting".to_string(),
        other => other.to_string(),
    }
}
