//! Harvested records and the raw API shapes they are decoded from
//!
//! # Components
//!
//! - `ContentItem`: a note taken from a timeline or search page
//! - `Comment` / `CommentBatch`: comment thread pages for one note
//! - `CreatorProfile`: profile details for a harvested creator

mod comment;
mod content;
mod creator;

pub use comment::{Comment, CommentBatch, RawComment};
pub use content::{Card, ContentItem, MediaRef, Mblog, RawUser, NOTE_CARD_TYPE, PINNED_MARKER};
pub use creator::CreatorProfile;

use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<.*?>").expect("static regex"));

/// Removes markup tags from rich text bodies
pub fn strip_tags(text: &str) -> String {
    TAG_RE.replace_all(text, "").into_owned()
}

/// Parses the platform's `created_at` format into unix seconds
///
/// The mobile API uses `Sat Dec 23 15:40:00 +0800 2023`; RFC 2822 is accepted too.
pub fn parse_created_at(raw: &str) -> Option<i64> {
    DateTime::parse_from_str(raw.trim(), "%a %b %d %H:%M:%S %z %Y")
        .or_else(|_| DateTime::parse_from_rfc2822(raw.trim()))
        .ok()
        .map(|dt| dt.timestamp())
}

/// Renders a JSON scalar the way ids and counters are stored
///
/// Counters arrive as numbers or as display strings ("100万+").
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn count_text(value: &Value) -> String {
    match value_to_string(value) {
        s if s.is_empty() => "0".to_string(),
        s => s,
    }
}

/// Deserializes ids that arrive either as strings or as numbers
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_string(&value))
}
