//! Detail-page markup adapter
//!
//! The note detail endpoint answers with an HTML document rather than JSON.
//! The note itself lives in an inline script as
//! `var $render_data = [{...}][0] || {};`; this module digs it out and hands
//! back the embedded `status` object.

use crate::model::Mblog;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

static RENDER_DATA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)var \$render_data = (\[.*?\])\[0\]").expect("static regex"));

/// Extracts the first element of the inline `$render_data` array
///
/// Script bodies are searched first; the whole document is scanned as a
/// fallback for pages whose script tags do not parse cleanly.
pub fn extract_render_data(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);

    if let Ok(selector) = Selector::parse("script") {
        for script in document.select(&selector) {
            let body: String = script.text().collect();
            if let Some(data) = parse_render_data(&body) {
                return Some(data);
            }
        }
    }

    parse_render_data(html)
}

fn parse_render_data(text: &str) -> Option<Value> {
    let captures = RENDER_DATA_RE.captures(text)?;
    let raw = captures.get(1)?.as_str();

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(mut items)) if !items.is_empty() => Some(items.swap_remove(0)),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Render data is not valid JSON: {}", e);
            None
        }
    }
}

/// Extracts the note embedded in a detail page
///
/// # Returns
///
/// * `Some(Mblog)` - The page carried a `status` object
/// * `None` - The page has no render data (deleted note, login wall)
pub fn extract_note_detail(html: &str) -> Option<Mblog> {
    let status = extract_render_data(html)?.get("status")?.clone();

    match serde_json::from_value(status) {
        Ok(mblog) => Some(mblog),
        Err(e) => {
            tracing::warn!("Detail page status did not decode: {}", e);
            None
        }
    }
}
