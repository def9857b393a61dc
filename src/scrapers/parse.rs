//! Decoding of captured API bodies into comment records.
//!
//! Decoding is split in two steps: [`decode_body`] turns raw response text
//! into an untyped JSON document, and [`parse`] maps that document onto
//! [`CommentRecord`]s using the default table in [`crate::models::comment`].
//!
//! Coercion rules, applied per field:
//!
//! | raw value             | text fields          | `rating`                   |
//! |-----------------------|----------------------|----------------------------|
//! | string                | verbatim             | parsed after trimming      |
//! | integer               | stringified          | verbatim                   |
//! | float                 | stringified          | truncated toward zero      |
//! | bool                  | stringified          | default                    |
//! | null / missing / other| default              | default                    |
//!
//! `body` is trimmed after coercion. Out-of-range ratings are kept as-is.

use serde_json::Value;

use crate::error::ScrapeError;
use crate::models::comment::{AUTHOR, BODY, POSTED_AT, RATING, REGION, VARIANT};
use crate::models::{CommentRecord, FieldSpec, DEFAULT_RATING};

/// Key holding the list of comments in each API response.
pub const COMMENTS_KEY: &str = "comments";

/// Decode a captured response body into an untyped JSON document.
///
/// JSONP envelopes such as `fetchJSON_comment98({...});` are unwrapped.
pub fn decode_body(text: &str) -> Result<Value, ScrapeError> {
    let text = text.trim_start_matches('\u{feff}').trim();
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(err) => match strip_jsonp(text) {
            Some(inner) => serde_json::from_str(inner).map_err(|e| {
                ScrapeError::UnexpectedShape(format!("JSONP payload is not valid JSON: {}", e))
            }),
            None => Err(ScrapeError::UnexpectedShape(format!(
                "response body is not JSON: {}",
                err
            ))),
        },
    }
}

/// Extract the argument of a `callback(...)` wrapper.
fn strip_jsonp(text: &str) -> Option<&str> {
    let open = text.find('(')?;
    let callback = text[..open].trim();
    let is_identifier = !callback.is_empty()
        && callback
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'));
    if !is_identifier {
        return None;
    }
    text[open + 1..]
        .trim_end()
        .trim_end_matches(';')
        .trim_end()
        .strip_suffix(')')
}

/// Map one API document onto comment records.
///
/// A missing (or non-list) `comments` key yields an empty list, which callers
/// treat as end of data rather than a failure.
pub fn parse(payload: &Value) -> Result<Vec<CommentRecord>, ScrapeError> {
    let document = payload.as_object().ok_or_else(|| {
        ScrapeError::UnexpectedShape(format!(
            "expected a JSON object, got {}",
            json_type_name(payload)
        ))
    })?;

    let records = document
        .get(COMMENTS_KEY)
        .and_then(Value::as_array)
        .map(|items| items.iter().map(coerce_comment).collect())
        .unwrap_or_default();

    Ok(records)
}

/// Build one record from a raw comment item, applying defaults.
pub fn coerce_comment(item: &Value) -> CommentRecord {
    CommentRecord {
        author_display_name: coerce_text(item, &AUTHOR),
        region: coerce_text(item, &REGION),
        posted_at: coerce_text(item, &POSTED_AT),
        variant_label: coerce_text(item, &VARIANT),
        body: coerce_text(item, &BODY).trim().to_string(),
        rating: coerce_rating(item.get(RATING.source_key)),
    }
}

fn coerce_text(item: &Value, field: &FieldSpec) -> String {
    match item.get(field.source_key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => field.default.to_string(),
    }
}

fn coerce_rating(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(DEFAULT_RATING),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(DEFAULT_RATING),
        _ => DEFAULT_RATING,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
