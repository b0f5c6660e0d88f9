//! Turns whatever shape the provider returned into an ordered list of
//! `{role, message}` turns.
//!
//! Field lookup is table-driven: each logical attribute has an ordered list of
//! candidate keys and the first one holding usable data wins.

use serde_json::Value;

use crate::models::transcript::TranscriptTurn;

/// Top-level keys that may hold the transcript, in priority order.
pub const TRANSCRIPT_KEYS: &[&str] = &["transcript", "messages", "turns", "conversation"];
/// Keys that may name the speaker of a turn.
pub const ROLE_FIELDS: &[&str] = &["role", "speaker"];
/// Keys that may hold the text of a turn.
pub const TEXT_FIELDS: &[&str] = &["message", "text", "content", "value"];

const UNKNOWN_ROLE: &str = "unknown";
/// Longest label accepted as a `ROLE: text` prefix in plain-string transcripts.
const MAX_INLINE_ROLE_LEN: usize = 24;

/// Normalizes a raw provider payload into transcript turns.
///
/// Accepts an object carrying one of [`TRANSCRIPT_KEYS`], a bare array of turns,
/// or a bare string. Turns with no text after trimming are dropped. Normalizing
/// already-normalized output returns it unchanged.
pub fn normalize(raw: &Value) -> Vec<TranscriptTurn> {
    match raw {
        Value::Object(map) => TRANSCRIPT_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find(|v| v.is_array() || v.is_string())
            .map(normalize_body)
            .unwrap_or_default(),
        Value::Array(_) | Value::String(_) => normalize_body(raw),
        _ => Vec::new(),
    }
}

/// True when the payload carries any transcript key, even an empty one.
pub fn has_transcript_field(raw: &Value) -> bool {
    raw.as_object()
        .map(|map| TRANSCRIPT_KEYS.iter().any(|key| map.contains_key(*key)))
        .unwrap_or(false)
}

/// The provider's own summary of the call (`analysis.transcript_summary`), if non-blank.
pub fn transcript_summary(raw: &Value) -> Option<String> {
    raw.pointer("/analysis/transcript_summary")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Call length in seconds (`metadata.call_duration_secs`), if reported.
pub fn call_duration_secs(raw: &Value) -> Option<f64> {
    raw.pointer("/metadata/call_duration_secs")
        .and_then(Value::as_f64)
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
}

fn normalize_body(body: &Value) -> Vec<TranscriptTurn> {
    match body {
        Value::Array(items) => items.iter().filter_map(normalize_item).collect(),
        Value::String(text) => text.lines().filter_map(parse_inline_turn).collect(),
        _ => Vec::new(),
    }
}

fn normalize_item(item: &Value) -> Option<TranscriptTurn> {
    match item {
        Value::Object(_) => {
            let message = first_text(item, TEXT_FIELDS)?;
            let role = first_text(item, ROLE_FIELDS).unwrap_or(UNKNOWN_ROLE);
            Some(TranscriptTurn::new(role, message))
        }
        Value::String(line) => parse_inline_turn(line),
        _ => None,
    }
}

/// Resolves the first field in `fields` holding a non-blank string.
fn first_text<'a>(item: &'a Value, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .filter_map(|field| item.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Parses `ROLE: text` lines; lines without a recognizable label keep the
/// whole line as text under the unknown role.
fn parse_inline_turn(line: &str) -> Option<TranscriptTurn> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some((label, rest)) = line.split_once(':') {
        let label = label.trim();
        let rest = rest.trim();
        let is_label = !label.is_empty()
            && label.len() <= MAX_INLINE_ROLE_LEN
            && !label.contains(char::is_whitespace);
        if is_label {
            if rest.is_empty() {
                return None;
            }
            return Some(TranscriptTurn::new(label.to_lowercase(), rest));
        }
    }

    Some(TranscriptTurn::new(UNKNOWN_ROLE, line))
}
