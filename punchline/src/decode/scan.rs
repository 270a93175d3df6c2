//! Regex-driven recovery for output that never parses as a whole.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use super::shape::{coerce, record_from_text};
use crate::schema::{FieldKind, FieldSpec, Schema, Shape};

const QUOTED: &str = r#"(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)')"#;

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(QUOTED).expect("quoted string pattern compiles"));

/// Numbered, bulleted or labelled list item; group 1 is the item body.
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:\d+\s*[.):]|[*\-•]|(?:joke|idea|observation|angle)\s*#?\d+\s*[:.)]|#\d+\s*:?)\s*(.+)$",
    )
    .expect("list marker pattern compiles")
});

/// Assemble records from `"field": "value"` fragments found anywhere in the text.
///
/// The i-th match of every field forms record i; records missing a required
/// field are dropped and optional fields fall back to their defaults.
pub fn field_scan(text: &str, schema: &Schema) -> Option<Value> {
    if schema.shape == Shape::StringList {
        return None;
    }

    let columns: Vec<(&FieldSpec, Vec<Value>)> = schema
        .fields
        .iter()
        .map(|spec| (spec, scan_field(text, spec)))
        .collect();

    let identifying = schema.identifying_field()?;
    let rows = columns
        .iter()
        .find(|(spec, _)| spec.name == identifying.name)
        .map(|(_, values)| values.len())?;

    let records: Vec<Value> = (0..rows)
        .filter_map(|i| {
            let mut raw = Map::new();
            for (spec, values) in &columns {
                if let Some(value) = values.get(i) {
                    raw.insert(spec.name.to_string(), value.clone());
                }
            }
            super::shape::conform_record(&raw, schema).map(Value::Object)
        })
        .collect();

    match schema.shape {
        Shape::Record => records.into_iter().next(),
        _ if records.is_empty() => None,
        _ => Some(Value::Array(records)),
    }
}

fn scan_field(text: &str, spec: &FieldSpec) -> Vec<Value> {
    let key = format!(
        r#"(?:^|[^A-Za-z0-9_])["']?{}["']?\s*:\s*"#,
        regex::escape(spec.name)
    );

    let pattern = match spec.kind {
        FieldKind::Text => format!("{}{}", key, QUOTED),
        FieldKind::TextList => format!(r"{}\[([^\]]*)\]", key),
        FieldKind::Number => format!(r#"{}"?(-?\d+(?:\.\d+)?)"#, key),
    };

    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };

    re.captures_iter(text)
        .filter_map(|caps| {
            let raw = match spec.kind {
                FieldKind::Text => Value::String(unescape(caps.get(1).or(caps.get(2))?.as_str())),
                FieldKind::TextList => Value::Array(
                    quoted_items(caps.get(1)?.as_str())
                        .into_iter()
                        .map(Value::String)
                        .collect(),
                ),
                FieldKind::Number => Value::String(caps.get(1)?.as_str().to_string()),
            };
            coerce(spec.kind, &raw)
        })
        .collect()
}

fn quoted_items(list: &str) -> Vec<String> {
    QUOTED_RE
        .captures_iter(list)
        .filter_map(|caps| caps.get(1).or(caps.get(2)))
        .map(|m| unescape(m.as_str()))
        .collect()
}

fn unescape(fragment: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", fragment))
        .unwrap_or_else(|_| fragment.replace("\\'", "'"))
}

/// Split numbered (`1.`, `2)`), bulleted (`*`, `-`, `•`) or labelled
/// (`Joke 1:`, `#2:`) lines into items.
///
/// Unmarked lines directly under an item continue it; a blank line ends it.
/// Only applies to schemas that can be built from bare text.
pub fn list_markers(text: &str, schema: &Schema) -> Option<Value> {
    if schema.shape == Shape::Record || !schema.accepts_bare_text() {
        return None;
    }

    let mut items: Vec<String> = Vec::new();
    let mut open = false;

    for line in text.lines() {
        if let Some(caps) = MARKER_RE.captures(line) {
            if let Some(body) = caps.get(1) {
                items.push(clean_item(body.as_str()));
                open = true;
            }
        } else if line.trim().is_empty() {
            open = false;
        } else if open {
            if let Some(last) = items.last_mut() {
                last.push(' ');
                last.push_str(&clean_item(line));
            }
        }
    }

    let items: Vec<String> = items.into_iter().filter(|s| !s.is_empty()).collect();
    if items.is_empty() {
        return None;
    }

    match schema.shape {
        Shape::StringList => Some(Value::Array(items.into_iter().map(Value::String).collect())),
        _ => {
            let records: Vec<Value> = items
                .iter()
                .filter_map(|item| record_from_text(schema, item))
                .collect();
            (!records.is_empty()).then_some(Value::Array(records))
        }
    }
}

fn clean_item(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(',')
        .trim_matches(|c| c == '"' || c == '\'' || c == '*')
        .trim()
        .to_string()
}
