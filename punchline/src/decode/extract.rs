//! Locating candidate structured text inside free-form model output.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use super::shape::parse_conforming;
use crate::schema::Schema;

/// A fenced block with an optional language tag; group 1 is the interior.
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```[A-Za-z0-9_+\-]*[ \t]*\r?\n?([\s\S]*?)```").expect("fence pattern compiles")
});

/// An opening or closing fence marker, tag included.
static FENCE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_+\-]*").expect("fence marker pattern compiles"));

/// Interiors of all fenced code blocks, in document order.
///
/// Accepts blocks with or without a language tag, and single-line blocks.
pub fn fenced_blocks(text: &str) -> Vec<&str> {
    FENCE_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|block| !block.is_empty())
        .collect()
}

/// Top-level bracketed spans (`{...}` or `[...]`) in document order.
///
/// Brackets are matched by depth counting; brackets inside string literals
/// do not count. An opener without a matching closer yields nothing.
pub fn balanced_spans(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = bytes[cursor..].iter().position(|b| *b == b'{' || *b == b'[') {
        let start = cursor + offset;
        match matching_close(bytes, start) {
            Some(end) => {
                spans.push(&text[start..=end]);
                cursor = end + 1;
            }
            None => cursor = start + 1,
        }
        if cursor >= bytes.len() {
            break;
        }
    }

    spans
}

/// Index of the bracket closing the one at `start`.
fn matching_close(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Text with fence markers removed, for wrapping as a last resort.
pub fn strip_fences(text: &str) -> String {
    FENCE_MARKER_RE.replace_all(text, "").trim().to_string()
}

/// First fenced block that parses into the expected shape.
pub fn from_fenced_blocks(text: &str, schema: &Schema) -> Option<Value> {
    fenced_blocks(text).into_iter().find_map(|block| {
        parse_conforming(block, schema).or_else(|| {
            balanced_spans(block)
                .into_iter()
                .find_map(|span| parse_conforming(span, schema))
        })
    })
}

/// First bracket-matched span in the raw text that parses into the expected shape.
pub fn from_balanced_spans(text: &str, schema: &Schema) -> Option<Value> {
    balanced_spans(text)
        .into_iter()
        .find_map(|span| parse_conforming(span, schema))
}
