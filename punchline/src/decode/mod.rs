//! Structured-response decoder.
//!
//! Turns free-text model output into a value matching a [`Schema`] by trying
//! an ordered chain of pure strategies and stopping at the first success.
//! Decoding never fails: when every strategy comes up empty the schema's
//! fallback value is returned and tagged as such.
//!
//! ```text
//! fenced block ─▶ balanced braces ─▶ field scan ─▶ list markers ─▶ fallback
//!      └──── sanitize + parse + shape check ────┘
//! ```

pub mod extract;
pub mod repair;
pub mod scan;
pub mod shape;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::schema::Schema;

/// Which strategy produced a decoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    FencedBlock,
    BalancedBraces,
    FieldScan,
    ListMarkers,
    Fallback,
}

impl Method {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Method::Fallback)
    }
}

/// A value in the schema's shape, plus how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub value: Value,
    pub method: Method,
}

/// A decoded value converted into a typed record.
#[derive(Debug, Clone)]
pub struct Typed<T> {
    pub value: T,
    pub method: Method,
}

impl<T> Typed<T> {
    pub fn is_fallback(&self) -> bool {
        self.method.is_fallback()
    }
}

type Strategy = fn(&str, &Schema) -> Option<Value>;

const CASCADE: [(Method, Strategy); 4] = [
    (Method::FencedBlock, extract::from_fenced_blocks),
    (Method::BalancedBraces, extract::from_balanced_spans),
    (Method::FieldScan, scan::field_scan),
    (Method::ListMarkers, scan::list_markers),
];

/// Decode `raw` against `schema`.
pub fn decode(raw: &str, schema: &Schema) -> Decoded {
    let decoded = CASCADE
        .iter()
        .find_map(|(method, strategy)| {
            strategy(raw, schema).map(|value| Decoded {
                value,
                method: *method,
            })
        })
        .unwrap_or_else(|| Decoded {
            value: shape::fallback_value(schema, &extract::strip_fences(raw)),
            method: Method::Fallback,
        });

    debug!(schema = schema.name, method = ?decoded.method, "Decoded model output");
    decoded
}

/// Decode and deserialize into `T`.
///
/// A decoded value that still fails to deserialize is replaced by the
/// schema's placeholder value, and failing that by `T::default()`.
pub fn decode_as<T>(raw: &str, schema: &Schema) -> Typed<T>
where
    T: DeserializeOwned + Default,
{
    let decoded = decode(raw, schema);
    match serde_json::from_value::<T>(decoded.value) {
        Ok(value) => Typed {
            value,
            method: decoded.method,
        },
        Err(e) => {
            debug!(schema = schema.name, error = %e, "Decoded value did not deserialize");
            Typed {
                value: serde_json::from_value(shape::fallback_value(schema, ""))
                    .unwrap_or_default(),
                method: Method::Fallback,
            }
        }
    }
}

/// Render a value the way a backend is instructed to reply.
pub fn format_fenced(value: &Value) -> String {
    let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    format!("```json\n{}\n```", body)
}
