//! Shape checking against a [`Schema`], and fallback construction.

use serde_json::{Map, Number, Value};

use super::repair::sanitize;
use crate::schema::{Fallback, FieldKind, FieldSpec, Schema, Shape};

/// Parse `candidate` (as-is, then sanitized) and accept it only if it conforms.
pub fn parse_conforming(candidate: &str, schema: &Schema) -> Option<Value> {
    let attempt = |text: &str| {
        serde_json::from_str::<Value>(text)
            .ok()
            .and_then(|value| conform(value, schema))
    };

    attempt(candidate).or_else(|| attempt(&sanitize(candidate)))
}

/// Normalize a parsed value into the schema's shape, or reject it.
///
/// A structurally valid empty list is accepted as-is.
pub fn conform(value: Value, schema: &Schema) -> Option<Value> {
    match schema.shape {
        Shape::StringList => conform_strings(value, schema),
        Shape::Record => conform_single(value, schema),
        Shape::RecordList => conform_list(value, schema),
    }
}

fn conform_strings(value: Value, schema: &Schema) -> Option<Value> {
    match value {
        Value::Array(items) => string_items(items),
        Value::Object(mut map) => {
            if let Some(inner) = schema.wrapper_key.and_then(|key| take_field(&mut map, key)) {
                return match inner {
                    Value::Array(items) => string_items(items),
                    _ => None,
                };
            }
            let mut lists = map.into_iter().filter_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            });
            let only = lists.next()?;
            if lists.next().is_some() {
                return None;
            }
            string_items(only)
        }
        _ => None,
    }
}

fn string_items(items: Vec<Value>) -> Option<Value> {
    if items.is_empty() {
        return Some(Value::Array(Vec::new()));
    }

    let strings: Vec<Value> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => {
                let mut texts = map.into_iter().filter_map(|(_, v)| scalar_text(&v));
                let only = texts.next()?;
                texts.next().is_none().then_some(only)
            }
            other => scalar_text(&other),
        })
        .map(Value::String)
        .collect();

    (!strings.is_empty()).then_some(Value::Array(strings))
}

fn conform_single(value: Value, schema: &Schema) -> Option<Value> {
    match value {
        Value::Object(map) => {
            if let Some(record) = conform_record(&map, schema) {
                return Some(Value::Object(record));
            }
            // `{"rubric": {...}}`
            let mut nested = map.into_iter().filter_map(|(_, v)| match v {
                Value::Object(inner) => Some(inner),
                _ => None,
            });
            let only = nested.next()?;
            if nested.next().is_some() {
                return None;
            }
            conform_record(&only, schema).map(Value::Object)
        }
        Value::Array(items) => items.into_iter().find_map(|item| match item {
            Value::Object(map) => conform_record(&map, schema).map(Value::Object),
            _ => None,
        }),
        _ => None,
    }
}

fn conform_list(value: Value, schema: &Schema) -> Option<Value> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            match schema.wrapper_key.and_then(|key| take_field(&mut map, key)) {
                Some(Value::Array(items)) => items,
                Some(Value::Object(inner)) => vec![Value::Object(inner)],
                Some(_) => return None,
                None => {
                    let identifying = schema.identifying_field()?.name;
                    if lookup(&map, identifying).is_some() {
                        vec![Value::Object(map)]
                    } else {
                        return None;
                    }
                }
            }
        }
        _ => return None,
    };

    if items.is_empty() {
        return Some(Value::Array(Vec::new()));
    }

    let records: Vec<Value> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => conform_record(&map, schema).map(Value::Object),
            Value::String(text) if schema.accepts_bare_text() => record_from_text(schema, &text),
            _ => None,
        })
        .collect();

    (!records.is_empty()).then_some(Value::Array(records))
}

/// Build a record holding exactly the schema's fields.
pub fn conform_record(map: &Map<String, Value>, schema: &Schema) -> Option<Map<String, Value>> {
    let mut record = Map::new();

    for spec in schema.fields {
        match lookup(map, spec.name).and_then(|v| coerce(spec.kind, v)) {
            Some(value) => {
                record.insert(spec.name.to_string(), value);
            }
            None if spec.required => return None,
            None => {
                record.insert(spec.name.to_string(), default_value(spec));
            }
        }
    }

    Some(record)
}

/// A record whose text field is `text` and whose other fields are defaults.
pub fn record_from_text(schema: &Schema, text: &str) -> Option<Value> {
    let field = schema.text_field?;
    let text = text.trim();
    if text.is_empty() || !schema.accepts_bare_text() {
        return None;
    }

    let mut record = Map::new();
    for spec in schema.fields {
        let value = if spec.name == field {
            Value::String(text.to_string())
        } else {
            default_value(spec)
        };
        record.insert(spec.name.to_string(), value);
    }
    Some(Value::Object(record))
}

/// The schema's last-resort value.
///
/// Non-empty prose is wrapped as a single record (or item) when the schema can
/// hold bare text; otherwise the schema's literal placeholders are returned.
pub fn fallback_value(schema: &Schema, cleaned: &str) -> Value {
    let cleaned = cleaned.trim();
    let looks_structured = cleaned.starts_with('{') || cleaned.starts_with('[');

    if !cleaned.is_empty() && !looks_structured {
        let wrapped = match schema.shape {
            Shape::StringList => Some(Value::Array(vec![Value::String(cleaned.to_string())])),
            Shape::Record => record_from_text(schema, cleaned),
            Shape::RecordList => record_from_text(schema, cleaned).map(|r| Value::Array(vec![r])),
        };
        if let Some(value) = wrapped {
            return value;
        }
    }

    placeholder_value(schema)
}

fn placeholder_value(schema: &Schema) -> Value {
    match schema.fallback {
        Fallback::Strings(items) => Value::Array(
            items
                .iter()
                .map(|s| Value::String((*s).to_string()))
                .collect(),
        ),
        Fallback::Record(pairs) => {
            let mut record = Map::new();
            for spec in schema.fields {
                let value = match pairs.iter().find(|(name, _)| *name == spec.name) {
                    Some((_, literal)) => literal_value(spec.kind, literal),
                    None => default_value(spec),
                };
                record.insert(spec.name.to_string(), value);
            }
            match schema.shape {
                Shape::RecordList => Value::Array(vec![Value::Object(record)]),
                _ => Value::Object(record),
            }
        }
    }
}

/// Default for an absent field; lists are `|`-separated in the descriptor.
fn default_value(spec: &FieldSpec) -> Value {
    literal_value(spec.kind, spec.default.unwrap_or_default())
}

fn literal_value(kind: FieldKind, literal: &str) -> Value {
    match kind {
        FieldKind::Text => Value::String(literal.to_string()),
        FieldKind::TextList => Value::Array(
            literal
                .split('|')
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        ),
        FieldKind::Number => leading_number(literal)
            .and_then(number_value)
            .unwrap_or_else(|| Value::Number(0.into())),
    }
}

/// Convert a raw field value into the kind the schema wants.
pub fn coerce(kind: FieldKind, value: &Value) -> Option<Value> {
    match kind {
        FieldKind::Text => match value {
            Value::Array(items) => {
                let joined = items
                    .iter()
                    .filter_map(scalar_text)
                    .collect::<Vec<_>>()
                    .join(", ");
                (!joined.is_empty()).then_some(Value::String(joined))
            }
            other => scalar_text(other).map(Value::String),
        },
        FieldKind::TextList => match value {
            Value::Array(items) => {
                let texts: Vec<Value> = items
                    .iter()
                    .filter_map(scalar_text)
                    .map(Value::String)
                    .collect();
                (!texts.is_empty()).then_some(Value::Array(texts))
            }
            other => scalar_text(other).map(|s| Value::Array(vec![Value::String(s)])),
        },
        FieldKind::Number => match value {
            Value::Number(n) => Some(Value::Number(n.clone())),
            Value::String(s) => leading_number(s).and_then(number_value),
            _ => None,
        },
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Parse the first number in text such as `"8"`, `"8.5/10"`, `"Score: 7"`.
pub fn leading_number(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let negative = text[..start].ends_with('-');
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let parsed: f64 = digits.trim_end_matches('.').parse().ok()?;
    Some(if negative { -parsed } else { parsed })
}

fn number_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Some(Value::Number((n as i64).into()))
    } else {
        Number::from_f64(n).map(Value::Number)
    }
}

/// Field lookup tolerant of case and of spaces/hyphens instead of underscores.
fn lookup<'a>(map: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    map.get(name).or_else(|| {
        map.iter()
            .find(|(key, _)| normalize_key(key) == name)
            .map(|(_, v)| v)
    })
}

fn take_field(map: &mut Map<String, Value>, name: &str) -> Option<Value> {
    if let Some(value) = map.remove(name) {
        return Some(value);
    }
    let key = map.keys().find(|key| normalize_key(key) == name)?.clone();
    map.remove(&key)
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BASELINE_JOKES, IDEAS, JOKE, JUDGMENT, OBSERVATIONS, RUBRIC};
    use serde_json::json;

    #[test]
    fn test_string_list_prefers_wrapper() {
        let value = json!({"observations": ["a", "b"], "other": ["c"]});
        assert_eq!(conform(value, &OBSERVATIONS), Some(json!(["a", "b"])));
    }

    #[test]
    fn test_string_list_lone_list_value() {
        let value = json!({"angles": ["a", 3]});
        assert_eq!(conform(value, &OBSERVATIONS), Some(json!(["a", "3"])));
    }

    #[test]
    fn test_empty_list_is_valid() {
        assert_eq!(conform(json!({"observations": []}), &OBSERVATIONS), Some(json!([])));
        assert_eq!(conform(json!({"ideas": []}), &IDEAS), Some(json!([])));
    }

    #[test]
    fn test_lone_record_becomes_single_element_list() {
        let value = json!({"concept": "Penguins in tuxedos at a job interview"});
        assert_eq!(
            conform(value, &IDEAS),
            Some(json!([{"concept": "Penguins in tuxedos at a job interview"}]))
        );
    }

    #[test]
    fn test_record_list_drops_nonconforming_items() {
        let value = json!({"ideas": [{"concept": "a"}, {"nope": 1}, "b"]});
        assert_eq!(
            conform(value, &IDEAS),
            Some(json!([{"concept": "a"}, {"concept": "b"}]))
        );
    }

    #[test]
    fn test_rubric_requires_all_fields() {
        let partial = json!({"type": "Pun", "structure": "Setup, Punchline"});
        assert_eq!(conform(partial, &RUBRIC), None);

        let full = json!({
            "Type": "Pun",
            "structure": "Setup, Punchline",
            "key elements": "ice",
            "tone": "dry",
            "extra": true
        });
        assert_eq!(
            conform(full, &RUBRIC),
            Some(json!({
                "type": "Pun",
                "structure": "Setup, Punchline",
                "key_elements": ["ice"],
                "tone": "dry"
            }))
        );
    }

    #[test]
    fn test_nested_record_unwrapped() {
        let value = json!({"joke": {"text": "Knock knock"}});
        assert_eq!(
            conform(value, &JOKE),
            Some(json!({"text": "Knock knock", "explanation": "No explanation provided"}))
        );
    }

    #[test]
    fn test_baseline_defaults() {
        let value = json!({"jokes": [{"text": "one"}]});
        assert_eq!(
            conform(value, &BASELINE_JOKES),
            Some(json!([{
                "text": "one",
                "type": "General",
                "tone": "Standard",
                "approach": "Direct humor"
            }]))
        );
    }

    #[test]
    fn test_number_coercion() {
        let value = json!({"overall": "8/10", "originality": 7.5});
        let judged = conform(value, &JUDGMENT).unwrap();
        assert_eq!(judged["overall"], json!(8));
        assert_eq!(judged["originality"], json!(7.5));
        assert_eq!(judged["surprise"], json!(0));
    }

    #[test]
    fn test_fallback_wraps_prose() {
        let value = fallback_value(&JOKE, "A penguin walks into a bar.");
        assert_eq!(value["text"], json!("A penguin walks into a bar."));
        assert_eq!(value["explanation"], json!("No explanation provided"));
    }

    #[test]
    fn test_fallback_placeholders() {
        let rubric = fallback_value(&RUBRIC, "");
        assert_eq!(rubric["type"], json!("Fallback Observational"));
        assert_eq!(
            rubric["key_elements"],
            json!(["Fallback element 1", "Fallback element 2"])
        );

        let observations = fallback_value(&OBSERVATIONS, "");
        assert_eq!(observations.as_array().unwrap().len(), 3);

        // Raw JSON that failed to parse is not passed off as content
        let joke = fallback_value(&JOKE, "{\"text\": ");
        assert!(joke["text"].as_str().unwrap().starts_with("Fallback"));
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("Score: 7"), Some(7.0));
        assert_eq!(leading_number("8.5/10"), Some(8.5));
        assert_eq!(leading_number("none"), None);
    }
}
