//! Declarative descriptors of what each stage expects back from the model.
//!
//! The decoder and the fallback builder read these; no call site re-derives
//! field names or defaults on its own.

/// Marker every placeholder text starts with.
pub const FALLBACK_MARKER: &str = "Fallback";

/// Overall shape of a decoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `["a", "b"]`
    StringList,
    /// `{"field": ...}`
    Record,
    /// `[{"field": ...}, ...]`
    RecordList,
}

/// How a field value is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    TextList,
    Number,
}

/// A single field of a record schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Substituted when an optional field is missing
    pub default: Option<&'static str>,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind, default: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: Some(default),
        }
    }
}

/// What the decoder returns when nothing else worked.
#[derive(Debug, Clone, Copy)]
pub enum Fallback {
    /// Literal strings for a string list
    Strings(&'static [&'static str]),
    /// Literal field values for one record; text fields not listed get their default
    Record(&'static [(&'static str, &'static str)]),
}

/// Stage-specific expectations.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub name: &'static str,
    pub shape: Shape,
    /// Key wrapping the list in an object (`{"ideas": [...]}`)
    pub wrapper_key: Option<&'static str>,
    pub fields: &'static [FieldSpec],
    /// Field that receives the whole cleaned text when wrapping it as a record
    pub text_field: Option<&'static str>,
    pub fallback: Fallback,
}

impl Schema {
    /// The field whose presence identifies a record (the first required one).
    pub fn identifying_field(&self) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.required)
    }

    /// Whether a single text is enough to build a whole record.
    pub fn accepts_bare_text(&self) -> bool {
        match self.text_field {
            Some(text) => self
                .fields
                .iter()
                .filter(|f| f.required)
                .all(|f| f.name == text),
            None => self.shape == Shape::StringList,
        }
    }
}

pub static OBSERVATIONS: Schema = Schema {
    name: "observations",
    shape: Shape::StringList,
    wrapper_key: Some("observations"),
    fields: &[],
    text_field: None,
    fallback: Fallback::Strings(&[
        "Fallback observation: everyday frustrations with the theme",
        "Fallback observation: the gap between expectations and reality",
        "Fallback observation: the absurd lengths people go to for it",
    ]),
};

pub static IDEAS: Schema = Schema {
    name: "ideas",
    shape: Shape::RecordList,
    wrapper_key: Some("ideas"),
    fields: &[FieldSpec::required("concept", FieldKind::Text)],
    text_field: Some("concept"),
    fallback: Fallback::Record(&[(
        "concept",
        "Fallback concept: an ordinary situation taken to an absurd extreme",
    )]),
};

pub static RUBRIC: Schema = Schema {
    name: "rubric",
    shape: Shape::Record,
    wrapper_key: None,
    fields: &[
        FieldSpec::required("type", FieldKind::Text),
        FieldSpec::required("structure", FieldKind::Text),
        FieldSpec::required("key_elements", FieldKind::TextList),
        FieldSpec::required("tone", FieldKind::Text),
    ],
    text_field: None,
    fallback: Fallback::Record(&[
        ("type", "Fallback Observational"),
        ("structure", "Fallback: Setup, Punchline."),
        ("key_elements", "Fallback element 1|Fallback element 2"),
        ("tone", "Fallback Neutral"),
    ]),
};

pub static CRITIQUE: Schema = Schema {
    name: "critique",
    shape: Shape::Record,
    wrapper_key: None,
    fields: &[
        FieldSpec::required("type", FieldKind::Text),
        FieldSpec::required("structure", FieldKind::Text),
        FieldSpec::required("key_elements", FieldKind::TextList),
        FieldSpec::required("tone", FieldKind::Text),
        FieldSpec::required("critique_of_original", FieldKind::Text),
    ],
    text_field: None,
    fallback: Fallback::Record(&[
        ("type", "Fallback Character-based"),
        ("structure", "Fallback: Dialogue between A and B."),
        ("key_elements", "Fallback character trait|Fallback witty exchange"),
        ("tone", "Fallback Quirky"),
        (
            "critique_of_original",
            "Fallback: Original was okay, this offers a different angle.",
        ),
    ]),
};

pub static JOKE: Schema = Schema {
    name: "joke",
    shape: Shape::Record,
    wrapper_key: None,
    fields: &[
        FieldSpec::required("text", FieldKind::Text),
        FieldSpec::optional("explanation", FieldKind::Text, "No explanation provided"),
    ],
    text_field: Some("text"),
    fallback: Fallback::Record(&[
        (
            "text",
            "Fallback joke: Why did the AI cross the road? Because it was trying to get to the other data center.",
        ),
        ("explanation", "This is a fallback joke due to generation failure."),
    ]),
};

pub static BASELINE_JOKES: Schema = Schema {
    name: "baseline_jokes",
    shape: Shape::RecordList,
    wrapper_key: Some("jokes"),
    fields: &[
        FieldSpec::required("text", FieldKind::Text),
        FieldSpec::optional("type", FieldKind::Text, "General"),
        FieldSpec::optional("tone", FieldKind::Text, "Standard"),
        FieldSpec::optional("approach", FieldKind::Text, "Direct humor"),
    ],
    text_field: Some("text"),
    fallback: Fallback::Record(&[(
        "text",
        "Fallback joke: I tried to write a joke about this theme, but the punchline timed out.",
    )]),
};

pub static JUDGMENT: Schema = Schema {
    name: "judgment",
    shape: Shape::Record,
    wrapper_key: None,
    fields: &[
        FieldSpec::required("overall", FieldKind::Number),
        FieldSpec::optional("originality", FieldKind::Number, "0"),
        FieldSpec::optional("cleverness", FieldKind::Number, "0"),
        FieldSpec::optional("surprise", FieldKind::Number, "0"),
        FieldSpec::optional("relatability", FieldKind::Number, "0"),
        FieldSpec::optional("rationale", FieldKind::Text, "No rationale provided"),
    ],
    text_field: None,
    fallback: Fallback::Record(&[
        ("overall", "0"),
        ("rationale", "Fallback: judgment could not be decoded."),
    ]),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifying_fields() {
        assert_eq!(IDEAS.identifying_field().unwrap().name, "concept");
        assert_eq!(RUBRIC.identifying_field().unwrap().name, "type");
        assert_eq!(BASELINE_JOKES.identifying_field().unwrap().name, "text");
        assert!(OBSERVATIONS.identifying_field().is_none());
    }

    #[test]
    fn test_bare_text_acceptance() {
        assert!(OBSERVATIONS.accepts_bare_text());
        assert!(IDEAS.accepts_bare_text());
        assert!(JOKE.accepts_bare_text());
        assert!(BASELINE_JOKES.accepts_bare_text());
        assert!(!RUBRIC.accepts_bare_text());
        assert!(!JUDGMENT.accepts_bare_text());
    }

    #[test]
    fn test_fallback_texts_are_tagged() {
        let Fallback::Strings(items) = OBSERVATIONS.fallback else {
            panic!("observations fall back to strings");
        };
        assert!(items.iter().all(|s| s.starts_with(FALLBACK_MARKER)));

        let Fallback::Record(fields) = JOKE.fallback else {
            panic!("jokes fall back to a record");
        };
        assert!(fields
            .iter()
            .any(|(name, value)| *name == "text" && value.starts_with(FALLBACK_MARKER)));
    }
}
