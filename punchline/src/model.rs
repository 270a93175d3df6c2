//! Records produced by a pipeline run.
//!
//! Field names follow the persisted result document.

use serde::{Deserialize, Serialize};

/// Fan-out parameters for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanOut {
    /// Ideas kept after formulation, in [1, 10]
    pub num_ideas: usize,
    /// Rubrics generated per idea, in [1, 5]
    #[serde(rename = "plans_per_idea")]
    pub rubrics_per_idea: usize,
    /// Critiques generated per rubric, in [0, 3]
    #[serde(rename = "critiques_per_plan")]
    pub critiques_per_rubric: usize,
}

impl FanOut {
    pub const IDEAS: (i64, i64) = (1, 10);
    pub const RUBRICS_PER_IDEA: (i64, i64) = (1, 5);
    pub const CRITIQUES_PER_RUBRIC: (i64, i64) = (0, 3);

    /// Clamp raw (possibly negative) counts to their bounds.
    pub fn clamped(ideas: i64, rubrics_per_idea: i64, critiques_per_rubric: i64) -> Self {
        let clamp = |value: i64, (lo, hi): (i64, i64)| value.clamp(lo, hi) as usize;
        Self {
            num_ideas: clamp(ideas, Self::IDEAS),
            rubrics_per_idea: clamp(rubrics_per_idea, Self::RUBRICS_PER_IDEA),
            critiques_per_rubric: clamp(critiques_per_rubric, Self::CRITIQUES_PER_RUBRIC),
        }
    }

    /// Re-apply bounds to an already-built value.
    pub fn normalized(self) -> Self {
        Self::clamped(
            self.num_ideas as i64,
            self.rubrics_per_idea as i64,
            self.critiques_per_rubric as i64,
        )
    }

    /// Rubrics per idea once critiques are added.
    pub fn rubrics_per_idea_total(&self) -> usize {
        self.rubrics_per_idea * (1 + self.critiques_per_rubric)
    }

    /// Jokes a run produces when `ideas` ideas survive and no unit fails.
    pub fn expected_jokes(&self, ideas: usize) -> usize {
        ideas * self.rubrics_per_idea_total()
    }
}

impl Default for FanOut {
    fn default() -> Self {
        Self {
            num_ideas: 3,
            rubrics_per_idea: 2,
            critiques_per_rubric: 1,
        }
    }
}

/// Which observation stage produced an angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationOrder {
    First,
    Second,
}

/// A humor angle on the theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub text: String,
    pub order: ObservationOrder,
}

impl Observation {
    pub fn first(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            order: ObservationOrder::First,
        }
    }

    pub fn second(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            order: ObservationOrder::Second,
        }
    }
}

/// Persisted observations, split by order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observations {
    pub first_order: Vec<String>,
    pub second_order: Vec<String>,
}

impl Observations {
    pub fn from_records(records: &[Observation]) -> Self {
        let pick = |order: ObservationOrder| -> Vec<String> {
            records
                .iter()
                .filter(|o| o.order == order)
                .map(|o| o.text.clone())
                .collect()
        };
        Self {
            first_order: pick(ObservationOrder::First),
            second_order: pick(ObservationOrder::Second),
        }
    }

    /// First-order followed by second-order angles.
    pub fn combined(&self) -> Vec<String> {
        self.first_order
            .iter()
            .chain(&self.second_order)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.first_order.len() + self.second_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A concept to build jokes around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idea {
    pub id: String,
    pub concept: String,
}

impl Idea {
    /// An idea with an empty concept cannot be developed.
    pub fn is_malformed(&self) -> bool {
        self.id.trim().is_empty() || self.concept.trim().is_empty()
    }
}

/// A structured authoring directive for one joke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rubric {
    pub id: String,
    pub idea_id: String,
    #[serde(rename = "type")]
    pub joke_type: String,
    pub structure: String,
    pub key_elements: Vec<String>,
    pub tone: String,
    /// Set on rubrics produced by critique
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_rubric_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critique_of_original: Option<String>,
}

impl Rubric {
    pub fn is_critique(&self) -> bool {
        self.original_rubric_id.is_some()
    }

    pub fn is_malformed(&self) -> bool {
        self.id.trim().is_empty() || self.joke_type.trim().is_empty()
    }

    /// Plain-text rendering embedded in critique prompts.
    pub fn summary(&self) -> String {
        format!(
            "{{type: {}, structure: {}, key_elements: [{}], tone: {}}}",
            self.joke_type,
            self.structure,
            self.key_elements.join(", "),
            self.tone
        )
    }
}

/// Snapshot of the rubric a joke was written against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JokeMetadata {
    pub joke_type: String,
    pub tone: String,
    pub structure: String,
}

/// A finished joke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Joke {
    pub id: String,
    pub theme: String,
    pub idea_id: String,
    pub rubric_id: String,
    pub text: String,
    pub explanation: String,
    pub metadata: JokeMetadata,
}

/// Why a run stopped before the fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    NoObservations,
    NoIdeas,
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaltReason::NoObservations => write!(f, "no observations were generated"),
            HaltReason::NoIdeas => write!(f, "no joke ideas were formulated"),
        }
    }
}

/// Counters describing how much of a run degraded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub requested_ideas: usize,
    pub expected_jokes: usize,
    /// Backend calls whose output fell back to placeholders
    pub fallback_units: usize,
    /// Jokes omitted for malformed inputs or dangling references
    pub skipped_units: usize,
    pub backend_calls: usize,
    pub failed_calls: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halted: Option<HaltReason>,
}

impl RunStats {
    pub fn degraded_units(&self) -> usize {
        self.fallback_units + self.skipped_units
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub theme: String,
    pub config: FanOut,
    pub observations: Observations,
    pub joke_ideas: Vec<Idea>,
    pub rubrics: Vec<Rubric>,
    pub jokes: Vec<Joke>,
    #[serde(default)]
    pub stats: RunStats,
}

impl PipelineResult {
    pub fn new(theme: impl Into<String>, config: FanOut) -> Self {
        Self {
            theme: theme.into(),
            config,
            observations: Observations::default(),
            joke_ideas: Vec::new(),
            rubrics: Vec::new(),
            jokes: Vec::new(),
            stats: RunStats::default(),
        }
    }
}
