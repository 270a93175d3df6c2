//! Stage functions.
//!
//! Each stage builds a prompt, makes one backend call per unit, decodes the
//! reply against the stage's schema and attaches the ids and cross-references
//! the backend cannot be trusted to produce.
//!
//! Transport failures are logged and decoded as empty text, so they surface
//! as the schema's fallback value rather than as errors.

use std::sync::Arc;

use punchline_agent::backend::FinishReason;
use punchline_agent::{AuditLog, CompletionRequest, LlmBackend};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::decode::{decode_as, Typed};
use crate::error::PipelineError;
use crate::model::{Idea, Joke, JokeMetadata, Observation, Rubric};
use crate::prompts;
use crate::schema::{Schema, CRITIQUE, IDEAS, JOKE, OBSERVATIONS, RUBRIC};

/// Default sampling temperature for stage calls.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Records from a stage plus how many of its calls degraded to fallback.
#[derive(Debug, Clone, Default)]
pub struct StageOutput<T> {
    pub records: T,
    pub fallbacks: usize,
}

impl<T> StageOutput<T> {
    fn new(records: T, fallbacks: usize) -> Self {
        Self { records, fallbacks }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConceptFields {
    concept: String,
}

#[derive(Debug, Default, Deserialize)]
struct RubricFields {
    #[serde(rename = "type")]
    joke_type: String,
    structure: String,
    key_elements: Vec<String>,
    tone: String,
    #[serde(default)]
    critique_of_original: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct JokeFields {
    text: String,
    explanation: String,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// The stage functions, bound to one backend.
#[derive(Clone)]
pub struct Stages {
    backend: Arc<dyn LlmBackend>,
    audit: Arc<AuditLog>,
    temperature: f32,
    max_tokens: Option<u32>,
    json_mode: bool,
}

impl Stages {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            audit: Arc::new(AuditLog::new()),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            json_mode: false,
        }
    }

    /// Share an audit log with other components.
    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Cap the length of every stage reply.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Ask backends that support it for a JSON object reply.
    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// One backend call; a transport failure yields empty text.
    async fn call(&self, purpose: &str, format: &str, prompt: String) -> String {
        debug!(
            purpose,
            prompt = %prompt.chars().take(200).collect::<String>(),
            "Calling backend"
        );

        let mut request = CompletionRequest::user(prompt)
            .with_system(prompts::system_instruction(format))
            .with_temperature(self.temperature);
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if self.json_mode {
            request = request.with_json_output();
        }

        match self.audit.complete(self.backend.as_ref(), purpose, request).await {
            Ok(response) => {
                if response.finish_reason == FinishReason::Length {
                    warn!(purpose, "Response hit the token limit and may be truncated");
                }
                response.content
            }
            Err(e) => {
                warn!(purpose, error = %e, "Backend call failed, using fallback");
                String::new()
            }
        }
    }

    async fn call_decoded<T>(&self, purpose: &str, format: &str, prompt: String, schema: &Schema) -> Typed<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        let raw = self.call(purpose, format, prompt).await;
        let typed = decode_as::<T>(&raw, schema);
        if typed.is_fallback() {
            warn!(purpose, schema = schema.name, "Response degraded to fallback");
        }
        typed
    }

    /// Broad humor angles on the theme.
    pub async fn first_order_observations(&self, theme: &str) -> StageOutput<Vec<Observation>> {
        let typed: Typed<Vec<String>> = self
            .call_decoded(
                "first_order_observations",
                prompts::OBSERVATIONS_FORMAT,
                prompts::first_order_observations(theme),
                &OBSERVATIONS,
            )
            .await;

        let fallbacks = typed.is_fallback() as usize;
        let records: Vec<Observation> = typed.value.into_iter().map(Observation::first).collect();
        info!(count = records.len(), "Generated first-order observations");
        StageOutput::new(records, fallbacks)
    }

    /// Narrower angles built from the first-order ones.
    pub async fn second_order_observations(
        &self,
        theme: &str,
        first_order: &[Observation],
    ) -> StageOutput<Vec<Observation>> {
        if first_order.is_empty() {
            return StageOutput::default();
        }

        let texts: Vec<String> = first_order.iter().map(|o| o.text.clone()).collect();
        let typed: Typed<Vec<String>> = self
            .call_decoded(
                "second_order_observations",
                prompts::SECOND_ORDER_FORMAT,
                prompts::second_order_observations(theme, &texts),
                &OBSERVATIONS,
            )
            .await;

        let fallbacks = typed.is_fallback() as usize;
        let records: Vec<Observation> = typed.value.into_iter().map(Observation::second).collect();
        info!(count = records.len(), "Generated second-order observations");
        StageOutput::new(records, fallbacks)
    }

    /// Concrete joke concepts, each with a fresh id.
    pub async fn formulate_ideas(&self, theme: &str, observations: &[String]) -> StageOutput<Vec<Idea>> {
        if observations.is_empty() {
            return StageOutput::default();
        }

        let typed: Typed<Vec<ConceptFields>> = self
            .call_decoded(
                "formulate_joke_ideas",
                prompts::IDEAS_FORMAT,
                prompts::joke_ideas(theme, observations),
                &IDEAS,
            )
            .await;

        let fallbacks = typed.is_fallback() as usize;
        let records: Vec<Idea> = typed
            .value
            .into_iter()
            .filter(|fields| !fields.concept.trim().is_empty())
            .map(|fields| Idea {
                id: new_id(),
                concept: fields.concept,
            })
            .collect();
        info!(count = records.len(), "Formulated joke ideas");
        StageOutput::new(records, fallbacks)
    }

    /// `count` rubrics for one idea, one call each.
    pub async fn generate_rubrics(
        &self,
        theme: &str,
        idea: &Idea,
        count: usize,
    ) -> Result<StageOutput<Vec<Rubric>>, PipelineError> {
        if idea.is_malformed() {
            return Err(PipelineError::MalformedIdea(idea.id.clone()));
        }

        let mut output = StageOutput::new(Vec::with_capacity(count), 0);
        for i in 0..count {
            let typed: Typed<RubricFields> = self
                .call_decoded(
                    &format!("generate_rubric_{}", i + 1),
                    prompts::RUBRIC_FORMAT,
                    prompts::rubric(theme, idea, i, count),
                    &RUBRIC,
                )
                .await;

            output.fallbacks += typed.is_fallback() as usize;
            let fields = typed.value;
            output.records.push(Rubric {
                id: new_id(),
                idea_id: idea.id.clone(),
                joke_type: fields.joke_type,
                structure: fields.structure,
                key_elements: fields.key_elements,
                tone: fields.tone,
                original_rubric_id: None,
                critique_of_original: None,
            });
        }

        info!(idea_id = %idea.id, count = output.records.len(), "Generated rubrics");
        Ok(output)
    }

    /// `per_rubric` alternatives for each original rubric, one call each.
    pub async fn critique_rubrics(
        &self,
        theme: &str,
        idea: &Idea,
        originals: &[Rubric],
        per_rubric: usize,
    ) -> Result<StageOutput<Vec<Rubric>>, PipelineError> {
        if originals.is_empty() || per_rubric == 0 {
            return Ok(StageOutput::default());
        }
        if idea.is_malformed() {
            return Err(PipelineError::MalformedIdea(idea.id.clone()));
        }

        let mut output = StageOutput::new(Vec::with_capacity(originals.len() * per_rubric), 0);
        for (i, original) in originals.iter().enumerate() {
            if original.is_malformed() {
                warn!(rubric_id = %original.id, "Skipping critique of malformed rubric");
                continue;
            }

            for j in 0..per_rubric {
                let typed: Typed<RubricFields> = self
                    .call_decoded(
                        &format!("critique_rubric_{}_{}", i + 1, j + 1),
                        prompts::CRITIQUE_FORMAT,
                        prompts::critique(theme, idea, original, j, per_rubric),
                        &CRITIQUE,
                    )
                    .await;

                output.fallbacks += typed.is_fallback() as usize;
                let fields = typed.value;
                output.records.push(Rubric {
                    id: new_id(),
                    idea_id: idea.id.clone(),
                    joke_type: fields.joke_type,
                    structure: fields.structure,
                    key_elements: fields.key_elements,
                    tone: fields.tone,
                    original_rubric_id: Some(original.id.clone()),
                    critique_of_original: fields.critique_of_original,
                });
            }
        }

        info!(idea_id = %idea.id, count = output.records.len(), "Generated critiqued rubrics");
        Ok(output)
    }

    /// One joke written against one rubric.
    pub async fn generate_joke(
        &self,
        theme: &str,
        idea: &Idea,
        rubric: &Rubric,
    ) -> Result<StageOutput<Joke>, PipelineError> {
        if idea.is_malformed() {
            return Err(PipelineError::MalformedIdea(idea.id.clone()));
        }
        if rubric.is_malformed() || rubric.idea_id != idea.id {
            return Err(PipelineError::MalformedRubric(rubric.id.clone()));
        }

        let prefix: String = rubric.id.chars().take(8).collect();
        let typed: Typed<JokeFields> = self
            .call_decoded(
                &format!("generate_joke_{}", prefix),
                prompts::JOKE_FORMAT,
                prompts::joke(theme, idea, rubric),
                &JOKE,
            )
            .await;

        let fallbacks = typed.is_fallback() as usize;
        let fields = typed.value;
        let joke = Joke {
            id: new_id(),
            theme: theme.to_string(),
            idea_id: idea.id.clone(),
            rubric_id: rubric.id.clone(),
            text: fields.text,
            explanation: fields.explanation,
            metadata: JokeMetadata {
                joke_type: rubric.joke_type.clone(),
                tone: rubric.tone.clone(),
                structure: rubric.structure.clone(),
            },
        };

        debug!(rubric_id = %rubric.id, "Generated joke");
        Ok(StageOutput::new(joke, fallbacks))
    }
}
