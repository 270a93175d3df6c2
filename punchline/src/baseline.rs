//! Single-shot baseline generator.
//!
//! One backend call, decoded with the same cascade as the pipeline, with no
//! fan-out and no cross-references. Used only as a comparison arm.

use std::sync::Arc;

use punchline_agent::{AuditLog, CompletionRequest, LlmBackend};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::decode::{decode_as, Typed};
use crate::error::BaselineError;
use crate::prompts;
use crate::schema::BASELINE_JOKES;

pub const BASELINE_TEMPERATURE: f32 = 0.8;

/// Prompting style for the single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BaselineMode {
    Basic,
    /// Adds multi-stage-style framing to the single prompt
    Enhanced,
}

impl BaselineMode {
    pub fn method_label(&self) -> &'static str {
        match self {
            BaselineMode::Basic => "basic_baseline",
            BaselineMode::Enhanced => "enhanced_baseline",
        }
    }

    fn system_prompt(&self) -> &'static str {
        match self {
            BaselineMode::Basic => prompts::BASIC_BASELINE_SYSTEM,
            BaselineMode::Enhanced => prompts::ENHANCED_BASELINE_SYSTEM,
        }
    }

    fn user_prompt(&self, theme: &str, num_jokes: usize) -> String {
        match self {
            BaselineMode::Basic => prompts::basic_baseline(theme, num_jokes),
            BaselineMode::Enhanced => prompts::enhanced_baseline(theme, num_jokes),
        }
    }
}

/// A baseline joke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineJoke {
    pub id: String,
    pub prompt: String,
    pub text: String,
    #[serde(rename = "type")]
    pub joke_type: String,
    pub tone: String,
    pub approach: String,
    pub model: String,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineConfig {
    pub prompt: String,
    pub model: String,
    pub enhanced_prompting: bool,
}

/// Persisted baseline output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineDocument {
    pub jokes: Vec<BaselineJoke>,
    pub config: BaselineConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BaselineFields {
    text: String,
    #[serde(rename = "type")]
    joke_type: String,
    tone: String,
    approach: String,
}

pub struct BaselineGenerator {
    backend: Arc<dyn LlmBackend>,
    audit: Arc<AuditLog>,
    mode: BaselineMode,
    keep_raw: bool,
    temperature: f32,
}

impl BaselineGenerator {
    pub fn new(backend: Arc<dyn LlmBackend>, mode: BaselineMode) -> Self {
        Self {
            backend,
            audit: Arc::new(AuditLog::new()),
            mode,
            keep_raw: false,
            temperature: BASELINE_TEMPERATURE,
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    /// Keep the raw backend reply in the document.
    pub fn with_raw_response(mut self, keep: bool) -> Self {
        self.keep_raw = keep;
        self
    }

    /// Ask for `num_jokes` jokes about `theme` in one call.
    pub async fn generate(&self, theme: &str, num_jokes: usize) -> Result<BaselineDocument, BaselineError> {
        let theme = theme.trim();
        if theme.is_empty() {
            return Err(BaselineError::EmptyPrompt);
        }
        let num_jokes = num_jokes.max(1);
        let model = self.backend.id().to_string();

        info!(
            theme,
            num_jokes,
            method = self.mode.method_label(),
            "Generating baseline jokes"
        );

        let request = CompletionRequest::user(self.mode.user_prompt(theme, num_jokes))
            .with_system(self.mode.system_prompt())
            .with_temperature(self.temperature);
        let response = self
            .audit
            .complete(self.backend.as_ref(), "baseline_jokes", request)
            .await?;

        let typed: Typed<Vec<BaselineFields>> = decode_as(&response.content, &BASELINE_JOKES);
        if typed.is_fallback() {
            warn!("Baseline response degraded to fallback");
        }

        let jokes: Vec<BaselineJoke> = typed
            .value
            .into_iter()
            .filter(|fields| !fields.text.trim().is_empty())
            .take(num_jokes)
            .map(|fields| BaselineJoke {
                id: Uuid::new_v4().to_string(),
                prompt: theme.to_string(),
                text: fields.text,
                joke_type: fields.joke_type,
                tone: fields.tone,
                approach: fields.approach,
                model: model.clone(),
                method: self.mode.method_label().to_string(),
            })
            .collect();

        info!(count = jokes.len(), "Generated baseline jokes");

        Ok(BaselineDocument {
            jokes,
            config: BaselineConfig {
                prompt: theme.to_string(),
                model,
                enhanced_prompting: self.mode == BaselineMode::Enhanced,
            },
            raw_response: self.keep_raw.then_some(response.content),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use punchline_agent::MockBackend;

    #[tokio::test]
    async fn test_enhanced_baseline_document() {
        let backend = Arc::new(MockBackend::new("gemma").with_response(
            r#"```json
{"jokes": [
  {"text": "Penguins never get lost. They always follow the chain of command.", "type": "Pun", "tone": "dry", "approach": "wordplay"},
  {"text": "Why don't penguins fly? They're not tall enough to be pilots."},
  {"text": "Third joke"}
]}
```"#,
        ));
        let generator = BaselineGenerator::new(backend.clone(), BaselineMode::Enhanced).with_raw_response(true);
        let doc = generator.generate("penguins", 2).await.unwrap();

        assert_eq!(doc.jokes.len(), 2);
        assert_eq!(doc.jokes[0].joke_type, "Pun");
        assert_eq!(doc.jokes[1].tone, "Standard");
        assert_eq!(doc.jokes[1].approach, "Direct humor");
        assert!(doc.jokes.iter().all(|j| j.method == "enhanced_baseline" && j.model == "gemma"));
        assert!(doc.config.enhanced_prompting);
        assert!(doc.raw_response.is_some());

        let request = &backend.requests().await[0];
        assert_eq!(request.temperature, Some(BASELINE_TEMPERATURE));
        assert!(request.user_content().unwrap().starts_with("Theme: penguins"));
    }

    #[tokio::test]
    async fn test_basic_baseline_numbered_list() {
        let backend = Arc::new(MockBackend::default().with_response(
            "Joke 1: What do penguins wear to parties? Tuxedos.\nJoke 2: Ice to meet you.",
        ));
        let doc = BaselineGenerator::new(backend, BaselineMode::Basic)
            .generate("penguins", 5)
            .await
            .unwrap();

        assert_eq!(doc.jokes.len(), 2);
        assert_eq!(doc.jokes[1].text, "Ice to meet you.");
        assert_eq!(doc.jokes[0].method, "basic_baseline");
        assert!(doc.raw_response.is_none());
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let backend = Arc::new(MockBackend::default());
        let result = BaselineGenerator::new(backend.clone(), BaselineMode::Basic)
            .generate("   ", 1)
            .await;
        assert!(matches!(result, Err(BaselineError::EmptyPrompt)));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let backend = Arc::new(MockBackend::default().with_failure("penguins", "refused"));
        let result = BaselineGenerator::new(backend, BaselineMode::Basic)
            .generate("penguins", 1)
            .await;
        assert!(matches!(result, Err(BaselineError::Backend(_))));
    }
}
