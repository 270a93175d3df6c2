//! Mock LLM backend for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::Mutex;

use super::traits::*;

/// A canned reply for prompts containing a marker.
#[derive(Debug, Clone)]
struct Rule {
    marker: String,
    reply: Reply,
}

#[derive(Debug, Clone)]
enum Reply {
    Content(String),
    Fail(String),
}

/// Mock backend for testing.
///
/// Routes each request by the first rule whose marker occurs in the user
/// prompt; unmatched prompts get the default response. Every request is
/// recorded for later inspection.
pub struct MockBackend {
    model_id: String,
    available: AtomicBool,
    rules: Vec<Rule>,
    response_content: String,
    call_count: AtomicU32,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockBackend {
    /// Create a new mock backend.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            available: AtomicBool::new(true),
            rules: Vec::new(),
            response_content: "Mock response".to_string(),
            call_count: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Set the default response content.
    pub fn with_response(mut self, content: impl Into<String>) -> Self {
        self.response_content = content.into();
        self
    }

    /// Answer prompts containing `marker` with `content`.
    pub fn with_rule(mut self, marker: impl Into<String>, content: impl Into<String>) -> Self {
        self.rules.push(Rule {
            marker: marker.into(),
            reply: Reply::Content(content.into()),
        });
        self
    }

    /// Fail prompts containing `marker` with a network error.
    pub fn with_failure(mut self, marker: impl Into<String>, error: impl Into<String>) -> Self {
        self.rules.push(Rule {
            marker: marker.into(),
            reply: Reply::Fail(error.into()),
        });
        self
    }

    /// Set availability.
    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    /// Get the number of times complete was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// All requests seen so far, in call order.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of recorded requests whose user prompt contains `marker`.
    pub async fn calls_matching(&self, marker: &str) -> usize {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| r.user_content().is_some_and(|c| c.contains(marker)))
            .count()
    }

    fn route(&self, prompt: &str) -> Reply {
        self.rules
            .iter()
            .find(|rule| prompt.contains(&rule.marker))
            .map(|rule| rule.reply.clone())
            .unwrap_or_else(|| Reply::Content(self.response_content.clone()))
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("mock-model")
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let prompt = request.user_content().unwrap_or_default().to_string();
        self.requests.lock().await.push(request);

        if !self.available.load(Ordering::SeqCst) {
            return Err(LlmError::Unavailable("Mock backend disabled".to_string()));
        }

        let content = match self.route(&prompt) {
            Reply::Content(content) => content,
            Reply::Fail(error) => return Err(LlmError::NetworkError(error)),
        };

        // Estimate token counts
        let prompt_tokens = prompt.len() as u32 / 4;
        let completion_tokens = content.len() as u32 / 4;

        Ok(CompletionResponse {
            content,
            finish_reason: FinishReason::Stop,
            usage: Usage {
                prompt_tokens,
                completion_tokens,
            },
        })
    }
}
