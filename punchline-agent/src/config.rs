//! Backend connection settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default OpenAI-compatible endpoint (a local inference server).
pub const DEFAULT_BASE_URL: &str = "http://localhost:1234/v1";

/// Default generation model.
pub const DEFAULT_MODEL: &str = "gemma-3-4b-it-qat";

/// Configuration errors, reported once before any backend call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No API credential configured
    #[error("API credential missing: set OPENAI_API_KEY or pass --api-key")]
    MissingCredential,

    /// Base URL is not an http(s) URL
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Model name is empty
    #[error("Model name must not be empty")]
    EmptyModel,

    /// HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Everything a backend needs to reach the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// OpenAI-compatible API base (without `/chat/completions`)
    pub base_url: String,
    /// Target model identifier
    pub model: String,
    /// Bearer credential
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl BackendConfig {
    /// Create a config for a base URL and model.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set the credential.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Same endpoint and credential, different model.
    pub fn for_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Check the settings without touching the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.api_key {
            Some(key) if !key.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingCredential),
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }

        Ok(())
    }
}
