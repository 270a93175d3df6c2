//! Error types for the pipeline crate.

use thiserror::Error;

/// Errors surfaced by pipeline operations.
///
/// Per-unit backend and decode failures never appear here; they degrade to
/// placeholder records instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The idea a unit depends on cannot be developed
    #[error("Malformed idea: {0}")]
    MalformedIdea(String),

    /// The rubric a joke depends on cannot be used
    #[error("Malformed rubric: {0}")]
    MalformedRubric(String),
}

/// Errors from the single-shot baseline generator.
#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("Empty prompt provided")]
    EmptyPrompt,

    #[error("Backend error: {0}")]
    Backend(#[from] punchline_agent::LlmError),
}
