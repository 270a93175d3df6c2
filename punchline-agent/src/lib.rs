//! Punchline Agent - LLM backend layer
//!
//! Provides the collaborator the generation pipeline talks to:
//! - Trait-based LLM backends (OpenAI-compatible HTTP, scripted mock)
//! - Explicit backend configuration (endpoint, model, credential)
//! - An audit trail of every backend call
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        punchline stage functions        │
//! └────────────────┬────────────────────────┘
//!                  │
//!      ┌───────────┴───────────┐
//!      ▼                       ▼
//! ┌─────────────┐       ┌─────────────┐
//! │  AuditLog   │──────▶│ LlmBackend  │
//! │             │       │ (OpenAI/    │
//! │             │       │  Mock)      │
//! └─────────────┘       └─────────────┘
//! ```

pub mod audit;
pub mod backend;
pub mod config;

// Re-export main types for convenience
pub use audit::{AuditEntry, AuditLog, AuditStats, CallOutcome};
pub use backend::traits::{CompletionRequest, CompletionResponse, LlmBackend, LlmError};
pub use backend::{MockBackend, OpenAiBackend};
pub use config::{BackendConfig, ConfigError};
