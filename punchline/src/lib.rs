//! Punchline - staged joke generation
//!
//! Drives a text-generation backend through five dependent stages and turns
//! its free-text replies into linked records:
//!
//! ```text
//! theme ─▶ observations ─▶ ideas ─▶ rubrics ─▶ critiqued rubrics ─▶ jokes
//! ```
//!
//! - [`decode`] recovers structured values from unreliable model output
//! - [`stages`] wraps one backend call per unit and attaches ids
//! - [`orchestrator`] sequences the stages and the fan-out
//! - [`baseline`] and [`scoring`] provide the single-shot comparison arm

pub mod baseline;
pub mod config;
pub mod decode;
pub mod error;
pub mod integrity;
pub mod model;
pub mod orchestrator;
pub mod prompts;
pub mod schema;
pub mod scoring;
pub mod stages;
pub mod store;

pub use baseline::{BaselineDocument, BaselineGenerator, BaselineMode};
pub use decode::{decode, Decoded, Method};
pub use error::{BaselineError, PipelineError};
pub use model::{FanOut, HaltReason, Idea, Joke, PipelineResult, Rubric, RunStats};
pub use orchestrator::Pipeline;
pub use scoring::{JokeJudge, Judgment, JudgmentsDocument};
pub use stages::Stages;
pub use store::StoreError;
