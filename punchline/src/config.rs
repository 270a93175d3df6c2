//! Configuration for the punchline binary
//!
//! CLI arguments with environment variable fallbacks, loaded after `.env`.

use clap::Parser;
use std::path::PathBuf;

use punchline_agent::config::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use punchline_agent::{BackendConfig, ConfigError};

use crate::baseline::BaselineMode;
use crate::model::FanOut;
use crate::stages::DEFAULT_TEMPERATURE;

/// Default model for the judging backend.
pub const DEFAULT_JUDGE_MODEL: &str = "deepseek/deepseek-chat:free";

/// Upper bound on baseline jokes requested in one call.
pub const MAX_BASELINE_JOKES: usize = 10;

/// Punchline - multi-stage joke generation
#[derive(Parser, Debug, Clone)]
#[command(name = "punchline")]
#[command(about = "Generate jokes through observations, ideas, rubrics and critiques")]
pub struct Args {
    /// Theme to write jokes about
    #[arg(long, env = "DEFAULT_THEME", default_value = "penguins")]
    pub theme: String,

    /// Joke ideas to develop (clamped to 1-10)
    #[arg(long, env = "DEFAULT_NUM_IDEAS", default_value_t = 3, allow_negative_numbers = true)]
    pub ideas: i64,

    /// Rubrics per idea (clamped to 1-5)
    #[arg(long, env = "DEFAULT_RUBRICS_PER_IDEA", default_value_t = 2, allow_negative_numbers = true)]
    pub rubrics_per_idea: i64,

    /// Critiques per rubric (clamped to 0-3)
    #[arg(long, env = "DEFAULT_CRITIQUES_PER_RUBRIC", default_value_t = 1, allow_negative_numbers = true)]
    pub critiques_per_rubric: i64,

    /// Pipeline result file
    #[arg(long, env = "DEFAULT_OUTPUT_FILE", default_value = "results.json")]
    pub output: PathBuf,

    /// Baseline result file
    #[arg(long, env = "BASELINE_OUTPUT_FILE", default_value = "baseline.json")]
    pub baseline_output: PathBuf,

    /// Judgments file
    #[arg(long, env = "JUDGMENTS_OUTPUT_FILE", default_value = "joke_judgments.json")]
    pub judgments_output: PathBuf,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "LLM_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub api_base_url: String,

    /// API credential (required)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Generation model
    #[arg(long, env = "DEFAULT_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Judging model
    #[arg(long, env = "JUDGE_MODEL", default_value = DEFAULT_JUDGE_MODEL)]
    pub judge_model: String,

    /// Sampling temperature for pipeline stages
    #[arg(long, env = "TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    pub request_timeout_secs: u64,

    /// Cap on tokens per stage reply
    #[arg(long, env = "MAX_TOKENS")]
    pub max_tokens: Option<u32>,

    /// Ask the backend for JSON object replies (not all local servers accept this)
    #[arg(long, env = "JSON_MODE")]
    pub json_mode: bool,

    /// Idea branches processed concurrently
    #[arg(long, env = "FANOUT_WORKERS", default_value_t = 1)]
    pub workers: usize,

    /// Skip the single-shot baseline
    #[arg(long)]
    pub no_baseline: bool,

    /// Baseline prompting style
    #[arg(long, env = "BASELINE_MODE", value_enum, default_value_t = BaselineMode::Enhanced)]
    pub baseline_mode: BaselineMode,

    /// Baseline jokes to request (defaults to ideas x rubrics, at most 10)
    #[arg(long, env = "BASELINE_NUM_JOKES")]
    pub baseline_jokes: Option<usize>,

    /// Keep the raw baseline reply in the baseline file
    #[arg(long, env = "BASELINE_SAVE_RAW")]
    pub save_raw: bool,

    /// Skip judging
    #[arg(long)]
    pub no_judge: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backend_config().validate()?;
        self.judge_config().validate()
    }

    /// Clamped fan-out counts.
    pub fn fan_out(&self) -> FanOut {
        FanOut::clamped(self.ideas, self.rubrics_per_idea, self.critiques_per_rubric)
    }

    /// Settings for the generation backend.
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            base_url: self.api_base_url.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            timeout_secs: self.request_timeout_secs,
        }
    }

    /// Same endpoint and credential, judge model.
    pub fn judge_config(&self) -> BackendConfig {
        self.backend_config().for_model(self.judge_model.clone())
    }

    /// Baseline jokes to request; without an explicit count, matches the
    /// pipeline's nominal output.
    pub fn baseline_jokes(&self) -> usize {
        let count = self.baseline_jokes.unwrap_or_else(|| {
            let fan_out = self.fan_out();
            fan_out.num_ideas * fan_out.rubrics_per_idea
        });
        count.clamp(1, MAX_BASELINE_JOKES)
    }
}
