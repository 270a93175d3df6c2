//! Pipeline orchestrator.
//!
//! ```text
//! theme ─▶ first-order ─▶ second-order ─▶ ideas ─┬─▶ idea 1: rubrics ─▶ critiques ─▶ jokes
//!          observations    observations          ├─▶ idea 2: ...
//!                                                └─▶ idea N: ...
//! ```
//!
//! Idea branches are independent. With more than one worker they run
//! concurrently, but results are aggregated in idea order and each branch
//! stays sequential.

use std::slice;

use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use crate::integrity;
use crate::model::{FanOut, HaltReason, Idea, Joke, Observations, PipelineResult, Rubric};
use crate::stages::Stages;

/// Records and counters from one idea's fan-out.
#[derive(Debug, Default)]
struct Branch {
    rubrics: Vec<Rubric>,
    jokes: Vec<Joke>,
    fallbacks: usize,
    skipped: usize,
}

/// Drives the five stages for one theme.
pub struct Pipeline {
    stages: Stages,
    workers: usize,
}

impl Pipeline {
    pub fn new(stages: Stages) -> Self {
        Self { stages, workers: 1 }
    }

    /// Number of idea branches in flight at once (at least one).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn stages(&self) -> &Stages {
        &self.stages
    }

    /// Run the whole pipeline.
    ///
    /// Never fails: an empty observation or idea stage ends the run early
    /// with `stats.halted` set, and per-unit failures are counted instead of
    /// propagated.
    pub async fn run(&self, theme: &str, fan_out: FanOut) -> PipelineResult {
        let fan_out = fan_out.normalized();
        let audit_before = self.stages.audit().stats().await;

        let mut result = PipelineResult::new(theme, fan_out);
        result.stats.requested_ideas = fan_out.num_ideas;

        info!(
            theme,
            ideas = fan_out.num_ideas,
            rubrics_per_idea = fan_out.rubrics_per_idea,
            critiques_per_rubric = fan_out.critiques_per_rubric,
            "Starting pipeline run"
        );

        info!("Stage 1: generating observations");
        let first = self.stages.first_order_observations(theme).await;
        result.stats.fallback_units += first.fallbacks;

        if first.records.is_empty() {
            self.halt(&mut result, HaltReason::NoObservations);
            self.record_calls(&mut result, audit_before.total_calls, audit_before.failed).await;
            return result;
        }

        let second = self
            .stages
            .second_order_observations(theme, &first.records)
            .await;
        result.stats.fallback_units += second.fallbacks;

        let mut observations = first.records;
        observations.extend(second.records);
        result.observations = Observations::from_records(&observations);

        info!("Stage 2: formulating joke ideas");
        let formulated = self
            .stages
            .formulate_ideas(theme, &result.observations.combined())
            .await;
        result.stats.fallback_units += formulated.fallbacks;

        let mut ideas = formulated.records;
        if ideas.is_empty() {
            self.halt(&mut result, HaltReason::NoIdeas);
            self.record_calls(&mut result, audit_before.total_calls, audit_before.failed).await;
            return result;
        }

        if ideas.len() > fan_out.num_ideas {
            info!(generated = ideas.len(), kept = fan_out.num_ideas, "Limiting joke ideas");
            ideas.truncate(fan_out.num_ideas);
        }
        result.stats.expected_jokes = fan_out.expected_jokes(ideas.len());

        info!(
            ideas = ideas.len(),
            workers = self.workers,
            "Stages 3-5: generating rubrics, critiques and jokes"
        );
        let branches: Vec<Branch> = stream::iter(
            ideas
                .iter()
                .map(|idea| self.develop_idea(theme, idea, fan_out)),
        )
        .buffered(self.workers)
        .collect()
        .await;

        for branch in branches {
            result.rubrics.extend(branch.rubrics);
            result.jokes.extend(branch.jokes);
            result.stats.fallback_units += branch.fallbacks;
            result.stats.skipped_units += branch.skipped;
        }
        result.joke_ideas = ideas;

        integrity::retain_linked_rubrics(&result.joke_ideas, &mut result.rubrics);
        result.stats.skipped_units +=
            integrity::retain_linked_jokes(&result.joke_ideas, &result.rubrics, &mut result.jokes);

        self.record_calls(&mut result, audit_before.total_calls, audit_before.failed).await;

        info!(
            observations = result.observations.len(),
            ideas = result.joke_ideas.len(),
            rubrics = result.rubrics.len(),
            jokes = result.jokes.len(),
            expected = result.stats.expected_jokes,
            degraded = result.stats.degraded_units(),
            "Pipeline run complete"
        );
        if result.stats.degraded_units() > 0 {
            warn!(
                fallback = result.stats.fallback_units,
                skipped = result.stats.skipped_units,
                "Some units degraded"
            );
        }

        result
    }

    /// Rubrics, critiques and jokes for a single idea.
    async fn develop_idea(&self, theme: &str, idea: &Idea, fan_out: FanOut) -> Branch {
        let mut branch = Branch::default();

        let originals = match self
            .stages
            .generate_rubrics(theme, idea, fan_out.rubrics_per_idea)
            .await
        {
            Ok(output) => {
                branch.fallbacks += output.fallbacks;
                output.records
            }
            Err(e) => {
                warn!(idea_id = %idea.id, error = %e, "Skipping idea");
                branch.skipped = fan_out.rubrics_per_idea_total();
                return branch;
            }
        };

        let critiques = match self
            .stages
            .critique_rubrics(theme, idea, &originals, fan_out.critiques_per_rubric)
            .await
        {
            Ok(output) => {
                branch.fallbacks += output.fallbacks;
                output.records
            }
            Err(e) => {
                warn!(idea_id = %idea.id, error = %e, "Skipping critiques");
                Vec::new()
            }
        };

        let planned = originals.len() * (1 + fan_out.critiques_per_rubric);
        let mut rubrics = originals;
        rubrics.extend(critiques);
        integrity::retain_linked_rubrics(slice::from_ref(idea), &mut rubrics);
        branch.skipped += planned.saturating_sub(rubrics.len());

        for rubric in &rubrics {
            match self.stages.generate_joke(theme, idea, rubric).await {
                Ok(output) => {
                    branch.fallbacks += output.fallbacks;
                    branch.jokes.push(output.records);
                }
                Err(e) => {
                    warn!(rubric_id = %rubric.id, error = %e, "Skipping joke");
                    branch.skipped += 1;
                }
            }
        }

        branch.skipped += integrity::retain_linked_jokes(slice::from_ref(idea), &rubrics, &mut branch.jokes);
        branch.rubrics = rubrics;
        branch
    }

    fn halt(&self, result: &mut PipelineResult, reason: HaltReason) {
        error!(theme = %result.theme, %reason, "Pipeline halted");
        result.stats.halted = Some(reason);
    }

    async fn record_calls(&self, result: &mut PipelineResult, calls_before: usize, failed_before: usize) {
        let audit = self.stages.audit().stats().await;
        result.stats.backend_calls = audit.total_calls.saturating_sub(calls_before);
        result.stats.failed_calls = audit.failed.saturating_sub(failed_before);
    }
}
