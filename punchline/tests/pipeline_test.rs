//! End-to-end pipeline runs against a scripted backend

use std::collections::HashSet;
use std::sync::Arc;

use punchline::{
    decode::{decode, format_fenced, Method},
    schema::{FALLBACK_MARKER, JOKE},
    store, FanOut, HaltReason, Pipeline, PipelineResult, Stages,
};
use punchline_agent::MockBackend;
use serde_json::json;

// ============================================================================
// Scripted replies
// ============================================================================

const FIRST_ORDER: &str = "high-level 'observations'";
const SECOND_ORDER: &str = "Derive 2-3 new";
const IDEAS: &str = "Formulate 3-5 diverse";
const RUBRIC: &str = "create a detailed rubric";
const CRITIQUE: &str = "critique it and propose";
const JOKE_PROMPT: &str = "Write a complete joke";

fn upstream(backend: MockBackend) -> MockBackend {
    backend
        .with_rule(
            FIRST_ORDER,
            "Here are a few angles:\n1. Penguins always look overdressed\n2. They cannot fly but try anyway\n* They huddle for warmth like commuters",
        )
        .with_rule(SECOND_ORDER, r#"{"observations": ["A penguin in a tuxedo is still underdressed for the Antarctic winter"]}"#)
        .with_rule(
            IDEAS,
            "```json\n{\"ideas\": [{\"concept\": \"A penguin at a job interview\"}, {\"concept\": \"Penguin fashion week\"}, {\"concept\": \"A penguin learning to fly\"}]}\n```",
        )
}

fn scripted() -> MockBackend {
    upstream(MockBackend::new("gemma-3-4b-it-qat"))
        .with_rule(
            RUBRIC,
            "Sure! ```json\n{\"type\": \"Observational\", \"structure\": \"Setup, punchline\", \"key_elements\": [\"tuxedo\", \"resume\"], \"tone\": \"dry\"}\n```",
        )
        .with_rule(
            CRITIQUE,
            r#"{"type": "Character-based", "structure": "Dialogue", "key_elements": ["interviewer", "fish"], "tone": "absurd", "critique_of_original": "Too predictable"}"#,
        )
        .with_rule(
            JOKE_PROMPT,
            r#"{"text": "The penguin aced the interview. He was already dressed for the job.", "explanation": "Tuxedo as formal wear"}"#,
        )
}

fn pipeline(backend: &Arc<MockBackend>) -> Pipeline {
    Pipeline::new(Stages::new(backend.clone()))
}

fn assert_linked(result: &PipelineResult) {
    let idea_ids: HashSet<&str> = result.joke_ideas.iter().map(|i| i.id.as_str()).collect();
    let rubric_ids: HashSet<&str> = result.rubrics.iter().map(|r| r.id.as_str()).collect();

    for rubric in &result.rubrics {
        assert!(idea_ids.contains(rubric.idea_id.as_str()));
        if let Some(original) = &rubric.original_rubric_id {
            assert!(rubric_ids.contains(original.as_str()));
        }
    }
    for joke in &result.jokes {
        assert!(rubric_ids.contains(joke.rubric_id.as_str()));
        assert!(idea_ids.contains(joke.idea_id.as_str()));
    }

    let mut all_ids: Vec<&str> = idea_ids.iter().chain(rubric_ids.iter()).copied().collect();
    all_ids.extend(result.jokes.iter().map(|j| j.id.as_str()));
    let unique: HashSet<&str> = all_ids.iter().copied().collect();
    assert_eq!(unique.len(), all_ids.len());
}

// ============================================================================
// Fan-out shape
// ============================================================================

#[tokio::test]
async fn test_single_idea_single_rubric_no_critique() {
    let backend = Arc::new(scripted());
    let result = pipeline(&backend).run("Penguins", FanOut::clamped(1, 1, 0)).await;

    assert_eq!(result.joke_ideas.len(), 1);
    assert_eq!(result.rubrics.len(), 1);
    assert_eq!(result.jokes.len(), 1);
    assert_eq!(result.jokes[0].rubric_id, result.rubrics[0].id);
    assert_eq!(result.jokes[0].theme, "Penguins");
    assert_eq!(result.stats.expected_jokes, 1);
    assert_eq!(result.stats.degraded_units(), 0);
    assert_eq!(backend.calls_matching(CRITIQUE).await, 0);
}

#[tokio::test]
async fn test_joke_count_matches_fan_out() {
    let backend = Arc::new(scripted());
    let result = pipeline(&backend).run("Penguins", FanOut::clamped(2, 2, 1)).await;

    assert_eq!(result.joke_ideas.len(), 2);
    assert_eq!(result.rubrics.len(), 2 * 2 * 2);
    assert_eq!(result.jokes.len(), 2 * 2 * (1 + 1));
    assert_eq!(result.jokes.len(), result.stats.expected_jokes);
    assert_eq!(backend.calls_matching(RUBRIC).await, 4);
    assert_eq!(backend.calls_matching(CRITIQUE).await, 4);
    assert_eq!(backend.calls_matching(JOKE_PROMPT).await, 8);
    assert_linked(&result);
}

#[tokio::test]
async fn test_fan_out_parameters_clamped() {
    let backend = Arc::new(scripted());
    let result = pipeline(&backend).run("Penguins", FanOut::clamped(999, 1, -1)).await;

    assert_eq!(result.config.num_ideas, 10);
    assert_eq!(result.config.critiques_per_rubric, 0);
    // only three ideas came back from the model
    assert_eq!(result.joke_ideas.len(), 3);
    assert_eq!(result.stats.requested_ideas, 10);
    assert_eq!(result.stats.expected_jokes, 3);
    assert_eq!(result.jokes.len(), 3);

    let unclamped = FanOut {
        num_ideas: 0,
        rubrics_per_idea: 0,
        critiques_per_rubric: 9,
    };
    let result = pipeline(&Arc::new(scripted())).run("Penguins", unclamped).await;
    assert_eq!(result.config, FanOut::clamped(1, 1, 3));
    assert_eq!(result.jokes.len(), 4);
}

#[tokio::test]
async fn test_critiques_are_linked_to_originals() {
    let backend = Arc::new(scripted());
    let result = pipeline(&backend).run("Penguins", FanOut::clamped(1, 2, 2)).await;

    let originals: Vec<_> = result.rubrics.iter().filter(|r| !r.is_critique()).collect();
    let critiques: Vec<_> = result.rubrics.iter().filter(|r| r.is_critique()).collect();
    assert_eq!(originals.len(), 2);
    assert_eq!(critiques.len(), 4);
    assert!(critiques
        .iter()
        .all(|c| c.critique_of_original.as_deref() == Some("Too predictable")));
    assert_eq!(result.jokes.len(), 6);
    assert_linked(&result);
}

#[tokio::test]
async fn test_concurrent_workers_match_sequential() {
    let sequential = pipeline(&Arc::new(scripted()))
        .run("Penguins", FanOut::clamped(3, 2, 1))
        .await;
    let concurrent = pipeline(&Arc::new(scripted()))
        .with_workers(4)
        .run("Penguins", FanOut::clamped(3, 2, 1))
        .await;

    assert_eq!(sequential.jokes.len(), concurrent.jokes.len());
    assert_eq!(sequential.stats.backend_calls, concurrent.stats.backend_calls);
    assert_linked(&concurrent);
}

// ============================================================================
// Early termination
// ============================================================================

#[tokio::test]
async fn test_empty_observations_halt_the_run() {
    let backend = Arc::new(MockBackend::default().with_rule(FIRST_ORDER, r#"{"observations": []}"#));
    let result = pipeline(&backend).run("Penguins", FanOut::clamped(3, 2, 1)).await;

    assert_eq!(result.stats.halted, Some(HaltReason::NoObservations));
    assert!(result.observations.is_empty());
    assert!(result.joke_ideas.is_empty());
    assert!(result.rubrics.is_empty());
    assert!(result.jokes.is_empty());
    assert_eq!(result.stats.expected_jokes, 0);
    assert_eq!(backend.call_count(), 1);
    assert_eq!(backend.calls_matching(SECOND_ORDER).await, 0);
    assert_eq!(backend.calls_matching(IDEAS).await, 0);
}

#[tokio::test]
async fn test_empty_ideas_halt_the_run() {
    let backend = Arc::new(
        MockBackend::default()
            .with_rule(FIRST_ORDER, r#"{"observations": ["cold"]}"#)
            .with_rule(SECOND_ORDER, r#"{"observations": []}"#)
            .with_rule(IDEAS, r#"{"ideas": []}"#),
    );
    let result = pipeline(&backend).run("Penguins", FanOut::clamped(3, 2, 1)).await;

    assert_eq!(result.stats.halted, Some(HaltReason::NoIdeas));
    assert_eq!(result.observations.first_order, vec!["cold"]);
    assert!(result.jokes.is_empty());
    assert_eq!(backend.call_count(), 3);
    assert_eq!(result.stats.backend_calls, 3);
}

// ============================================================================
// Degraded units
// ============================================================================

#[tokio::test]
async fn test_transport_failures_degrade_without_aborting() {
    let backend = Arc::new(
        upstream(MockBackend::default())
            .with_rule(
                RUBRIC,
                r#"{"type": "Pun", "structure": "One-liner", "key_elements": ["ice"], "tone": "dry"}"#,
            )
            .with_failure(JOKE_PROMPT, "connection reset by peer"),
    );
    let result = pipeline(&backend).run("Penguins", FanOut::clamped(2, 2, 0)).await;

    assert_eq!(result.jokes.len(), 4);
    assert!(result.jokes.iter().all(|j| j.text.starts_with(FALLBACK_MARKER)));
    assert_eq!(result.stats.fallback_units, 4);
    assert_eq!(result.stats.failed_calls, 4);
    assert_eq!(result.stats.degraded_units(), 4);
    assert_linked(&result);
}

#[tokio::test]
async fn test_unparseable_rubrics_fall_back_to_placeholders() {
    let backend = Arc::new(
        upstream(MockBackend::default())
            .with_rule(RUBRIC, "I'd rather not write a rubric today.")
            .with_rule(JOKE_PROMPT, "Why did the penguin cross the ice? To get to the other floe."),
    );
    let result = pipeline(&backend).run("Penguins", FanOut::clamped(1, 2, 0)).await;

    assert_eq!(result.rubrics.len(), 2);
    assert!(result.rubrics.iter().all(|r| r.joke_type.starts_with(FALLBACK_MARKER)));
    assert_eq!(result.jokes.len(), 2);
    // prose replies are wrapped as the joke text
    assert_eq!(
        result.jokes[0].text,
        "Why did the penguin cross the ice? To get to the other floe."
    );
    assert_eq!(result.stats.fallback_units, 4);
}

// ============================================================================
// Decoder and persistence
// ============================================================================

#[test]
fn test_fenced_joke_round_trip() {
    let joke = json!({"text": "Ice to meet you.", "explanation": "A pun on nice"});
    let decoded = decode(&format_fenced(&joke), &JOKE);
    assert_eq!(decoded.method, Method::FencedBlock);
    assert_eq!(decoded.value, joke);

    let again = decode(&decoded.value.to_string(), &JOKE);
    assert_eq!(again.value, joke);
}

#[tokio::test]
async fn test_result_persisted_and_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");

    let result = pipeline(&Arc::new(scripted()))
        .run("Penguins", FanOut::clamped(1, 1, 1))
        .await;
    store::write_json(&path, &result).await.unwrap();

    let raw: serde_json::Value = store::read_json(&path).await.unwrap();
    assert_eq!(raw["theme"], json!("Penguins"));
    assert_eq!(raw["config"]["plans_per_idea"], json!(1));
    assert_eq!(raw["rubrics"][0]["type"], json!("Observational"));
    assert!(raw["rubrics"][0].get("original_rubric_id").is_none());
    assert!(raw["rubrics"][1]["original_rubric_id"].is_string());
    assert!(raw["jokes"][0]["metadata"]["joke_type"].is_string());

    let reloaded: PipelineResult = store::read_json(&path).await.unwrap();
    assert_eq!(reloaded, result);
}

#[tokio::test]
async fn test_halted_run_is_still_persistable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.json");

    let backend = Arc::new(MockBackend::default().with_rule(FIRST_ORDER, r#"{"observations": []}"#));
    let result = pipeline(&backend).run("Penguins", FanOut::default()).await;
    store::write_json(&path, &result).await.unwrap();

    let raw: serde_json::Value = store::read_json(&path).await.unwrap();
    assert_eq!(raw["stats"]["halted"], json!("no_observations"));
    assert_eq!(raw["jokes"], json!([]));
}
