//! Comparative judging of pipeline and baseline jokes.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use punchline_agent::{AuditLog, CompletionRequest, LlmBackend};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::baseline::BaselineDocument;
use crate::decode::{decode_as, Typed};
use crate::model::PipelineResult;
use crate::prompts;
use crate::schema::{FALLBACK_MARKER, JUDGMENT};
use crate::store::{self, StoreError};

/// Method label for pipeline jokes.
pub const MULTISTAGE_METHOD: &str = "multistage";

/// Most jokes judged per method.
pub const MAX_SAMPLE: usize = 5;

const JUDGE_TEMPERATURE: f32 = 0.2;

/// Rated criteria, in report order.
pub const CRITERIA: [&str; 5] = ["originality", "cleverness", "surprise", "relatability", "overall"];

/// A joke submitted for judging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub text: String,
    pub method: String,
}

impl Candidate {
    fn is_fallback(&self) -> bool {
        self.text.trim_start().starts_with(FALLBACK_MARKER)
    }
}

/// Scores for one joke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub joke_id: String,
    pub method: String,
    pub text: String,
    pub originality: f64,
    pub cleverness: f64,
    pub surprise: f64,
    pub relatability: f64,
    pub overall: f64,
    pub rationale: String,
    /// Judge reply could not be decoded; excluded from statistics
    #[serde(default)]
    pub degraded: bool,
}

impl Judgment {
    pub fn score(&self, criterion: &str) -> Option<f64> {
        match criterion {
            "originality" => Some(self.originality),
            "cleverness" => Some(self.cleverness),
            "surprise" => Some(self.surprise),
            "relatability" => Some(self.relatability),
            "overall" => Some(self.overall),
            _ => None,
        }
    }
}

/// Persisted judgments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgmentsDocument {
    pub judgments: Vec<Judgment>,
}

/// Mean scores for one method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodStats {
    pub method: String,
    pub judged: usize,
    /// Mean per criterion
    pub means: BTreeMap<String, f64>,
    /// Mean across all criteria
    pub combined: f64,
}

#[derive(Debug, Default, Deserialize)]
struct JudgmentFields {
    originality: f64,
    cleverness: f64,
    surprise: f64,
    relatability: f64,
    overall: f64,
    rationale: String,
}

/// Pipeline jokes as candidates, fallback placeholders removed.
pub fn multistage_candidates(result: &PipelineResult) -> Vec<Candidate> {
    result
        .jokes
        .iter()
        .map(|j| Candidate {
            id: j.id.clone(),
            text: j.text.clone(),
            method: MULTISTAGE_METHOD.to_string(),
        })
        .filter(|c| !c.is_fallback())
        .collect()
}

/// Baseline jokes as candidates, fallback placeholders removed.
pub fn baseline_candidates(doc: &BaselineDocument) -> Vec<Candidate> {
    doc.jokes
        .iter()
        .map(|j| Candidate {
            id: j.id.clone(),
            text: j.text.clone(),
            method: j.method.clone(),
        })
        .filter(|c| !c.is_fallback())
        .collect()
}

/// `n` candidates spread evenly over the list.
pub fn sample(candidates: &[Candidate], n: usize) -> Vec<Candidate> {
    let len = candidates.len();
    let n = n.min(len);
    (0..n).map(|i| candidates[i * len / n].clone()).collect()
}

/// Per-method means, skipping degraded judgments. Methods are sorted by name.
pub fn statistics(judgments: &[Judgment]) -> Vec<MethodStats> {
    let mut by_method: BTreeMap<&str, Vec<&Judgment>> = BTreeMap::new();
    for judgment in judgments.iter().filter(|j| !j.degraded) {
        by_method.entry(judgment.method.as_str()).or_default().push(judgment);
    }

    by_method
        .into_iter()
        .map(|(method, group)| {
            let count = group.len() as f64;
            let means: BTreeMap<String, f64> = CRITERIA
                .iter()
                .map(|c| {
                    let total: f64 = group.iter().filter_map(|j| j.score(c)).sum();
                    (c.to_string(), total / count)
                })
                .collect();
            let combined = means.values().sum::<f64>() / CRITERIA.len() as f64;
            MethodStats {
                method: method.to_string(),
                judged: group.len(),
                means,
                combined,
            }
        })
        .collect()
}

/// Highest `overall` first.
pub fn top(judgments: &[Judgment], k: usize) -> Vec<&Judgment> {
    let mut ranked: Vec<&Judgment> = judgments.iter().filter(|j| !j.degraded).collect();
    ranked.sort_by(|a, b| b.overall.total_cmp(&a.overall));
    ranked.truncate(k);
    ranked
}

/// Rates jokes with a separate judge backend.
pub struct JokeJudge {
    backend: Arc<dyn LlmBackend>,
    audit: Arc<AuditLog>,
}

impl JokeJudge {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            audit: Arc::new(AuditLog::new()),
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    /// Load both persisted documents as candidate lists.
    pub async fn load_candidates(
        multistage_path: impl AsRef<Path>,
        baseline_path: impl AsRef<Path>,
    ) -> Result<(Vec<Candidate>, Vec<Candidate>), StoreError> {
        let result: PipelineResult = store::read_json(multistage_path).await?;
        let baseline: BaselineDocument = store::read_json(baseline_path).await?;
        Ok((multistage_candidates(&result), baseline_candidates(&baseline)))
    }

    /// Rate a single joke.
    pub async fn judge(&self, candidate: &Candidate) -> Judgment {
        let request = CompletionRequest::user(prompts::judgment(&candidate.text))
            .with_system(prompts::JUDGE_SYSTEM)
            .with_temperature(JUDGE_TEMPERATURE);

        let raw = match self
            .audit
            .complete(self.backend.as_ref(), "judge_joke", request)
            .await
        {
            Ok(response) => response.content,
            Err(e) => {
                warn!(joke_id = %candidate.id, error = %e, "Judge call failed");
                String::new()
            }
        };

        let typed: Typed<JudgmentFields> = decode_as(&raw, &JUDGMENT);
        let degraded = typed.is_fallback();
        if degraded {
            warn!(joke_id = %candidate.id, "Judgment degraded to fallback");
        }
        let fields = typed.value;

        Judgment {
            joke_id: candidate.id.clone(),
            method: candidate.method.clone(),
            text: candidate.text.clone(),
            originality: fields.originality,
            cleverness: fields.cleverness,
            surprise: fields.surprise,
            relatability: fields.relatability,
            overall: fields.overall,
            rationale: fields.rationale,
            degraded,
        }
    }

    /// Judge an equal-sized sample from each list.
    pub async fn compare(&self, first: &[Candidate], second: &[Candidate]) -> Vec<Judgment> {
        let n = first.len().min(second.len()).min(MAX_SAMPLE);
        info!(per_method = n, "Judging jokes");

        let mut judgments = Vec::with_capacity(n * 2);
        for candidate in sample(first, n).iter().chain(sample(second, n).iter()) {
            judgments.push(self.judge(candidate).await);
        }
        judgments
    }

    /// Log per-method means and the best jokes.
    pub fn report(judgments: &[Judgment]) {
        for stats in statistics(judgments) {
            info!(
                method = %stats.method,
                judged = stats.judged,
                means = ?stats.means,
                combined = stats.combined,
                "Judging results"
            );
        }
        for (rank, judgment) in top(judgments, 5).into_iter().enumerate() {
            info!(
                rank = rank + 1,
                method = %judgment.method,
                overall = judgment.overall,
                text = %judgment.text,
                "Top joke"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use punchline_agent::MockBackend;

    fn candidate(id: &str, text: &str, method: &str) -> Candidate {
        Candidate {
            id: id.into(),
            text: text.into(),
            method: method.into(),
        }
    }

    fn judgment(method: &str, overall: f64, degraded: bool) -> Judgment {
        Judgment {
            joke_id: "j".into(),
            method: method.into(),
            text: "t".into(),
            originality: overall,
            cleverness: overall,
            surprise: overall,
            relatability: overall,
            overall,
            rationale: String::new(),
            degraded,
        }
    }

    #[test]
    fn test_sample_spreads_evenly() {
        let list: Vec<Candidate> = (0..10).map(|i| candidate(&i.to_string(), "t", "m")).collect();
        let ids: Vec<String> = sample(&list, 5).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["0", "2", "4", "6", "8"]);
        assert_eq!(sample(&list[..2], 5).len(), 2);
        assert!(sample(&[], 3).is_empty());
    }

    #[test]
    fn test_statistics_skip_degraded() {
        let judgments = vec![
            judgment("multistage", 8.0, false),
            judgment("multistage", 6.0, false),
            judgment("multistage", 0.0, true),
            judgment("enhanced_baseline", 5.0, false),
        ];
        let stats = statistics(&judgments);
        assert_eq!(stats.len(), 2);
        let multistage = stats.iter().find(|s| s.method == "multistage").unwrap();
        assert_eq!(multistage.judged, 2);
        assert_eq!(multistage.means["overall"], 7.0);
        assert_eq!(multistage.combined, 7.0);
    }

    #[test]
    fn test_top_ranked_by_overall() {
        let judgments = vec![
            judgment("a", 3.0, false),
            judgment("b", 9.0, false),
            judgment("c", 10.0, true),
        ];
        let ranked = top(&judgments, 5);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].method, "b");
    }

    #[tokio::test]
    async fn test_compare_samples_equal_counts() {
        let backend = Arc::new(MockBackend::new("judge").with_response(
            r#"{"originality": 7, "cleverness": "8/10", "surprise": 6, "relatability": 9, "overall": 7.5, "rationale": "solid"}"#,
        ));
        let judge = JokeJudge::new(backend.clone());

        let first: Vec<Candidate> = (0..7).map(|i| candidate(&i.to_string(), "joke", "multistage")).collect();
        let second = vec![
            candidate("b1", "joke", "enhanced_baseline"),
            candidate("b2", "joke", "enhanced_baseline"),
        ];
        let judgments = judge.compare(&first, &second).await;

        assert_eq!(judgments.len(), 4);
        assert_eq!(backend.call_count(), 4);
        assert_eq!(judgments[0].cleverness, 8.0);
        assert_eq!(judgments[0].overall, 7.5);
        assert!(!judgments[0].degraded);
    }

    #[tokio::test]
    async fn test_undecodable_judgment_is_degraded() {
        let backend = Arc::new(MockBackend::new("judge").with_response("I refuse to rate this."));
        let judge = JokeJudge::new(backend);
        let judgment = judge.judge(&candidate("j1", "joke", "multistage")).await;
        assert!(judgment.degraded);
        assert_eq!(judgment.overall, 0.0);
    }

    #[test]
    fn test_fallback_jokes_filtered() {
        let doc = BaselineDocument {
            jokes: vec![],
            config: crate::baseline::BaselineConfig {
                prompt: "penguins".into(),
                model: "m".into(),
                enhanced_prompting: true,
            },
            raw_response: None,
        };
        assert!(baseline_candidates(&doc).is_empty());
        assert!(candidate("x", "Fallback joke: ...", "m").is_fallback());
        assert!(!candidate("x", "A real joke", "m").is_fallback());
    }
}
