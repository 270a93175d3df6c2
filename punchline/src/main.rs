//! Punchline - staged joke generation CLI

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use punchline::{
    config::Args,
    scoring::{self, JokeJudge, JudgmentsDocument},
    store, BaselineGenerator, Pipeline, Stages,
};
use punchline_agent::{AuditLog, LlmBackend, OpenAiBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("punchline={},punchline_agent={},warn", log_level, log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let fan_out = args.fan_out();
    info!("======================================");
    info!("  Punchline - staged joke generation");
    info!("======================================");
    info!("Theme: {}", args.theme);
    info!("API base URL: {}", args.api_base_url);
    info!("Model: {}", args.model);
    info!("Judge model: {}", args.judge_model);
    info!(
        "Fan-out: {} idea(s) x {} rubric(s) x (1 + {} critique(s))",
        fan_out.num_ideas, fan_out.rubrics_per_idea, fan_out.critiques_per_rubric
    );
    info!("Workers: {}", args.workers);
    if !args.no_baseline {
        info!("Baseline: {} x {}", args.baseline_mode.method_label(), args.baseline_jokes());
    }
    info!("======================================");

    let audit = Arc::new(AuditLog::new());
    let backend: Arc<dyn LlmBackend> = Arc::new(OpenAiBackend::new(&args.backend_config())?);

    let stages = Stages::new(Arc::clone(&backend))
        .with_audit(Arc::clone(&audit))
        .with_temperature(args.temperature)
        .with_max_tokens(args.max_tokens)
        .with_json_mode(args.json_mode);
    let pipeline = Pipeline::new(stages).with_workers(args.workers);

    let result = pipeline.run(&args.theme, fan_out).await;
    store::write_json(&args.output, &result).await?;

    if let Some(reason) = result.stats.halted {
        error!("Run halted: {}; partial results saved to {}", reason, args.output.display());
        std::process::exit(1);
    }

    info!(
        "Generated {} joke(s) from {} rubric(s) ({} expected, {} degraded)",
        result.jokes.len(),
        result.rubrics.len(),
        result.stats.expected_jokes,
        result.stats.degraded_units()
    );

    if args.no_baseline {
        return Ok(());
    }

    let baseline = BaselineGenerator::new(Arc::clone(&backend), args.baseline_mode)
        .with_audit(Arc::clone(&audit))
        .with_raw_response(args.save_raw);
    let baseline_doc = match baseline.generate(&args.theme, args.baseline_jokes()).await {
        Ok(doc) if !doc.jokes.is_empty() => doc,
        Ok(_) => {
            warn!("Baseline produced no jokes, skipping judging");
            return Ok(());
        }
        Err(e) => {
            warn!("Baseline generation failed: {}", e);
            return Ok(());
        }
    };
    store::write_json(&args.baseline_output, &baseline_doc).await?;

    if args.no_judge {
        return Ok(());
    }

    let judge_backend: Arc<dyn LlmBackend> = Arc::new(OpenAiBackend::new(&args.judge_config())?);
    let judge = JokeJudge::new(judge_backend).with_audit(Arc::clone(&audit));

    let (multistage, baseline_jokes) =
        JokeJudge::load_candidates(&args.output, &args.baseline_output).await?;
    if multistage.is_empty() || baseline_jokes.is_empty() {
        warn!("Nothing to judge after removing fallback jokes");
        return Ok(());
    }

    let judgments = judge.compare(&multistage, &baseline_jokes).await;
    JokeJudge::report(&judgments);
    if let Some(best) = scoring::top(&judgments, 1).first() {
        info!("Best joke ({}): {}", best.method, best.text);
    }
    store::write_json(&args.judgments_output, &JudgmentsDocument { judgments }).await?;

    let stats = audit.stats().await;
    info!(
        "Backend calls: {} ({} failed, avg {}ms)",
        stats.total_calls, stats.failed, stats.avg_duration_ms
    );

    Ok(())
}
