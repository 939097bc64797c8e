//! ═══════════════════════════════════════════════════════════════════════════════
//! BUTTERFLY — Command Line Entry Point
//! ═══════════════════════════════════════════════════════════════════════════════
//! run      fetch responses from Ollama, analyze, checkpoint, report
//! analyze  re-analyze saved trials offline
//! report   render a saved summary file
//! prompts  show the baseline and perturbed prompts for a topic
//! check    verify the Ollama server and model are reachable
//! ═══════════════════════════════════════════════════════════════════════════════

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use butterfly::config::ExperimentConfig;
use butterfly::perturbation::{baseline_prompt, NoiseCategory};
use butterfly::persist::{self, RunWriter};
use butterfly::report;
use butterfly::run::{ExperimentRun, RunMetadata};
use butterfly::runner::{ExperimentRunner, TrialResult};
use butterfly::source::OllamaClient;
use butterfly::trial::{Trial, TrialAnalyzer};
use butterfly::{ComparatorConfig, LyapunovFormula};

#[derive(Parser)]
#[command(name = "butterfly")]
#[command(about = "Chaos metrics for prompt perturbation experiments", long_about = None)]
struct Cli {
    /// Log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full topic × noise-category experiment
    Run {
        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Model name
        #[arg(short, long)]
        model: Option<String>,
        /// Ollama base URL
        #[arg(short, long)]
        url: Option<String>,
        /// Responses per prompt
        #[arg(short = 'n', long)]
        runs: Option<usize>,
        /// Topic to test (repeatable)
        #[arg(short, long = "topic")]
        topics: Vec<String>,
        /// Noise category to test (repeatable)
        #[arg(long = "noise")]
        noise: Vec<NoiseCategory>,
        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Analyze a saved list of trials without contacting a model
    Analyze {
        /// JSON array of trials
        trials: PathBuf,
        /// Write the summary here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Use ln(d / R) with this reference distance
        #[arg(long)]
        reference: Option<f64>,
        /// Leave empty (failed) responses out of every metric
        #[arg(long)]
        drop_failed: bool,
    },

    /// Render a saved summary file
    Report {
        /// chaos_summary_<ts>.json
        summary: PathBuf,
    },

    /// Print the prompts generated for a topic
    Prompts {
        topic: String,
    },

    /// Check that the model server is up and the model is pulled
    Check {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Ollama base URL
        #[arg(short, long)]
        url: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Run {
            config,
            model,
            url,
            runs,
            topics,
            noise,
            out,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(model) = model {
                cfg = cfg.with_model(model);
            }
            if let Some(url) = url {
                cfg = cfg.with_base_url(url);
            }
            if let Some(runs) = runs {
                cfg = cfg.with_runs_per_prompt(runs);
            }
            if !topics.is_empty() {
                cfg = cfg.with_topics(topics);
            }
            if !noise.is_empty() {
                cfg = cfg.with_noise_categories(noise);
            }
            if let Some(out) = out {
                cfg = cfg.with_output_dir(out);
            }
            cmd_run(cfg)
        }
        Commands::Analyze {
            trials,
            out,
            reference,
            drop_failed,
        } => cmd_analyze(&trials, out.as_deref(), reference, drop_failed),
        Commands::Report { summary } => cmd_report(&summary),
        Commands::Prompts { topic } => {
            cmd_prompts(&topic);
            Ok(())
        }
        Commands::Check { config, url } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(url) = url {
                cfg = cfg.with_base_url(url);
            }
            cmd_check(cfg)
        }
    }
}

/// File (if any), then environment, then validation
fn load_config(path: Option<&Path>) -> Result<ExperimentConfig> {
    let cfg = match path {
        Some(p) => ExperimentConfig::from_json_file(p)
            .with_context(|| format!("Failed to load config {}", p.display()))?,
        None => ExperimentConfig::default(),
    };
    Ok(cfg.with_env_overrides())
}

fn cmd_run(cfg: ExperimentConfig) -> Result<()> {
    cfg.validate().context("Invalid experiment config")?;

    let client = OllamaClient::new(&cfg).context("Failed to build HTTP client")?;
    match client.health_check() {
        Ok(true) => info!(model = %cfg.model, url = %cfg.base_url, "model available"),
        Ok(false) => warn!(model = %cfg.model, "model not listed by server; requests may fail"),
        Err(e) => warn!(error = %e, "health check failed; continuing"),
    }

    let runner = ExperimentRunner::new(client, cfg.clone());
    let metadata = runner.metadata();
    let writer = RunWriter::new(&cfg.output_dir, &metadata.timestamp)
        .with_context(|| format!("Failed to create {}", cfg.output_dir.display()))?;

    let mut checkpoint = |_: &ExperimentRun, trials: &[TrialResult]| {
        writer.write_incremental(trials).map(|_| ())
    };
    let results = runner.run_from(metadata, &mut checkpoint)?;

    let complete = writer.write_complete(&results.run.metadata, &results.trials)?;
    let summary = writer.write_summary(&results.run)?;
    info!(
        complete = %complete.display(),
        summary = %summary.display(),
        "results saved"
    );

    println!("{}", report::render(&results.run));
    Ok(())
}

fn cmd_analyze(
    path: &Path,
    out: Option<&Path>,
    reference: Option<f64>,
    drop_failed: bool,
) -> Result<()> {
    let trials: Vec<Trial> = persist::load_json(path)
        .with_context(|| format!("Failed to read trials from {}", path.display()))?;
    if trials.is_empty() {
        bail!("{} contains no trials", path.display());
    }

    let formula = match reference {
        Some(reference) => LyapunovFormula::PromptDistance { reference },
        None => LyapunovFormula::FixedEpsilon,
    };
    let analyzer = TrialAnalyzer::new(ComparatorConfig::default(), formula)
        .with_drop_failed_responses(drop_failed);
    let aggregator = analyzer.analyze_batch(&trials);

    let mut metadata = RunMetadata::new("offline", analyzer.estimator().formula());
    metadata.noise_types = aggregator.noise_types().map(str::to_string).collect();
    let mut topics: Vec<String> = trials.iter().filter_map(|t| t.topic.clone()).collect();
    topics.sort();
    topics.dedup();
    metadata.topics = topics;

    let mut run = ExperimentRun::new(metadata);
    run.update_from(&aggregator);
    info!(
        trials = trials.len(),
        samples = aggregator.sample_count(),
        "analysis complete"
    );

    match out {
        Some(out) => {
            persist::write_json_atomic(out, &run.summaries)?;
            info!(path = %out.display(), "summary written");
            println!("{}", report::render(&run));
        }
        None => println!("{}", serde_json::to_string_pretty(&run.summary_json()?)?),
    }
    Ok(())
}

fn cmd_report(path: &Path) -> Result<()> {
    let summaries = persist::load_summaries(path)
        .with_context(|| format!("Failed to read summary {}", path.display()))?;
    let mut metadata = RunMetadata::new("unknown", LyapunovFormula::default());
    metadata.noise_types = summaries.keys().cloned().collect();
    let run = ExperimentRun::from_summaries(metadata, summaries);
    println!("{}", report::render(&run));
    Ok(())
}

fn cmd_prompts(topic: &str) {
    println!("{:24} {}", "baseline", baseline_prompt(topic));
    for category in NoiseCategory::treatments() {
        println!("{:24} {}", category.name(), category.perturb(topic));
        println!("{:24} ({})", "", category.description());
    }
}

fn cmd_check(cfg: ExperimentConfig) -> Result<()> {
    let client = OllamaClient::new(&cfg).context("Failed to build HTTP client")?;
    let models = client
        .list_models()
        .with_context(|| format!("Ollama not reachable at {}", cfg.base_url))?;
    println!("Ollama at {}: {} model(s)", cfg.base_url, models.len());
    for m in &models {
        println!("  {m}");
    }
    if client.health_check()? {
        println!("✓ {} available", cfg.model);
        Ok(())
    } else {
        bail!("model {} not found; run `ollama pull {}`", cfg.model, cfg.model)
    }
}
