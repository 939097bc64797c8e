//! Runner Tests - Does the experiment loop drive the engine correctly?
//!
//! A scripted in-memory source stands in for Ollama; no network is touched.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use approx::assert_abs_diff_eq;

use butterfly::config::ExperimentConfig;
use butterfly::error::ConfigError;
use butterfly::perturbation::NoiseCategory;
use butterfly::persist::{self, file_stamp, RunWriter};
use butterfly::run::ExperimentRun;
use butterfly::runner::{ExperimentRunner, NoCheckpoint, TrialResult};
use butterfly::source::ResponseSource;
use butterfly::{ButterflyError, ButterflyResult};

/// Stable answer for clean prompts, a drifting one for perturbed prompts
struct ScriptedSource {
    calls: AtomicUsize,
    fail_variants: bool,
}

impl ScriptedSource {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_variants: false,
        }
    }

    fn failing_variants() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_variants: true,
        }
    }
}

impl ResponseSource for ScriptedSource {
    fn generate(&self, prompt: &str) -> String {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.starts_with("Explain ") && !prompt.contains(" and also ") {
            format!("{} is a deep subject with many sides.", &prompt[8..])
        } else if self.fail_variants {
            String::new()
        } else {
            format!("Reply {n}: {prompt}")
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

fn config() -> ExperimentConfig {
    ExperimentConfig::default()
        .with_topics(vec!["creativity".into(), "ai_safety".into()])
        .with_noise_categories(vec![NoiseCategory::Orthographic, NoiseCategory::Metacognitive])
        .with_runs_per_prompt(2)
        .with_request_delay(Duration::ZERO)
}

/// R1: every topic × category pair becomes one trial
#[test]
fn runs_full_grid() {
    let runner = ExperimentRunner::new(ScriptedSource::new(), config());
    let results = runner.run(&mut NoCheckpoint).unwrap();

    assert_eq!(results.trials.len(), 4);
    assert_eq!(results.run.metadata.model, "scripted");
    assert_eq!(results.run.metadata.noise_types, vec!["orthographic", "metacognitive"]);
    assert_eq!(results.run.metadata.runs_per_prompt, 2);

    let ortho = &results.run.summaries["orthographic"];
    assert_eq!(ortho.sample_count, 4);
    assert_eq!(ortho.mean_baseline_stability, 1.0);
    assert!(ortho.mean_noisy_stability < 1.0);
    assert!(ortho.attractor_shift < 0.0);
    assert!(ortho.mean_divergence > 0.0 && ortho.mean_divergence <= 1.0);
    assert_eq!(results.aggregator.sample_count(), 8);
}

#[test]
fn trial_results_carry_prompts_and_samples() {
    let runner = ExperimentRunner::new(ScriptedSource::new(), config());
    let results = runner.run(&mut NoCheckpoint).unwrap();

    let first = &results.trials[0];
    assert_eq!(first.topic, "creativity");
    assert_eq!(first.noise_type, "orthographic");
    assert_eq!(first.baseline_prompt, "Explain creativity");
    assert_eq!(first.noisy_prompt, "Explan creetyvyty");
    assert_eq!(
        first.sample_baseline_response,
        "creativity is a deep subject with many sides."
    );
    assert_eq!(first.outcome.records.len(), 2);
}

/// R2: checkpoint sees the growing result list after each trial
#[test]
fn checkpoint_called_per_trial() {
    let runner = ExperimentRunner::new(ScriptedSource::new(), config());
    let mut seen = Vec::new();
    let mut checkpoint = |run: &ExperimentRun, trials: &[TrialResult]| -> ButterflyResult<()> {
        assert_eq!(run.summaries.len(), 2);
        seen.push(trials.len());
        Ok(())
    };
    runner.run(&mut checkpoint).unwrap();
    assert_eq!(seen, vec![1, 2, 3, 4]);
}

#[test]
fn checkpoint_error_stops_run() {
    let source = ScriptedSource::new();
    let runner = ExperimentRunner::new(source, config());
    let mut checkpoint = |_: &ExperimentRun, trials: &[TrialResult]| -> ButterflyResult<()> {
        if trials.len() == 2 {
            return Err(ConfigError::MissingField("disk".into()).into());
        }
        Ok(())
    };
    let err = runner.run(&mut checkpoint).unwrap_err();
    assert!(matches!(err, ButterflyError::Config(_)));
}

/// R3: failed fetches reach the engine as empty strings
#[test]
fn failed_variants_count_as_full_divergence() {
    let runner = ExperimentRunner::new(ScriptedSource::failing_variants(), config());
    let results = runner.run(&mut NoCheckpoint).unwrap();
    let ortho = &results.run.summaries["orthographic"];
    assert_eq!(ortho.mean_divergence, 1.0);
    assert_eq!(ortho.std_divergence, 0.0);
}

#[test]
fn failed_variants_can_be_dropped() {
    let mut cfg = config();
    cfg.drop_failed_responses = true;
    let runner = ExperimentRunner::new(ScriptedSource::failing_variants(), cfg);
    let results = runner.run(&mut NoCheckpoint).unwrap();
    let ortho = &results.run.summaries["orthographic"];
    assert_eq!(ortho.sample_count, 0);
    assert_eq!(ortho.mean_divergence, 0.0);
    assert_eq!(ortho.mean_baseline_stability, 1.0);
    assert_eq!(ortho.mean_complexity, None);
}

/// R3b: a group emptied by failed fetches reports no stability, not perfect stability
#[test]
fn all_failed_variants_have_no_noisy_stability() {
    let mut cfg = config().with_runs_per_prompt(3);
    cfg.drop_failed_responses = true;
    let runner = ExperimentRunner::new(ScriptedSource::failing_variants(), cfg);
    let results = runner.run(&mut NoCheckpoint).unwrap();

    for summary in results.run.summaries.values() {
        assert_eq!(summary.mean_noisy_stability, 0.0);
        assert!(summary.attractor_shift <= 0.0);
    }
    assert!(results.trials.iter().all(|t| t.outcome.variant_stability.is_none()));
}

#[test]
fn complexity_carried_per_trial_and_per_noise_type() {
    let runner = ExperimentRunner::new(ScriptedSource::new(), config());
    let results = runner.run(&mut NoCheckpoint).unwrap();

    assert!(results.trials.iter().all(|t| t.mean_complexity > 0.0));
    let expected = {
        let mut scores: Vec<f64> = results
            .trials
            .iter()
            .filter(|t| t.noise_type == "metacognitive")
            .map(|t| t.mean_complexity)
            .collect();
        scores.sort_by(f64::total_cmp);
        scores.iter().sum::<f64>() / scores.len() as f64
    };
    let summary = &results.run.summaries["metacognitive"];
    assert_abs_diff_eq!(summary.mean_complexity.unwrap(), expected, epsilon = 1e-12);
}

/// R4: incremental checkpoint, complete results and summary on disk
#[test]
fn writes_run_files() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ExperimentRunner::new(ScriptedSource::new(), config());
    let metadata = runner.metadata();
    let writer = RunWriter::new(dir.path(), &metadata.timestamp).unwrap();

    let mut checkpoint = |_: &ExperimentRun, trials: &[TrialResult]| {
        writer.write_incremental(trials).map(|_| ())
    };
    let results = runner.run_from(metadata.clone(), &mut checkpoint).unwrap();
    assert_eq!(results.run.metadata.timestamp, metadata.timestamp);
    let stamp = file_stamp(&results.run.metadata.timestamp);
    assert!(writer
        .complete_path()
        .to_string_lossy()
        .ends_with(&format!("chaos_results_complete_{stamp}.json")));

    let incremental: Vec<TrialResult> = persist::load_json(&writer.incremental_path()).unwrap();
    assert_eq!(incremental.len(), results.trials.len());
    assert_eq!(incremental[3].noisy_prompt, results.trials[3].noisy_prompt);

    writer
        .write_complete(&results.run.metadata, &results.trials)
        .unwrap();
    let complete: serde_json::Value = persist::load_json(&writer.complete_path()).unwrap();
    assert_eq!(complete["metadata"]["model"], "scripted");
    assert_eq!(complete["metadata"]["lyapunov_formula"]["formula"], "fixed_epsilon");
    assert_eq!(complete["results"].as_array().unwrap().len(), 4);

    let path = writer.write_summary(&results.run).unwrap();
    let summaries = persist::load_summaries(&path).unwrap();
    for (name, saved) in &summaries {
        let live = &results.run.summaries[name];
        assert_eq!(saved.noise_type, *name);
        assert_eq!(saved.sample_count, live.sample_count);
        assert_abs_diff_eq!(saved.mean_proxy_lyapunov, live.mean_proxy_lyapunov, epsilon = 1e-12);
    }

    let raw: serde_json::Value = persist::load_json(&path).unwrap();
    let keys: Vec<&str> = raw["metacognitive"]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys.len(), 8);
    assert!(keys.contains(&"num_experiments"));
    assert!(keys.contains(&"attractor_shift"));
}
