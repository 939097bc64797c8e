//! ═══════════════════════════════════════════════════════════════════════════════
//! RUNNER — Topic × Noise-Category Experiment Loop
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! For every topic and every treatment category:
//!   1. build the baseline and perturbed prompts
//!   2. fetch N responses for each from the ResponseSource
//!   3. analyze the trial and fold it into the owned aggregator
//!   4. hand the running results to the checkpoint hook
//!
//! Rate limiting is a fixed delay between requests. Retries belong to the
//! source.
//! ═══════════════════════════════════════════════════════════════════════════════

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregator::ExperimentAggregator;
use crate::config::ExperimentConfig;
use crate::error::ButterflyResult;
use crate::perturbation::{baseline_prompt, NoiseCategory};
use crate::run::{ExperimentRun, RunMetadata};
use crate::source::ResponseSource;
use crate::trial::{Trial, TrialAnalyzer, TrialOutcome};

/// Characters of each sample response kept in results
const SAMPLE_CHARS: usize = 200;

/// Per-trial result as persisted in the results files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub topic: String,
    pub noise_type: String,
    pub baseline_prompt: String,
    pub noisy_prompt: String,
    pub outcome: TrialOutcome,
    pub mean_divergence: f64,
    /// Mean complexity score of the perturbed responses
    #[serde(default)]
    pub mean_complexity: f64,
    pub sample_baseline_response: String,
    pub sample_noisy_response: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunResults {
    pub run: ExperimentRun,
    pub trials: Vec<TrialResult>,
    pub aggregator: ExperimentAggregator,
}

/// Called after every trial with the results so far
pub trait Checkpoint {
    fn checkpoint(&mut self, run: &ExperimentRun, trials: &[TrialResult]) -> ButterflyResult<()>;
}

/// Checkpoint that does nothing
pub struct NoCheckpoint;

impl Checkpoint for NoCheckpoint {
    fn checkpoint(&mut self, _: &ExperimentRun, _: &[TrialResult]) -> ButterflyResult<()> {
        Ok(())
    }
}

impl<F> Checkpoint for F
where
    F: FnMut(&ExperimentRun, &[TrialResult]) -> ButterflyResult<()>,
{
    fn checkpoint(&mut self, run: &ExperimentRun, trials: &[TrialResult]) -> ButterflyResult<()> {
        self(run, trials)
    }
}

pub struct ExperimentRunner<S> {
    source: S,
    config: ExperimentConfig,
    analyzer: TrialAnalyzer,
}

impl<S: ResponseSource> ExperimentRunner<S> {
    pub fn new(source: S, config: ExperimentConfig) -> Self {
        let analyzer = TrialAnalyzer::new(config.comparator.clone(), config.lyapunov)
            .with_drop_failed_responses(config.drop_failed_responses);
        Self {
            source,
            config,
            analyzer,
        }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn metadata(&self) -> RunMetadata {
        let mut metadata = RunMetadata::new(self.source.model(), self.analyzer.estimator().formula());
        metadata.topics = self.config.topics.clone();
        metadata.noise_types = self.config.treatments().map(|c| c.name().to_string()).collect();
        metadata.runs_per_prompt = self.config.runs_per_prompt;
        metadata
    }

    /// Fetch N responses for one prompt
    fn collect(&self, prompt: &str) -> Vec<String> {
        let delay = self.config.request_delay();
        (0..self.config.runs_per_prompt)
            .map(|i| {
                if i > 0 {
                    pause(delay);
                }
                self.source.generate(prompt)
            })
            .collect()
    }

    /// Fetch everything for one topic/category pair
    pub fn fetch_trial(&self, topic: &str, category: NoiseCategory) -> Trial {
        let baseline = baseline_prompt(topic);
        let variant = category.perturb(topic);
        debug!(topic, noise_type = category.name(), prompt = %variant, "fetching trial");

        let baseline_responses = self.collect(&baseline);
        pause(self.config.request_delay());
        let variant_responses = self.collect(&variant);

        Trial {
            noise_type: category.name().to_string(),
            topic: Some(topic.to_string()),
            baseline_prompt: baseline,
            variant_prompt: variant,
            baseline_responses,
            variant_responses,
        }
    }

    pub fn run(&self, checkpoint: &mut impl Checkpoint) -> ButterflyResult<RunResults> {
        self.run_from(self.metadata(), checkpoint)
    }

    /// Run under metadata taken beforehand, so files named from its
    /// timestamp match the run they hold
    pub fn run_from(
        &self,
        metadata: RunMetadata,
        checkpoint: &mut impl Checkpoint,
    ) -> ButterflyResult<RunResults> {
        let mut run = ExperimentRun::new(metadata);
        let mut aggregator = ExperimentAggregator::new();
        let mut trials = Vec::new();

        let categories: Vec<NoiseCategory> = self.config.treatments().collect();
        let total = self.config.topics.len() * categories.len();
        info!(
            model = %run.metadata.model,
            total,
            runs_per_prompt = self.config.runs_per_prompt,
            formula = run.metadata.lyapunov_formula.name(),
            "starting experiment"
        );

        let mut current = 0;
        for topic in &self.config.topics {
            for &category in &categories {
                current += 1;
                info!(
                    "[{}/{}] {:.1}% {} / {}",
                    current,
                    total,
                    current as f64 / total as f64 * 100.0,
                    topic,
                    category.name()
                );

                let trial = self.fetch_trial(topic, category);
                let outcome = self.analyzer.analyze(&trial);
                outcome.accumulate_into(&mut aggregator);

                let result = TrialResult {
                    topic: topic.clone(),
                    noise_type: trial.noise_type.clone(),
                    mean_divergence: outcome.mean_divergence(),
                    mean_complexity: outcome.mean_complexity.unwrap_or(0.0),
                    sample_baseline_response: sample(&trial.baseline_responses),
                    sample_noisy_response: sample(&trial.variant_responses),
                    baseline_prompt: trial.baseline_prompt,
                    noisy_prompt: trial.variant_prompt,
                    outcome,
                    timestamp: Utc::now(),
                };
                info!("divergence {:.2}%", result.mean_divergence * 100.0);
                trials.push(result);

                run.update_from(&aggregator);
                checkpoint.checkpoint(&run, &trials)?;

                if current < total {
                    pause(self.config.request_delay());
                }
            }
        }

        info!(trials = trials.len(), "experiment complete");
        Ok(RunResults {
            run,
            trials,
            aggregator,
        })
    }
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

/// First response, truncated for the results file
fn sample(responses: &[String]) -> String {
    match responses.first() {
        Some(text) if text.chars().count() > SAMPLE_CHARS => {
            let truncated: String = text.chars().take(SAMPLE_CHARS).collect();
            format!("{truncated}...")
        }
        Some(text) => text.clone(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        let s = sample(&[long]);
        assert_eq!(s.chars().count(), SAMPLE_CHARS + 3);
        assert!(s.ends_with("..."));
        assert_eq!(sample(&[]), "");
        assert_eq!(sample(&["short".to_string()]), "short");
    }
}
