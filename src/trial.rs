//! ═══════════════════════════════════════════════════════════════════════════════
//! TRIAL — One Baseline/Variant Prompt Pair, Repeated N Times
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! The collaborator hands over the repeated responses explicitly; nothing is
//! inferred from call timing. A trial yields one DivergenceRecord per repeat
//! and a StabilityMeasurement per prompt group.
//!
//! Analysis is pure, so `analyze_batch` fans trials out over rayon and folds
//! the per-thread aggregators back together with `merge`.
//! ═══════════════════════════════════════════════════════════════════════════════

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aggregator::ExperimentAggregator;
use crate::comparator::{ComparatorConfig, ResponseComparator};
use crate::lyapunov::{LyapunovEstimator, LyapunovFormula};
use crate::records::{DivergenceRecord, GroupLabel, ResponsePair, StabilityMeasurement};
use crate::stability::AttractorStabilityAnalyzer;
use crate::stats::mean;

// ═══════════════════════════════════════════════════════════════════════════════
// TRIAL
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trial {
    pub noise_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default)]
    pub baseline_prompt: String,
    #[serde(default)]
    pub variant_prompt: String,
    pub baseline_responses: Vec<String>,
    pub variant_responses: Vec<String>,
}

impl Trial {
    /// Repeats zipped into pairs; surplus responses on the longer side only
    /// feed stability
    pub fn pairs(&self) -> Vec<ResponsePair> {
        self.baseline_responses
            .iter()
            .zip(&self.variant_responses)
            .enumerate()
            .map(|(i, (baseline, variant))| {
                let pair = ResponsePair::new(baseline.as_str(), variant.as_str(), &self.noise_type)
                    .with_trial_index(i);
                match &self.topic {
                    Some(topic) => pair.with_topic(topic.as_str()),
                    None => pair,
                }
            })
            .collect()
    }
}

/// Everything derived from one trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub noise_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub records: Vec<DivergenceRecord>,
    /// `None` when dropped fetches left the group without data
    pub baseline_stability: Option<StabilityMeasurement>,
    pub variant_stability: Option<StabilityMeasurement>,
    /// Mean complexity score of the perturbed responses
    #[serde(default)]
    pub mean_complexity: Option<f64>,
}

impl TrialOutcome {
    /// Fold this outcome into an aggregator
    pub fn accumulate_into(&self, aggregator: &mut ExperimentAggregator) {
        for record in &self.records {
            aggregator.accumulate(&self.noise_type, record);
        }
        for measurement in [&self.baseline_stability, &self.variant_stability]
            .into_iter()
            .flatten()
        {
            aggregator.accumulate_group_stability(&self.noise_type, measurement);
        }
        if let Some(score) = self.mean_complexity {
            aggregator.accumulate_complexity(&self.noise_type, score);
        }
    }

    pub fn mean_divergence(&self) -> f64 {
        mean(&self.records.iter().map(|r| r.edit_distance).collect::<Vec<_>>())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ANALYZER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct TrialAnalyzer {
    comparator: ResponseComparator,
    estimator: LyapunovEstimator,
    stability: AttractorStabilityAnalyzer,
    /// Drop pairs with an empty side and empty responses from stability groups
    drop_failed_responses: bool,
}

impl TrialAnalyzer {
    pub fn new(comparator_config: ComparatorConfig, formula: LyapunovFormula) -> Self {
        let comparator = ResponseComparator::new(comparator_config);
        Self {
            stability: AttractorStabilityAnalyzer::new(comparator.clone()),
            comparator,
            estimator: LyapunovEstimator::new(formula),
            drop_failed_responses: false,
        }
    }

    pub fn with_drop_failed_responses(mut self, drop: bool) -> Self {
        self.drop_failed_responses = drop;
        self
    }

    pub fn estimator(&self) -> &LyapunovEstimator {
        &self.estimator
    }

    pub fn analyze_pair(&self, pair: &ResponsePair) -> DivergenceRecord {
        self.comparator.compare(pair, &self.estimator)
    }

    pub fn analyze(&self, trial: &Trial) -> TrialOutcome {
        let pairs = trial.pairs();
        let records: Vec<DivergenceRecord> = pairs
            .iter()
            .filter(|p| !(self.drop_failed_responses && p.has_empty_side()))
            .map(|p| self.analyze_pair(p))
            .collect();

        if records.len() < pairs.len() {
            tracing::debug!(
                noise_type = %trial.noise_type,
                dropped = pairs.len() - records.len(),
                "skipped pairs with a failed response"
            );
        }

        TrialOutcome {
            noise_type: trial.noise_type.clone(),
            topic: trial.topic.clone(),
            records,
            baseline_stability: self.group_stability(GroupLabel::Baseline, &trial.baseline_responses),
            variant_stability: self.group_stability(GroupLabel::Variant, &trial.variant_responses),
            mean_complexity: self.mean_complexity(&trial.variant_responses),
        }
    }

    /// Responses that count toward group statistics
    fn usable<'a>(&self, responses: &'a [String]) -> Vec<&'a str> {
        responses
            .iter()
            .map(String::as_str)
            .filter(|r| !(self.drop_failed_responses && r.is_empty()))
            .collect()
    }

    fn group_stability(
        &self,
        label: GroupLabel,
        responses: &[String],
    ) -> Option<StabilityMeasurement> {
        let kept = self.usable(responses);
        // Dropping fetches below two responses leaves no pairs to measure
        if kept.len() < responses.len() && kept.len() < 2 {
            tracing::debug!(%label, kept = kept.len(), "no stability for group");
            return None;
        }
        Some(self.stability.stability(label, &kept))
    }

    fn mean_complexity(&self, responses: &[String]) -> Option<f64> {
        let kept = self.usable(responses);
        if kept.is_empty() {
            return None;
        }
        let scores: Vec<f64> = kept
            .iter()
            .map(|r| self.comparator.features(r).complexity_score())
            .collect();
        Some(mean(&scores))
    }

    /// Analyze many trials in parallel and reduce them into one aggregator
    pub fn analyze_batch(&self, trials: &[Trial]) -> ExperimentAggregator {
        trials
            .par_iter()
            .map(|trial| {
                let mut local = ExperimentAggregator::new();
                self.analyze(trial).accumulate_into(&mut local);
                local
            })
            .reduce(ExperimentAggregator::new, |mut a, b| {
                a.merge(b);
                a
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(baseline: &[&str], variant: &[&str]) -> Trial {
        Trial {
            noise_type: "orthographic".to_string(),
            topic: Some("creativity".to_string()),
            baseline_prompt: "Explain creativity".to_string(),
            variant_prompt: "Explan creetyvyty".to_string(),
            baseline_responses: baseline.iter().map(|s| s.to_string()).collect(),
            variant_responses: variant.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_pairs_zip_shorter_side() {
        let t = trial(&["a", "b", "c"], &["x", "y"]);
        let pairs = t.pairs();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].trial_index, 1);
        assert_eq!(pairs[1].baseline_text, "b");
        assert_eq!(pairs[0].topic.as_deref(), Some("creativity"));
    }

    #[test]
    fn test_analyze_produces_record_per_pair() {
        let t = trial(&["hello world", "hello world"], &["hello world", "goodbye"]);
        let out = TrialAnalyzer::default().analyze(&t);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].edit_distance, 0.0);
        assert!(out.records[1].edit_distance > 0.0);
        assert_eq!(out.baseline_stability.unwrap().stability, 1.0);
        assert!(out.variant_stability.unwrap().stability < 1.0);
        assert!(out.mean_complexity.unwrap() > 0.0);
    }

    #[test]
    fn test_failed_responses_flow_through_by_default() {
        let t = trial(&["hello", ""], &["hello", "hello"]);
        let out = TrialAnalyzer::default().analyze(&t);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[1].edit_distance, 1.0);
        assert_eq!(out.baseline_stability.unwrap().stability, 0.0);
    }

    #[test]
    fn test_failed_responses_dropped_when_configured() {
        let t = trial(&["hello", ""], &["hello", "hello"]);
        let out = TrialAnalyzer::default()
            .with_drop_failed_responses(true)
            .analyze(&t);
        assert_eq!(out.records.len(), 1);
        // One surviving baseline response leaves nothing to compare
        assert_eq!(out.baseline_stability, None);
        assert_eq!(out.variant_stability.unwrap().stability, 1.0);
    }

    #[test]
    fn test_all_failed_group_adds_no_stability() {
        let t = trial(&["alpha beta", "gamma delta epsilon", "zeta"], &["", "", ""]);
        let out = TrialAnalyzer::default()
            .with_drop_failed_responses(true)
            .analyze(&t);
        assert!(out.records.is_empty());
        assert_eq!(out.variant_stability, None);
        assert_eq!(out.mean_complexity, None);

        let mut agg = ExperimentAggregator::new();
        out.accumulate_into(&mut agg);
        let summary = agg.finalize("orthographic");
        assert_eq!(summary.mean_noisy_stability, 0.0);
        assert!(summary.mean_baseline_stability < 1.0);
        assert!(summary.attractor_shift < 0.0);
    }

    #[test]
    fn test_batch_honours_drop_failed() {
        let trials = vec![
            trial(&["same", "same"], &["", "other"]),
            trial(&["same", "same"], &["", ""]),
        ];
        let keep = TrialAnalyzer::default().analyze_batch(&trials);
        let drop = TrialAnalyzer::default()
            .with_drop_failed_responses(true)
            .analyze_batch(&trials);

        assert_eq!(keep.finalize("orthographic").sample_count, 4);
        let dropped = drop.finalize("orthographic");
        assert_eq!(dropped.sample_count, 1);
        assert!(dropped.mean_divergence < 1.0);
        assert_eq!(dropped.mean_baseline_stability, 1.0);
        // Neither variant group keeps two responses
        assert_eq!(dropped.mean_noisy_stability, 0.0);
    }

    #[test]
    fn test_single_response_still_trivially_stable() {
        let out = TrialAnalyzer::default()
            .with_drop_failed_responses(true)
            .analyze(&trial(&["only one"], &["just one"]));
        assert_eq!(out.baseline_stability.unwrap().stability, 1.0);
        assert_eq!(out.variant_stability.unwrap().stability, 1.0);
    }

    #[test]
    fn test_batch_matches_sequential() {
        let trials: Vec<Trial> = (0..8)
            .map(|i| {
                let mut t = trial(&["the cat sat", "the cat sat down"], &["a dog ran", "the cat sat"]);
                t.noise_type = format!("noise_{}", i % 3);
                t
            })
            .collect();

        let analyzer = TrialAnalyzer::default();
        let batch = analyzer.analyze_batch(&trials);

        let mut sequential = ExperimentAggregator::new();
        for t in &trials {
            analyzer.analyze(t).accumulate_into(&mut sequential);
        }

        assert_eq!(batch.finalize_all(), sequential.finalize_all());
    }
}
