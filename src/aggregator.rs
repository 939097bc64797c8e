//! ═══════════════════════════════════════════════════════════════════════════════
//! AGGREGATOR — Per-Noise-Type Reduction of Trial Records
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Records are grouped by noise type and reduced to a `NoiseTypeSummary`.
//! Accumulators keep the raw samples as multisets and reduce them in sorted
//! order, so:
//! - `finalize` after any arrival order gives bit-identical summaries
//! - `merge` is associative and commutative (parallel map-reduce)
//! - a partial summary can be taken after every trial (checkpointing) and the
//!   final one still matches a batch reduction
//!
//! `SharedAggregator` wraps one instance in a lock for concurrent producers.
//! ═══════════════════════════════════════════════════════════════════════════════

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::classifier::ChaosLevel;
use crate::records::{DivergenceRecord, GroupLabel, StabilityMeasurement};
use crate::stats::{mean, Moments};

// ═══════════════════════════════════════════════════════════════════════════════
// SUMMARY
// ═══════════════════════════════════════════════════════════════════════════════

/// Summary statistics for one noise category.
/// Serializes to the downstream reporting format; the noise type is the key of
/// the enclosing map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseTypeSummary {
    #[serde(skip)]
    pub noise_type: String,
    pub mean_divergence: f64,
    pub std_divergence: f64,
    pub mean_proxy_lyapunov: f64,
    pub std_proxy_lyapunov: f64,
    pub mean_baseline_stability: f64,
    pub mean_noisy_stability: f64,
    /// `mean_noisy_stability - mean_baseline_stability`
    pub attractor_shift: f64,
    #[serde(rename = "num_experiments")]
    pub sample_count: usize,
    /// Mean response complexity of the perturbed group; report only, not part
    /// of the summary file
    #[serde(skip)]
    pub mean_complexity: Option<f64>,
}

impl NoiseTypeSummary {
    /// Zero-valued summary for a noise type with no records
    pub fn empty(noise_type: impl Into<String>) -> Self {
        Self {
            noise_type: noise_type.into(),
            mean_divergence: 0.0,
            std_divergence: 0.0,
            mean_proxy_lyapunov: 0.0,
            std_proxy_lyapunov: 0.0,
            mean_baseline_stability: 0.0,
            mean_noisy_stability: 0.0,
            attractor_shift: 0.0,
            sample_count: 0,
            mean_complexity: None,
        }
    }

    /// Derived from `mean_proxy_lyapunov`
    pub fn chaos_classification(&self) -> ChaosLevel {
        ChaosLevel::classify(self.mean_proxy_lyapunov)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACCUMULATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Raw samples for one noise type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoiseAccumulator {
    edit_distances: Vec<f64>,
    proxy_lyapunovs: Vec<f64>,
    baseline_stabilities: Vec<f64>,
    variant_stabilities: Vec<f64>,
    complexities: Vec<f64>,
}

impl NoiseAccumulator {
    pub fn push_record(&mut self, record: &DivergenceRecord) {
        self.edit_distances.push(record.edit_distance);
        self.proxy_lyapunovs.push(record.proxy_lyapunov);
    }

    pub fn push_stability(&mut self, measurement: &StabilityMeasurement) {
        match measurement.group_label {
            GroupLabel::Baseline => self.baseline_stabilities.push(measurement.stability),
            GroupLabel::Variant => self.variant_stabilities.push(measurement.stability),
        }
    }

    pub fn push_complexity(&mut self, score: f64) {
        self.complexities.push(score);
    }

    /// Multiset union
    pub fn merge(&mut self, other: NoiseAccumulator) {
        self.edit_distances.extend(other.edit_distances);
        self.proxy_lyapunovs.extend(other.proxy_lyapunovs);
        self.baseline_stabilities.extend(other.baseline_stabilities);
        self.variant_stabilities.extend(other.variant_stabilities);
        self.complexities.extend(other.complexities);
    }

    /// Number of divergence records
    pub fn len(&self) -> usize {
        self.edit_distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edit_distances.is_empty()
            && self.baseline_stabilities.is_empty()
            && self.variant_stabilities.is_empty()
            && self.complexities.is_empty()
    }

    pub fn summarize(&self, noise_type: &str) -> NoiseTypeSummary {
        if self.is_empty() {
            return NoiseTypeSummary::empty(noise_type);
        }

        let divergence = Moments::from_samples(&self.edit_distances);
        let lyapunov = Moments::from_samples(&self.proxy_lyapunovs);
        let baseline_stability = mean(&self.baseline_stabilities);
        let noisy_stability = mean(&self.variant_stabilities);

        NoiseTypeSummary {
            noise_type: noise_type.to_string(),
            mean_divergence: divergence.mean,
            std_divergence: divergence.std_dev(),
            mean_proxy_lyapunov: lyapunov.mean,
            std_proxy_lyapunov: lyapunov.std_dev(),
            mean_baseline_stability: baseline_stability,
            mean_noisy_stability: noisy_stability,
            attractor_shift: noisy_stability - baseline_stability,
            sample_count: self.len(),
            mean_complexity: (!self.complexities.is_empty()).then(|| mean(&self.complexities)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPERIMENT AGGREGATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Explicitly owned accumulation state for one experiment run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentAggregator {
    groups: BTreeMap<String, NoiseAccumulator>,
}

impl ExperimentAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn group(&mut self, noise_type: &str) -> &mut NoiseAccumulator {
        self.groups.entry(noise_type.to_string()).or_default()
    }

    /// Add one divergence record to its noise type
    pub fn accumulate(&mut self, noise_type: &str, record: &DivergenceRecord) {
        self.group(noise_type).push_record(record);
    }

    /// Add the baseline/variant stability pair measured for one trial
    pub fn accumulate_stability(
        &mut self,
        noise_type: &str,
        baseline: &StabilityMeasurement,
        variant: &StabilityMeasurement,
    ) {
        if baseline.group_label != GroupLabel::Baseline || variant.group_label != GroupLabel::Variant
        {
            tracing::warn!(
                noise_type,
                baseline_label = %baseline.group_label,
                variant_label = %variant.group_label,
                "stability measurements carry unexpected group labels"
            );
        }
        let group = self.group(noise_type);
        group.push_stability(baseline);
        group.push_stability(variant);
    }

    /// Add one group's stability on its own, routed by its label
    pub fn accumulate_group_stability(
        &mut self,
        noise_type: &str,
        measurement: &StabilityMeasurement,
    ) {
        self.group(noise_type).push_stability(measurement);
    }

    /// Add one trial's mean response complexity
    pub fn accumulate_complexity(&mut self, noise_type: &str, score: f64) {
        self.group(noise_type).push_complexity(score);
    }

    /// Summary for one noise type; zero-valued when nothing was accumulated
    pub fn finalize(&self, noise_type: &str) -> NoiseTypeSummary {
        match self.groups.get(noise_type) {
            Some(group) => group.summarize(noise_type),
            None => NoiseTypeSummary::empty(noise_type),
        }
    }

    /// Summaries for every noise type seen so far
    pub fn finalize_all(&self) -> BTreeMap<String, NoiseTypeSummary> {
        self.groups
            .iter()
            .map(|(name, group)| (name.clone(), group.summarize(name)))
            .collect()
    }

    /// Combine another aggregator's samples into this one
    pub fn merge(&mut self, other: ExperimentAggregator) {
        for (name, group) in other.groups {
            self.groups.entry(name).or_default().merge(group);
        }
    }

    pub fn noise_types(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Total divergence records across every noise type
    pub fn sample_count(&self) -> usize {
        self.groups.values().map(NoiseAccumulator::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(NoiseAccumulator::is_empty)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SHARED AGGREGATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Lock-protected aggregator handle for concurrent producers
#[derive(Debug, Clone, Default)]
pub struct SharedAggregator {
    inner: Arc<Mutex<ExperimentAggregator>>,
}

impl SharedAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulate(&self, noise_type: &str, record: &DivergenceRecord) {
        self.inner.lock().accumulate(noise_type, record);
    }

    pub fn accumulate_stability(
        &self,
        noise_type: &str,
        baseline: &StabilityMeasurement,
        variant: &StabilityMeasurement,
    ) {
        self.inner
            .lock()
            .accumulate_stability(noise_type, baseline, variant);
    }

    pub fn merge(&self, other: ExperimentAggregator) {
        self.inner.lock().merge(other);
    }

    pub fn finalize(&self, noise_type: &str) -> NoiseTypeSummary {
        self.inner.lock().finalize(noise_type)
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> ExperimentAggregator {
        self.inner.lock().clone()
    }
}
