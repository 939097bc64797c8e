//! ═══════════════════════════════════════════════════════════════════════════════
//! RUN — Experiment Run Metadata and Summaries
//! ═══════════════════════════════════════════════════════════════════════════════

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregator::{ExperimentAggregator, NoiseTypeSummary};
use crate::error::ButterflyResult;
use crate::kaplan_yorke;
use crate::lyapunov::LyapunovFormula;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub model: String,
    pub timestamp: DateTime<Utc>,
    pub topics: Vec<String>,
    pub noise_types: Vec<String>,
    pub lyapunov_formula: LyapunovFormula,
    pub runs_per_prompt: usize,
}

impl RunMetadata {
    pub fn new(model: impl Into<String>, lyapunov_formula: LyapunovFormula) -> Self {
        Self {
            model: model.into(),
            timestamp: Utc::now(),
            topics: Vec::new(),
            noise_types: Vec::new(),
            lyapunov_formula,
            runs_per_prompt: 1,
        }
    }
}

/// One run: metadata plus a summary per noise type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRun {
    pub metadata: RunMetadata,
    pub summaries: BTreeMap<String, NoiseTypeSummary>,
}

impl ExperimentRun {
    pub fn new(metadata: RunMetadata) -> Self {
        Self {
            metadata,
            summaries: BTreeMap::new(),
        }
    }

    /// Recompute every summary from the aggregator's current state
    pub fn update_from(&mut self, aggregator: &ExperimentAggregator) {
        self.summaries = aggregator.finalize_all();
        for name in &self.metadata.noise_types {
            self.summaries
                .entry(name.clone())
                .or_insert_with(|| NoiseTypeSummary::empty(name.as_str()));
        }
    }

    /// Rebuild from a saved summary map (`noise_type → summary`)
    pub fn from_summaries(
        metadata: RunMetadata,
        summaries: BTreeMap<String, NoiseTypeSummary>,
    ) -> Self {
        let summaries = summaries
            .into_iter()
            .map(|(name, mut summary)| {
                summary.noise_type = name.clone();
                (name, summary)
            })
            .collect();
        Self {
            metadata,
            summaries,
        }
    }

    /// The downstream reporting object: `{ "<noise_type>": { ... }, ... }`
    pub fn summary_json(&self) -> ButterflyResult<serde_json::Value> {
        Ok(serde_json::to_value(&self.summaries)?)
    }

    /// Mean exponents per noise type, skipping types with no samples
    pub fn mean_exponents(&self) -> Vec<f64> {
        self.summaries
            .values()
            .filter(|s| s.sample_count > 0)
            .map(|s| s.mean_proxy_lyapunov)
            .collect()
    }

    /// Kaplan-Yorke dimension across noise types
    pub fn kaplan_yorke(&self) -> ButterflyResult<f64> {
        kaplan_yorke::dimension(&self.mean_exponents())
    }

    /// Summaries sorted ascending by mean exponent (least chaotic first)
    pub fn by_chaos(&self) -> Vec<&NoiseTypeSummary> {
        let mut sorted: Vec<&NoiseTypeSummary> = self.summaries.values().collect();
        sorted.sort_by(|a, b| {
            a.mean_proxy_lyapunov
                .total_cmp(&b.mean_proxy_lyapunov)
                .then_with(|| a.noise_type.cmp(&b.noise_type))
        });
        sorted
    }
}
