//! ═══════════════════════════════════════════════════════════════════════════════
//! RECORDS — Immutable Inputs and Per-Trial Outputs
//! ═══════════════════════════════════════════════════════════════════════════════
//! Every value the engine produces is a named struct with fixed fields.
//! Values in `[0, 1]` are constructed already clamped; nothing is mutated after
//! construction.
//! ═══════════════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};

use crate::stats::ratio_or_zero;

/// Weight of the combined complexity score
const COMPLEXITY_SCALE: f64 = 0.1;

// ═══════════════════════════════════════════════════════════════════════════════
// INPUT
// ═══════════════════════════════════════════════════════════════════════════════

/// One baseline response and one perturbed response for the same topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePair {
    pub baseline_text: String,
    pub variant_text: String,
    pub noise_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default)]
    pub trial_index: usize,
}

impl ResponsePair {
    pub fn new(
        baseline_text: impl Into<String>,
        variant_text: impl Into<String>,
        noise_type: impl Into<String>,
    ) -> Self {
        Self {
            baseline_text: baseline_text.into(),
            variant_text: variant_text.into(),
            noise_type: noise_type.into(),
            topic: None,
            trial_index: 0,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_trial_index(mut self, trial_index: usize) -> Self {
        self.trial_index = trial_index;
        self
    }

    /// Either side came back empty (a failed fetch upstream)
    pub fn has_empty_side(&self) -> bool {
        self.baseline_text.is_empty() || self.variant_text.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FEATURES
// ═══════════════════════════════════════════════════════════════════════════════

/// Feature names, in the order `FeatureVector::values` reports them
pub const FEATURE_NAMES: [&str; 7] = [
    "length",
    "word_count",
    "sentence_count",
    "avg_word_length",
    "vocab_diversity",
    "punctuation_density",
    "uppercase_density",
];

/// Shallow surface features of a single response
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Character count
    pub length: f64,
    /// Whitespace-delimited words
    pub word_count: f64,
    /// Non-empty segments between sentence terminators
    pub sentence_count: f64,
    pub avg_word_length: f64,
    /// Unique words / total words
    pub vocab_diversity: f64,
    /// Punctuation chars / total chars
    pub punctuation_density: f64,
    /// Uppercase chars / total chars
    pub uppercase_density: f64,
}

impl FeatureVector {
    pub fn values(&self) -> [f64; 7] {
        [
            self.length,
            self.word_count,
            self.sentence_count,
            self.avg_word_length,
            self.vocab_diversity,
            self.punctuation_density,
            self.uppercase_density,
        ]
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_NAMES.into_iter().zip(self.values())
    }

    /// Words per sentence, 0 without sentences
    pub fn avg_sentence_length(&self) -> f64 {
        ratio_or_zero(self.word_count, self.sentence_count)
    }

    /// `vocab_diversity × avg_sentence_length × 0.1`
    pub fn complexity_score(&self) -> f64 {
        self.vocab_diversity * self.avg_sentence_length() * COMPLEXITY_SCALE
    }
}

/// Per-feature relative difference between two responses, each in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureDivergence {
    pub length: f64,
    pub word_count: f64,
    pub sentence_count: f64,
    pub avg_word_length: f64,
    pub vocab_diversity: f64,
    pub punctuation_density: f64,
    pub uppercase_density: f64,
}

impl FeatureDivergence {
    /// `|a - b| / max(a, b)` per feature, 0 when both are 0
    pub fn between(a: &FeatureVector, b: &FeatureVector) -> Self {
        let d = |x: f64, y: f64| -> f64 {
            let denom = x.max(y);
            if denom <= 0.0 {
                0.0
            } else {
                ((x - y).abs() / denom).clamp(0.0, 1.0)
            }
        };

        Self {
            length: d(a.length, b.length),
            word_count: d(a.word_count, b.word_count),
            sentence_count: d(a.sentence_count, b.sentence_count),
            avg_word_length: d(a.avg_word_length, b.avg_word_length),
            vocab_diversity: d(a.vocab_diversity, b.vocab_diversity),
            punctuation_density: d(a.punctuation_density, b.punctuation_density),
            uppercase_density: d(a.uppercase_density, b.uppercase_density),
        }
    }

    pub fn values(&self) -> [f64; 7] {
        [
            self.length,
            self.word_count,
            self.sentence_count,
            self.avg_word_length,
            self.vocab_diversity,
            self.punctuation_density,
            self.uppercase_density,
        ]
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_NAMES.into_iter().zip(self.values())
    }

    /// Arithmetic mean over all features
    pub fn mean(&self) -> f64 {
        let values = self.values();
        values.iter().sum::<f64>() / values.len() as f64
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIVERGENCE RECORD
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything measured about one ResponsePair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceRecord {
    /// `1 - similarity`, in `[0, 1]`
    pub edit_distance: f64,
    pub feature_divergence: FeatureDivergence,
    pub mean_feature_divergence: f64,
    /// Unbounded; sign is meaningful
    pub proxy_lyapunov: f64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STABILITY
// ═══════════════════════════════════════════════════════════════════════════════

/// Which prompt a group of repeated responses answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupLabel {
    Baseline,
    Variant,
}

impl GroupLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupLabel::Baseline => "baseline",
            GroupLabel::Variant => "variant",
        }
    }
}

impl std::fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clustering of repeated responses to one identical prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityMeasurement {
    pub group_label: GroupLabel,
    /// One `1 - divergence` value per unordered pair
    pub pairwise_similarities: Vec<f64>,
    /// Mean similarity, in `[0, 1]`
    pub stability: f64,
    /// Population variance of the similarities
    pub variance: f64,
    /// `1 - variance`
    pub attractor_strength: f64,
}

impl StabilityMeasurement {
    /// The single-sample (or no-sample) measurement: trivially stable
    pub fn trivial(group_label: GroupLabel) -> Self {
        Self {
            group_label,
            pairwise_similarities: Vec::new(),
            stability: 1.0,
            variance: 0.0,
            attractor_strength: 1.0,
        }
    }
}
