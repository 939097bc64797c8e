//! ═══════════════════════════════════════════════════════════════════════════════
//! COMPARATOR — Pairwise Textual Divergence and Surface Features
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! The foundation every other measure builds on:
//! - `divergence(a, b)`: `1 - 2·LCS(a, b) / (|a| + |b|)` over Unicode scalars
//! - `features(text)`: length, words, sentences, word length, vocabulary
//!   diversity, punctuation and uppercase density
//! - `feature_divergence(a, b)`: per-feature relative difference
//!
//! The LCS ratio is symmetric by construction, which a greedy
//! longest-block matcher is not.
//! ═══════════════════════════════════════════════════════════════════════════════

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::lyapunov::LyapunovEstimator;
use crate::records::{DivergenceRecord, FeatureDivergence, FeatureVector, ResponsePair};
use crate::stats::ratio_or_zero;

/// Returned by `divergence` when either side is empty
pub const EMPTY_INPUT_DIVERGENCE: f64 = 1.0;

/// Anything that can score two texts on `[0, 1]`, 0 meaning identical
pub trait Divergence: Send + Sync {
    fn divergence(&self, a: &str, b: &str) -> f64;

    fn similarity(&self, a: &str, b: &str) -> f64 {
        1.0 - self.divergence(a, b)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Character classes used by feature extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparatorConfig {
    /// Characters that end a sentence
    pub sentence_terminators: Vec<char>,
    /// Characters counted as punctuation
    pub punctuation: Vec<char>,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            sentence_terminators: vec!['.', '!', '?'],
            punctuation: vec!['.', ',', '!', '?', ';', ':'],
        }
    }
}

impl ComparatorConfig {
    /// Wider punctuation class that also counts brackets
    pub fn with_brackets() -> Self {
        let mut config = Self::default();
        config.punctuation.extend(['(', ')', '[', ']', '{', '}']);
        config
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESPONSE COMPARATOR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct ResponseComparator {
    config: ComparatorConfig,
}

impl ResponseComparator {
    pub fn new(config: ComparatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    /// Extract the surface feature vector of one response.
    /// Every ratio is 0 when its denominator is 0.
    pub fn features(&self, text: &str) -> FeatureVector {
        let length = text.chars().count();
        let words: Vec<&str> = text.split_whitespace().collect();
        let word_count = words.len();

        let sentence_count = text
            .split(|c: char| self.config.sentence_terminators.contains(&c))
            .filter(|segment| !segment.trim().is_empty())
            .count();

        let total_word_chars: usize = words.iter().map(|w| w.chars().count()).sum();
        let unique_words: HashSet<&str> = words.iter().copied().collect();

        let punctuation = text
            .chars()
            .filter(|c| self.config.punctuation.contains(c))
            .count();
        let uppercase = text.chars().filter(|c| c.is_uppercase()).count();

        FeatureVector {
            length: length as f64,
            word_count: word_count as f64,
            sentence_count: sentence_count as f64,
            avg_word_length: ratio_or_zero(total_word_chars as f64, word_count as f64),
            vocab_diversity: ratio_or_zero(unique_words.len() as f64, word_count as f64),
            punctuation_density: ratio_or_zero(punctuation as f64, length as f64),
            uppercase_density: ratio_or_zero(uppercase as f64, length as f64),
        }
    }

    /// Per-feature relative difference between two responses
    pub fn feature_divergence(&self, a: &str, b: &str) -> FeatureDivergence {
        FeatureDivergence::between(&self.features(a), &self.features(b))
    }

    /// Full record for one pair
    pub fn compare(&self, pair: &ResponsePair, estimator: &LyapunovEstimator) -> DivergenceRecord {
        let edit_distance = self.divergence(&pair.baseline_text, &pair.variant_text);
        let feature_divergence = self.feature_divergence(&pair.baseline_text, &pair.variant_text);

        DivergenceRecord {
            edit_distance,
            mean_feature_divergence: feature_divergence.mean(),
            feature_divergence,
            proxy_lyapunov: estimator.estimate(edit_distance),
        }
    }
}

impl Divergence for ResponseComparator {
    /// `1 - similarity`, with the fixed fallback of 1.0 for any empty input
    fn divergence(&self, a: &str, b: &str) -> f64 {
        if a.is_empty() || b.is_empty() {
            return EMPTY_INPUT_DIVERGENCE;
        }
        if a == b {
            return 0.0;
        }

        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let total = (a.len() + b.len()) as f64;
        let similarity = 2.0 * lcs_len(&a, &b) as f64 / total;

        (1.0 - similarity).clamp(0.0, 1.0)
    }
}

/// Length of the longest common subsequence
fn lcs_len(a: &[char], b: &[char]) -> usize {
    // Shared prefix and suffix always belong to some LCS
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let (a, b) = (&a[prefix..], &b[prefix..]);
    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let (a, b) = (&a[..a.len() - suffix], &b[..b.len() - suffix]);

    // Row over the shorter side
    let (outer, inner) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut prev = vec![0usize; inner.len() + 1];
    let mut curr = vec![0usize; inner.len() + 1];

    for &x in outer {
        for (j, &y) in inner.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prefix + suffix + prev[inner.len()]
}
