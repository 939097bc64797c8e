//! ═══════════════════════════════════════════════════════════════════════════════
//! PERTURBATION — Noise Categories and Prompt Templates
//! ═══════════════════════════════════════════════════════════════════════════════
//! Each category rewrites the same "Explain <topic>" request with one kind of
//! noise. `Baseline` is the control and is never run as a treatment.
//! ═══════════════════════════════════════════════════════════════════════════════

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseCategory {
    /// Control - clean input
    Baseline,
    /// Typos and misspellings
    Orthographic,
    /// Urgency markers
    TemporalPressure,
    /// Emotional expressions
    EmotionalLeakage,
    /// Multi-topic queries
    ComplexityAccumulation,
    /// Instructions about thinking
    Metacognitive,
}

impl NoiseCategory {
    pub fn all() -> &'static [NoiseCategory] {
        &[
            NoiseCategory::Baseline,
            NoiseCategory::Orthographic,
            NoiseCategory::TemporalPressure,
            NoiseCategory::EmotionalLeakage,
            NoiseCategory::ComplexityAccumulation,
            NoiseCategory::Metacognitive,
        ]
    }

    /// Every category except the control
    pub fn treatments() -> impl Iterator<Item = NoiseCategory> {
        Self::all()
            .iter()
            .copied()
            .filter(|c| *c != NoiseCategory::Baseline)
    }

    pub fn name(&self) -> &'static str {
        match self {
            NoiseCategory::Baseline => "baseline",
            NoiseCategory::Orthographic => "orthographic",
            NoiseCategory::TemporalPressure => "temporal_pressure",
            NoiseCategory::EmotionalLeakage => "emotional_leakage",
            NoiseCategory::ComplexityAccumulation => "complexity_accumulation",
            NoiseCategory::Metacognitive => "metacognitive",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            NoiseCategory::Baseline => "Control - clean input",
            NoiseCategory::Orthographic => "Typos and misspellings",
            NoiseCategory::TemporalPressure => "Urgency markers",
            NoiseCategory::EmotionalLeakage => "Emotional expressions",
            NoiseCategory::ComplexityAccumulation => "Multi-topic queries",
            NoiseCategory::Metacognitive => "Instructions about thinking",
        }
    }

    /// The perturbed prompt for a topic (`quantum_mechanics` style ids accepted)
    pub fn perturb(&self, topic: &str) -> String {
        let subject = topic_phrase(topic);
        match self {
            NoiseCategory::Baseline => baseline_prompt(topic),
            NoiseCategory::Orthographic => {
                format!("Explan {}", subject.replace('a', "e").replace('i', "y"))
            }
            NoiseCategory::TemporalPressure => {
                format!("URGENT: I need you to explain {subject} RIGHT NOW!")
            }
            NoiseCategory::EmotionalLeakage => {
                format!("I'm so frustrated... can you PLEASE explain {subject}???")
            }
            NoiseCategory::ComplexityAccumulation => {
                format!("Explain {subject} and also how it relates to ethics and the future")
            }
            NoiseCategory::Metacognitive => format!("Think step by step and explain {subject}"),
        }
    }
}

impl std::fmt::Display for NoiseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NoiseCategory {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownNoiseCategory(s.to_string()))
    }
}

/// `quantum_mechanics` → `quantum mechanics`
pub fn topic_phrase(topic: &str) -> String {
    topic.replace('_', " ")
}

/// The unperturbed control prompt
pub fn baseline_prompt(topic: &str) -> String {
    format!("Explain {}", topic_phrase(topic))
}
