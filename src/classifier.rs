//! ═══════════════════════════════════════════════════════════════════════════════
//! CLASSIFIER — Ordinal Chaos Label for an Aggregated Exponent
//! ═══════════════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChaosLevel {
    /// λ < 0
    #[serde(rename = "Stable (Converging)")]
    Stable,
    /// 0 ≤ λ < 0.5
    #[serde(rename = "Weakly Chaotic")]
    WeaklyChaotic,
    /// 0.5 ≤ λ < 1.0
    #[serde(rename = "Moderately Chaotic")]
    ModeratelyChaotic,
    /// λ ≥ 1.0
    #[serde(rename = "Strongly Chaotic")]
    StronglyChaotic,
}

impl ChaosLevel {
    /// Total over f64. NaN is not produced by the engine; it lands in the
    /// top bucket because it fails every lower-bound comparison.
    pub fn classify(mean_lyapunov: f64) -> Self {
        match mean_lyapunov {
            l if l < 0.0 => ChaosLevel::Stable,
            l if l < 0.5 => ChaosLevel::WeaklyChaotic,
            l if l < 1.0 => ChaosLevel::ModeratelyChaotic,
            _ => ChaosLevel::StronglyChaotic,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChaosLevel::Stable => "Stable (Converging)",
            ChaosLevel::WeaklyChaotic => "Weakly Chaotic",
            ChaosLevel::ModeratelyChaotic => "Moderately Chaotic",
            ChaosLevel::StronglyChaotic => "Strongly Chaotic",
        }
    }
}

impl std::fmt::Display for ChaosLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Shorthand for `ChaosLevel::classify`
pub fn classify(mean_lyapunov: f64) -> ChaosLevel {
    ChaosLevel::classify(mean_lyapunov)
}
