//! ═══════════════════════════════════════════════════════════════════════════════
//! LYAPUNOV — Proxy Exponential-Growth Rate from a Divergence
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Two formulas exist and they disagree in sign and scale, so an estimator is
//! built with exactly one of them and a run records which one it used:
//!
//! - `FixedEpsilon`:   λ = ln(max(d, ε)) / ln(ε)      (λ ∈ [0, 1] for d ∈ [0, 1])
//! - `PromptDistance`: λ = ln(max(d, ε) / r)          (unbounded, sign-bearing)
//!
//! In both, `d` is clamped to the floor ε = 0.001 before the logarithm, so
//! `ln(0)` cannot occur.
//! ═══════════════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};

/// Numerical floor for divergences before taking a logarithm
pub const EPSILON: f64 = 0.001;

/// Which proxy formula an estimator applies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "formula", rename_all = "snake_case")]
pub enum LyapunovFormula {
    /// Self-normalising: `ln(max(d, ε)) / ln(ε)`.
    /// `d ≤ ε` maps to 1, `d = 1` maps to 0; non-increasing in `d`.
    FixedEpsilon,
    /// Relative to an externally supplied prompt-level distance:
    /// `ln(max(d, ε) / reference)`. Non-decreasing in `d`; negative when the
    /// responses moved less than the prompts did.
    PromptDistance { reference: f64 },
}

impl Default for LyapunovFormula {
    fn default() -> Self {
        LyapunovFormula::FixedEpsilon
    }
}

impl LyapunovFormula {
    pub fn name(&self) -> &'static str {
        match self {
            LyapunovFormula::FixedEpsilon => "fixed_epsilon",
            LyapunovFormula::PromptDistance { .. } => "prompt_distance",
        }
    }
}

impl std::fmt::Display for LyapunovFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LyapunovFormula::FixedEpsilon => write!(f, "ln(max(d, {EPSILON})) / ln({EPSILON})"),
            LyapunovFormula::PromptDistance { reference } => {
                write!(f, "ln(max(d, {EPSILON}) / {reference})")
            }
        }
    }
}

/// Converts an edit distance into a proxy Lyapunov exponent
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LyapunovEstimator {
    formula: LyapunovFormula,
}

impl LyapunovEstimator {
    pub fn new(formula: LyapunovFormula) -> Self {
        // A non-positive or non-finite reference would reintroduce ln(0) or NaN
        let formula = match formula {
            LyapunovFormula::PromptDistance { reference }
                if !(reference.is_finite() && reference > 0.0) =>
            {
                tracing::warn!(reference, "invalid prompt distance, flooring to epsilon");
                LyapunovFormula::PromptDistance { reference: EPSILON }
            }
            other => other,
        };
        Self { formula }
    }

    /// Estimator relative to a prompt-level distance
    pub fn relative_to(reference: f64) -> Self {
        Self::new(LyapunovFormula::PromptDistance { reference })
    }

    pub fn formula(&self) -> LyapunovFormula {
        self.formula
    }

    /// Proxy exponent for one edit distance
    pub fn estimate(&self, edit_distance: f64) -> f64 {
        // NaN.max(ε) is ε, so a NaN input also lands on the floor
        let d = edit_distance.max(EPSILON);
        match self.formula {
            LyapunovFormula::FixedEpsilon => d.ln() / EPSILON.ln(),
            LyapunovFormula::PromptDistance { reference } => (d / reference).ln(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_epsilon_floor_maps_to_one() {
        let est = LyapunovEstimator::default();
        assert_eq!(est.estimate(0.0), 1.0);
        assert_eq!(est.estimate(EPSILON), 1.0);
        assert_eq!(est.estimate(f64::NAN), 1.0);
    }

    #[test]
    fn test_fixed_epsilon_full_divergence_is_zero() {
        let est = LyapunovEstimator::default();
        assert_eq!(est.estimate(1.0), 0.0);
    }

    #[test]
    fn test_fixed_epsilon_non_increasing() {
        let est = LyapunovEstimator::default();
        let mut last = f64::INFINITY;
        for i in 0..=100 {
            let lambda = est.estimate(i as f64 / 100.0);
            assert!(lambda <= last);
            last = lambda;
        }
    }

    #[test]
    fn test_prompt_distance_non_decreasing_and_signed() {
        let est = LyapunovEstimator::relative_to(0.1);
        let mut last = f64::NEG_INFINITY;
        for i in 0..=100 {
            let lambda = est.estimate(i as f64 / 100.0);
            assert!(lambda >= last);
            last = lambda;
        }
        assert!(est.estimate(0.05) < 0.0);
        assert!(est.estimate(0.5) > 0.0);
        assert!(est.estimate(0.0).is_finite());
    }

    #[test]
    fn test_relative_to_epsilon_is_zero_at_floor() {
        let est = LyapunovEstimator::relative_to(EPSILON);
        assert_eq!(est.estimate(0.0), 0.0);
    }

    #[test]
    fn test_invalid_reference_is_floored() {
        let est = LyapunovEstimator::relative_to(0.0);
        assert_eq!(
            est.formula(),
            LyapunovFormula::PromptDistance { reference: EPSILON }
        );
        assert!(est.estimate(0.5).is_finite());
    }

    #[test]
    fn test_formula_serde_tagged() {
        let json = serde_json::to_string(&LyapunovFormula::PromptDistance { reference: 0.1 }).unwrap();
        assert!(json.contains("\"formula\":\"prompt_distance\""));
        let back: LyapunovFormula = serde_json::from_str(r#"{"formula":"fixed_epsilon"}"#).unwrap();
        assert_eq!(back, LyapunovFormula::FixedEpsilon);
    }
}
