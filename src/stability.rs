//! ═══════════════════════════════════════════════════════════════════════════════
//! STABILITY — Attractor Basin Strength of Repeated Responses
//! ═══════════════════════════════════════════════════════════════════════════════
//! Repeated answers to one identical prompt either cluster (strong attractor)
//! or scatter. Measured as the mean and population variance of pairwise
//! similarity over all N·(N−1)/2 unordered pairs.
//! ═══════════════════════════════════════════════════════════════════════════════

use crate::comparator::{Divergence, ResponseComparator};
use crate::records::{GroupLabel, StabilityMeasurement};
use crate::stats::Moments;

#[derive(Debug, Clone, Default)]
pub struct AttractorStabilityAnalyzer<D = ResponseComparator> {
    measure: D,
}

impl<D: Divergence> AttractorStabilityAnalyzer<D> {
    pub fn new(measure: D) -> Self {
        Self { measure }
    }

    /// Stability of one group of repeated responses.
    /// Fewer than two responses is trivially stable.
    pub fn stability<S: AsRef<str>>(
        &self,
        group_label: GroupLabel,
        responses: &[S],
    ) -> StabilityMeasurement {
        if responses.len() < 2 {
            tracing::trace!(%group_label, n = responses.len(), "trivial stability");
            return StabilityMeasurement::trivial(group_label);
        }

        let n = responses.len();
        let mut similarities = Vec::with_capacity(n * (n - 1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                let sim = self
                    .measure
                    .similarity(responses[i].as_ref(), responses[j].as_ref());
                similarities.push(sim.clamp(0.0, 1.0));
            }
        }

        let moments = Moments::from_samples(&similarities);

        StabilityMeasurement {
            group_label,
            pairwise_similarities: similarities,
            stability: moments.mean.clamp(0.0, 1.0),
            variance: moments.variance,
            attractor_strength: 1.0 - moments.variance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> AttractorStabilityAnalyzer {
        AttractorStabilityAnalyzer::default()
    }

    #[test]
    fn test_single_response_is_trivially_stable() {
        let m = analyzer().stability(GroupLabel::Baseline, &["anything at all"]);
        assert_eq!(m.stability, 1.0);
        assert_eq!(m.variance, 0.0);
        assert_eq!(m.attractor_strength, 1.0);
        assert!(m.pairwise_similarities.is_empty());
    }

    #[test]
    fn test_no_responses_is_trivially_stable() {
        let empty: [&str; 0] = [];
        let m = analyzer().stability(GroupLabel::Variant, &empty);
        assert_eq!(m.stability, 1.0);
        assert_eq!(m.group_label, GroupLabel::Variant);
    }

    #[test]
    fn test_identical_responses_perfectly_stable() {
        let m = analyzer().stability(GroupLabel::Baseline, &["same", "same", "same"]);
        assert_eq!(m.pairwise_similarities.len(), 3);
        assert_eq!(m.stability, 1.0);
        assert_eq!(m.variance, 0.0);
        assert_eq!(m.attractor_strength, 1.0);
    }

    #[test]
    fn test_pair_count_and_variance() {
        let responses = ["aaaa", "aaaa", "bbbb", "bbbb"];
        let m = analyzer().stability(GroupLabel::Variant, &responses);
        assert_eq!(m.pairwise_similarities.len(), 6);
        // Two identical pairs (1.0) and four disjoint pairs (0.0)
        assert!((m.stability - 2.0 / 6.0).abs() < 1e-12);
        let expected_var = (2.0 * (1.0 - 1.0 / 3.0_f64).powi(2) + 4.0 * (1.0 / 3.0_f64).powi(2)) / 6.0;
        assert!((m.variance - expected_var).abs() < 1e-12);
        assert!((m.attractor_strength - (1.0 - expected_var)).abs() < 1e-12);
    }

    #[test]
    fn test_empty_responses_use_fallback() {
        let m = analyzer().stability(GroupLabel::Baseline, &["", "text"]);
        assert_eq!(m.stability, 0.0);
    }
}
