//! ═══════════════════════════════════════════════════════════════════════════════
//! STATS — Order-Free Statistical Primitives
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Mean and population variance over samples whose arrival order must not
//! matter. Samples are sorted before reduction so the same multiset always
//! produces bit-identical results, regardless of how it was accumulated.
//! ═══════════════════════════════════════════════════════════════════════════════

use std::cmp::Ordering;

/// Total ordering for f64 (NaN sorts last)
pub fn float_cmp(a: &f64, b: &f64) -> Ordering {
    a.total_cmp(b)
}

/// Summary moments of a sample
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Moments {
    pub mean: f64,
    /// Population variance (divides by n)
    pub variance: f64,
    pub count: usize,
}

impl Moments {
    /// Compute moments from samples. Empty input yields all zeros.
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(float_cmp);

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;

        // Second pass over the same sorted order
        let variance = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

        Self {
            mean,
            variance,
            count: sorted.len(),
        }
    }

    /// Population standard deviation
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// Arithmetic mean, 0 for an empty slice
pub fn mean(samples: &[f64]) -> f64 {
    Moments::from_samples(samples).mean
}

/// `numerator / denominator`, or 0 when the denominator is 0
pub fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moments_basic() {
        let m = Moments::from_samples(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(m.mean, 3.0);
        assert!((m.variance - 2.0).abs() < 1e-12);
        assert_eq!(m.count, 5);
    }

    #[test]
    fn test_moments_empty_is_zero() {
        let m = Moments::from_samples(&[]);
        assert_eq!(m.mean, 0.0);
        assert_eq!(m.std_dev(), 0.0);
        assert_eq!(m.count, 0);
    }

    #[test]
    fn test_moments_order_free() {
        let a = Moments::from_samples(&[0.1, 0.7, 0.2, 1e-9, 0.35]);
        let b = Moments::from_samples(&[0.35, 1e-9, 0.2, 0.7, 0.1]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_ratio_or_zero() {
        assert_eq!(ratio_or_zero(3.0, 0.0), 0.0);
        assert_eq!(ratio_or_zero(3.0, 2.0), 1.5);
    }
}
