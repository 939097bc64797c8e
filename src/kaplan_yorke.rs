//! ═══════════════════════════════════════════════════════════════════════════════
//! KAPLAN-YORKE — Composite Dimension from a Set of Exponents
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! D = k + (λ₁ + … + λₖ) / |λₖ₊₁|
//!
//! with exponents sorted descending and k the largest prefix length whose sum
//! is non-negative. When k = 0 or k covers every exponent there is no
//! remainder term and D = k.
//! ═══════════════════════════════════════════════════════════════════════════════

use crate::error::{ButterflyError, ButterflyResult};

pub fn dimension(exponents: &[f64]) -> ButterflyResult<f64> {
    if let Some((index, &value)) = exponents.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(ButterflyError::NonFiniteExponent { index, value });
    }

    let mut sorted = exponents.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    // Descending order: once the running sum goes negative it stays negative
    let mut k = 0;
    let mut cumulative = 0.0;
    for exp in &sorted {
        if cumulative + exp >= 0.0 {
            cumulative += exp;
            k += 1;
        } else {
            break;
        }
    }

    if k == 0 || k >= sorted.len() {
        return Ok(k as f64);
    }

    let next = sorted[k].abs();
    if next == 0.0 {
        return Err(ButterflyError::DegenerateDimension { index: k });
    }

    Ok(k as f64 + cumulative / next)
}
