//! ═══════════════════════════════════════════════════════════════════════════════
//! REPORT — Text Rendering of an Experiment Run
//! ═══════════════════════════════════════════════════════════════════════════════

use std::fmt::Write;

use crate::run::ExperimentRun;

const RULE: &str =
    "═══════════════════════════════════════════════════════════════════════════════";
const BAR_CELLS: usize = 40;

/// Map λ from [-2, 2] onto a 40-cell bar
pub fn spectrum_bar(lambda: f64) -> String {
    let normalized = ((lambda + 2.0) / 4.0).clamp(0.0, 1.0);
    let filled = (normalized * BAR_CELLS as f64) as usize;
    "▓".repeat(filled) + &"░".repeat(BAR_CELLS - filled)
}

/// Map a divergence in [0, 1] onto a 40-cell bar
pub fn divergence_bar(divergence: f64) -> String {
    let filled = (divergence.clamp(0.0, 1.0) * BAR_CELLS as f64) as usize;
    "█".repeat(filled) + &"░".repeat(BAR_CELLS - filled)
}

pub fn render(run: &ExperimentRun) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_report(&mut out, run);
    out
}

fn write_report(out: &mut String, run: &ExperimentRun) -> std::fmt::Result {
    writeln!(out, "{RULE}")?;
    writeln!(out, "                    CHAOS THEORY ANALYSIS OF MODEL RESPONSES")?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "Model:    {}", run.metadata.model)?;
    writeln!(out, "Started:  {}", run.metadata.timestamp.to_rfc3339())?;
    writeln!(out, "Formula:  λ = {}", run.metadata.lyapunov_formula)?;
    if !run.metadata.topics.is_empty() {
        writeln!(out, "Topics:   {}", run.metadata.topics.join(", "))?;
    }
    writeln!(out)?;

    let sorted = run.by_chaos();
    if sorted.is_empty() {
        writeln!(out, "No noise types recorded.")?;
        return Ok(());
    }

    writeln!(out, "NOISE TYPE ANALYSIS (sorted by chaos level)")?;
    writeln!(out, "{}", "─".repeat(50))?;
    for s in &sorted {
        writeln!(out)?;
        writeln!(out, "{}:", s.noise_type.to_uppercase())?;
        writeln!(out, "  Chaos Classification:   {}", s.chaos_classification())?;
        writeln!(
            out,
            "  Mean Lyapunov Exponent: {:.3} (±{:.3})",
            s.mean_proxy_lyapunov, s.std_proxy_lyapunov
        )?;
        writeln!(
            out,
            "  Mean Divergence:        {:.3} (±{:.3})",
            s.mean_divergence, s.std_divergence
        )?;
        writeln!(out, "  Baseline Stability:     {:.3}", s.mean_baseline_stability)?;
        writeln!(out, "  Noisy Stability:        {:.3}", s.mean_noisy_stability)?;
        writeln!(out, "  Attractor Shift:        {:+.3}", s.attractor_shift)?;
        if let Some(complexity) = s.mean_complexity {
            writeln!(out, "  Mean Complexity:        {:.3}", complexity)?;
        }
        writeln!(out, "  Samples:                {}", s.sample_count)?;
    }

    writeln!(out)?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "CHAOS SPECTRUM  (low chaos ←→ high chaos)")?;
    writeln!(out, "{RULE}")?;
    for s in &sorted {
        writeln!(
            out,
            "{:25} [{}] {:.3}",
            s.noise_type,
            spectrum_bar(s.mean_proxy_lyapunov),
            s.mean_proxy_lyapunov
        )?;
    }

    writeln!(out)?;
    writeln!(out, "DIVERGENCE  (0.0 = identical, 1.0 = completely different)")?;
    writeln!(out, "{}", "─".repeat(50))?;
    let mut by_divergence = sorted.clone();
    by_divergence.sort_by(|a, b| a.mean_divergence.total_cmp(&b.mean_divergence));
    for s in &by_divergence {
        writeln!(
            out,
            "{:25} [{}] {:.3}",
            s.noise_type,
            divergence_bar(s.mean_divergence),
            s.mean_divergence
        )?;
    }

    writeln!(out)?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "KEY INSIGHTS")?;
    writeln!(out, "{RULE}")?;
    if let (Some(least), Some(most)) = (sorted.first(), sorted.last()) {
        writeln!(
            out,
            "• Most Chaotic: {} (λ = {:.3})",
            most.noise_type, most.mean_proxy_lyapunov
        )?;
        writeln!(
            out,
            "• Most Stable:  {} (λ = {:.3})",
            least.noise_type, least.mean_proxy_lyapunov
        )?;
    }
    match run.kaplan_yorke() {
        Ok(d) => {
            writeln!(out, "• Estimated Kaplan-Yorke Dimension: {:.2}", d)?;
            writeln!(out, "  (higher dimension = more complex response patterns)")?;
        }
        Err(e) => writeln!(out, "• Kaplan-Yorke Dimension unavailable: {}", e)?,
    }
    writeln!(out, "{RULE}")?;
    Ok(())
}
