//! ═══════════════════════════════════════════════════════════════════════════════
//! BUTTERFLY — Chaos Metrics for Prompt Perturbation Experiments
//! ═══════════════════════════════════════════════════════════════════════════════
//! How far does a small change to a prompt push a model's answer? Pairs of
//! responses become divergences, divergences become proxy Lyapunov exponents,
//! repeated responses become attractor stabilities, and everything folds into
//! one summary per noise category.
//!
//! The metric engine is pure: no I/O, no blocking, no shared state beyond the
//! aggregator handed to it. Fetching, persistence and reporting sit around it.
//! ═══════════════════════════════════════════════════════════════════════════════

#![allow(clippy::new_without_default)]

// ═══════════════════════════════════════════════════════════════════════════════
// METRIC ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

pub mod aggregator;
pub mod classifier;
pub mod comparator;
pub mod kaplan_yorke;
pub mod lyapunov;
pub mod records;
pub mod stability;
pub mod stats;
pub mod trial;

// ═══════════════════════════════════════════════════════════════════════════════
// ORCHESTRATION
// ═══════════════════════════════════════════════════════════════════════════════

pub mod config;
pub mod error;
pub mod perturbation;
pub mod persist;
pub mod report;
pub mod run;
pub mod runner;
pub mod source;

// ═══════════════════════════════════════════════════════════════════════════════
// RE-EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

pub use aggregator::{ExperimentAggregator, NoiseTypeSummary, SharedAggregator};
pub use classifier::{classify, ChaosLevel};
pub use comparator::{ComparatorConfig, Divergence, ResponseComparator};
pub use config::ExperimentConfig;
pub use error::{ButterflyError, ButterflyResult};
pub use lyapunov::{LyapunovEstimator, LyapunovFormula, EPSILON};
pub use records::{
    DivergenceRecord, FeatureDivergence, FeatureVector, GroupLabel, ResponsePair,
    StabilityMeasurement,
};
pub use run::{ExperimentRun, RunMetadata};
pub use stability::AttractorStabilityAnalyzer;
pub use trial::{Trial, TrialAnalyzer, TrialOutcome};
