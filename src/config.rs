//! ═══════════════════════════════════════════════════════════════════════════════
//! CONFIG — Experiment Configuration
//! ═══════════════════════════════════════════════════════════════════════════════
//! Layered: defaults → JSON file → environment → CLI flags (applied by the
//! binary through the `with_*` setters). `validate()` runs last.
//! ═══════════════════════════════════════════════════════════════════════════════

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::comparator::ComparatorConfig;
use crate::error::{ButterflyResult, ConfigError};
use crate::lyapunov::LyapunovFormula;
use crate::perturbation::NoiseCategory;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "phi3:mini";

/// Environment variable overriding the service base URL
pub const ENV_OLLAMA_HOST: &str = "OLLAMA_HOST";
/// Environment variable overriding the model
pub const ENV_MODEL: &str = "BUTTERFLY_MODEL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    /// Repeats per prompt (N ≥ 1); N ≥ 2 is needed for non-trivial stability
    pub runs_per_prompt: usize,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Pause between consecutive requests
    pub request_delay_ms: u64,
    pub topics: Vec<String>,
    pub noise_categories: Vec<NoiseCategory>,
    pub output_dir: PathBuf,
    pub lyapunov: LyapunovFormula,
    pub comparator: ComparatorConfig,
    pub drop_failed_responses: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            temperature: 0.7,
            runs_per_prompt: 3,
            request_timeout_secs: 30,
            max_retries: 2,
            retry_backoff_ms: 1000,
            request_delay_ms: 500,
            topics: [
                "quantum_mechanics",
                "consciousness",
                "climate_change",
                "ai_safety",
                "creativity",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            noise_categories: NoiseCategory::treatments().collect(),
            output_dir: PathBuf::from("results"),
            lyapunov: LyapunovFormula::default(),
            comparator: ComparatorConfig::default(),
            drop_failed_responses: false,
        }
    }
}

impl ExperimentConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> ButterflyResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Apply `OLLAMA_HOST` / `BUTTERFLY_MODEL` if set
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(host) = lookup(ENV_OLLAMA_HOST).filter(|s| !s.is_empty()) {
            // OLLAMA_HOST is often given without a scheme
            self.base_url = if host.starts_with("http://") || host.starts_with("https://") {
                host
            } else {
                format!("http://{host}")
            };
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|s| !s.is_empty()) {
            self.model = model;
        }
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_runs_per_prompt(mut self, runs: usize) -> Self {
        self.runs_per_prompt = runs;
        self
    }

    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }

    pub fn with_noise_categories(mut self, categories: Vec<NoiseCategory>) -> Self {
        self.noise_categories = categories;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_lyapunov(mut self, formula: LyapunovFormula) -> Self {
        self.lyapunov = formula;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Treatments to run; the control category is implied by every trial
    pub fn treatments(&self) -> impl Iterator<Item = NoiseCategory> + '_ {
        self.noise_categories
            .iter()
            .copied()
            .filter(|c| *c != NoiseCategory::Baseline)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingField("model".into()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "base_url".into(),
                message: format!("expected http(s) URL, got '{}'", self.base_url),
            });
        }
        if self.runs_per_prompt == 0 {
            return Err(ConfigError::InvalidValue {
                field: "runs_per_prompt".into(),
                message: "must be at least 1".into(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "temperature".into(),
                message: format!("{} outside [0, 2]", self.temperature),
            });
        }
        if self.topics.is_empty() {
            return Err(ConfigError::MissingField("topics".into()));
        }
        if self.treatments().next().is_none() {
            return Err(ConfigError::InvalidValue {
                field: "noise_categories".into(),
                message: "needs at least one non-baseline category".into(),
            });
        }
        if let LyapunovFormula::PromptDistance { reference } = self.lyapunov {
            if !(reference.is_finite() && reference > 0.0) {
                return Err(ConfigError::InvalidValue {
                    field: "lyapunov.reference".into(),
                    message: format!("must be a positive finite distance, got {reference}"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ExperimentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.treatments().count(), 5);
    }

    #[test]
    fn test_zero_runs_rejected() {
        let config = ExperimentConfig::default().with_runs_per_prompt(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "runs_per_prompt"
        ));
    }

    #[test]
    fn test_base_url_must_be_http() {
        let flagged = ExperimentConfig::default().with_base_url("http://gpu-box:11434");
        assert_eq!(flagged.base_url, "http://gpu-box:11434");
        assert!(flagged.validate().is_ok());

        let bare = ExperimentConfig::default().with_base_url("gpu-box:11434");
        assert!(matches!(
            bare.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "base_url"
        ));
    }

    #[test]
    fn test_baseline_only_rejected() {
        let config = ExperimentConfig::default().with_noise_categories(vec![NoiseCategory::Baseline]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_reference_rejected() {
        let config = ExperimentConfig::default()
            .with_lyapunov(LyapunovFormula::PromptDistance { reference: 0.0 });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ExperimentConfig = serde_json::from_str(
            r#"{"model": "gemma:2b", "topics": ["creativity"], "noise_categories": ["orthographic"],
                "lyapunov": {"formula": "prompt_distance", "reference": 0.1}}"#,
        )
        .unwrap();
        assert_eq!(config.model, "gemma:2b");
        assert_eq!(config.runs_per_prompt, 3);
        assert_eq!(config.noise_categories, vec![NoiseCategory::Orthographic]);
        assert_eq!(config.lyapunov, LyapunovFormula::PromptDistance { reference: 0.1 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = ExperimentConfig::default().with_overrides_from(|key| match key {
            ENV_OLLAMA_HOST => Some("10.0.0.5:11434".to_string()),
            ENV_MODEL => Some("llama3.2:latest".to_string()),
            _ => None,
        });
        assert_eq!(config.base_url, "http://10.0.0.5:11434");
        assert_eq!(config.model, "llama3.2:latest");
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = ExperimentConfig::default().with_model("gemma:2b");
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        assert_eq!(ExperimentConfig::from_json_file(&path).unwrap(), config);
    }
}
