//! ═══════════════════════════════════════════════════════════════════════════════
//! SOURCE — Boundary with the Language-Model Service
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! The metric engine never talks to the network. Orchestration asks a
//! `ResponseSource` for text; a failed generation comes back as an empty
//! string, which the engine treats with its documented fallbacks.
//!
//! `OllamaClient` owns the timeout and retry policy for a local Ollama server.
//! ═══════════════════════════════════════════════════════════════════════════════

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ExperimentConfig;
use crate::error::FetchError;

/// Anything that turns a prompt into generated text
pub trait ResponseSource {
    /// Generated text, or `""` if generation failed
    fn generate(&self, prompt: &str) -> String;

    /// Model identifier recorded in run metadata
    fn model(&self) -> &str;
}

// ═══════════════════════════════════════════════════════════════════════════════
// OLLAMA CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

pub struct OllamaClient {
    http: reqwest::blocking::Client,
    base_url: String,
    model: String,
    temperature: f64,
    max_retries: u32,
    retry_backoff: Duration,
}

impl OllamaClient {
    pub fn new(config: &ExperimentConfig) -> Result<Self, FetchError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("butterfly/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(format!("client build failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
        })
    }

    /// One generation attempt
    pub fn try_generate(&self, prompt: &str) -> Result<String, FetchError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        Ok(parsed.response)
    }

    /// Names of locally available models
    pub fn list_models(&self) -> Result<Vec<String>, FetchError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let tags: TagsResponse = response
            .json()
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Server reachable and the configured model is installed
    pub fn health_check(&self) -> Result<bool, FetchError> {
        let models = self.list_models()?;
        Ok(models.iter().any(|m| m == &self.model))
    }
}

impl ResponseSource for OllamaClient {
    fn generate(&self, prompt: &str) -> String {
        let attempts = self.max_retries + 1;
        for attempt in 1..=attempts {
            match self.try_generate(prompt) {
                Ok(text) => return text,
                Err(e) => {
                    tracing::warn!(attempt, attempts, error = %e, "generation failed");
                    if attempt < attempts {
                        thread::sleep(self.retry_backoff * attempt);
                    }
                }
            }
        }
        tracing::error!(model = %self.model, "giving up on prompt, recording empty response");
        String::new()
    }

    fn model(&self) -> &str {
        &self.model
    }
}
