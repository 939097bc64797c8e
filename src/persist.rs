//! ═══════════════════════════════════════════════════════════════════════════════
//! PERSIST — Timestamped JSON Checkpoints and Results
//! ═══════════════════════════════════════════════════════════════════════════════
//! Files for one run share the run's start timestamp:
//!   chaos_results_incremental_<ts>.json   rewritten after every trial
//!   chaos_results_complete_<ts>.json      metadata + per-trial results
//!   chaos_summary_<ts>.json               noise_type → summary
//! Writes go to a temp file first and are renamed into place.
//! ═══════════════════════════════════════════════════════════════════════════════

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregator::NoiseTypeSummary;
use crate::error::ButterflyResult;
use crate::run::{ExperimentRun, RunMetadata};

/// Filename-safe timestamp
pub fn file_stamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y%m%d_%H%M%S").to_string()
}

#[derive(Debug, Serialize)]
struct CompleteResults<'a, T: Serialize> {
    metadata: &'a RunMetadata,
    results: &'a [T],
}

/// Writes one run's files into an output directory
#[derive(Debug, Clone)]
pub struct RunWriter {
    dir: PathBuf,
    stamp: String,
}

impl RunWriter {
    pub fn new(dir: impl Into<PathBuf>, started: &DateTime<Utc>) -> ButterflyResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            stamp: file_stamp(started),
        })
    }

    pub fn incremental_path(&self) -> PathBuf {
        self.dir
            .join(format!("chaos_results_incremental_{}.json", self.stamp))
    }

    pub fn complete_path(&self) -> PathBuf {
        self.dir
            .join(format!("chaos_results_complete_{}.json", self.stamp))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(format!("chaos_summary_{}.json", self.stamp))
    }

    /// Checkpoint after a trial
    pub fn write_incremental<T: Serialize>(&self, results: &[T]) -> ButterflyResult<PathBuf> {
        let path = self.incremental_path();
        write_json_atomic(&path, &results)?;
        tracing::debug!(path = %path.display(), trials = results.len(), "checkpoint written");
        Ok(path)
    }

    /// Final per-trial results with run metadata
    pub fn write_complete<T: Serialize>(
        &self,
        metadata: &RunMetadata,
        results: &[T],
    ) -> ButterflyResult<PathBuf> {
        let path = self.complete_path();
        write_json_atomic(&path, &CompleteResults { metadata, results })?;
        Ok(path)
    }

    /// The downstream summary object
    pub fn write_summary(&self, run: &ExperimentRun) -> ButterflyResult<PathBuf> {
        let path = self.summary_path();
        write_json_atomic(&path, &run.summaries)?;
        Ok(path)
    }
}

/// Serialize pretty JSON to `path` via a sibling temp file
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> ButterflyResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Load a `noise_type → summary` file, restoring each summary's name
pub fn load_summaries(path: &Path) -> ButterflyResult<BTreeMap<String, NoiseTypeSummary>> {
    let text = fs::read_to_string(path)?;
    let raw: BTreeMap<String, NoiseTypeSummary> = serde_json::from_str(&text)?;
    Ok(raw
        .into_iter()
        .map(|(name, mut summary)| {
            summary.noise_type = name.clone();
            (name, summary)
        })
        .collect())
}

/// Load any JSON document
pub fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> ButterflyResult<T> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
