//! Tunables for conversion, batch execution and auto-match scoring.
//!
//! Every field has a default, so a YAML file only needs the keys it changes:
//!
//! ```yaml
//! conversion:
//!   min_match_ratio: 0.9
//! batch:
//!   workers: 4
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use template_bridge_core::ValidationResult;
use thiserror::Error;

/// Failure loading or saving a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Locator, classifier, synthesizer and acceptance thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Characters of context compared on each side of a candidate occurrence.
    pub anchor_window: usize,
    /// Share of records that must share the dominant field set to be a table.
    pub table_consistency: f64,
    /// Share of rows the dominant line skeleton must cover before a table is
    /// demoted to a paragraph.
    pub table_skeleton_share: f64,
    /// Largest tolerated fraction of populated fields that could not be located.
    pub max_unanchored_fraction: f64,
    /// Validation match ratio a conversion needs to be accepted.
    pub min_match_ratio: f64,
    /// Also require the target parse to yield as many rows as the oracle.
    pub require_row_match: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            anchor_window: 16,
            table_consistency: 0.9,
            table_skeleton_share: 0.5,
            max_unanchored_fraction: 0.5,
            min_match_ratio: 0.95,
            require_row_match: true,
        }
    }
}

impl ConversionConfig {
    /// Whether a validation result clears the acceptance threshold.
    pub fn accepts(&self, validation: &ValidationResult) -> bool {
        validation.match_ratio() >= self.min_match_ratio
            && (!self.require_row_match || validation.row_count_matches())
    }
}

/// Worker pool sizing and per-job ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Concurrent conversion workers; `0` picks a size from the machine.
    pub workers: usize,
    /// Jobs buffered between the feeder and the workers.
    pub queue_capacity: usize,
    pub job_timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_capacity: 64,
            job_timeout_secs: 30,
        }
    }
}

impl BatchConfig {
    /// Worker count to use for `job_count` jobs.
    pub fn effective_workers(&self, job_count: usize) -> usize {
        if self.workers > 0 {
            return self.workers.min(job_count.max(1));
        }
        let cpu_count = std::thread::available_parallelism()
            .map(|parallelism| parallelism.get())
            .unwrap_or(4);
        let adaptive_cap = if job_count >= 500 { 8 } else { 12 };
        cpu_count.min(adaptive_cap).max(1).min(job_count.max(1))
    }
}

/// Saturation points of the auto-match sub-scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    /// Record count that earns the full record sub-score.
    pub row_threshold: usize,
    /// Average populated fields per record that earns the full richness sub-score.
    pub field_threshold: usize,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            row_threshold: 10,
            field_threshold: 10,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub conversion: ConversionConfig,
    pub batch: BatchConfig,
    pub scoring: ScoreConfig,
}

impl BridgeConfig {
    /// Loads a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Writes this configuration as YAML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let file = File::create(path)?;
        serde_yaml::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }
}
