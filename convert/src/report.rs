//! Structured per-job and per-batch conversion reporting.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use template_bridge_core::{Strategy, Template};

use crate::error::{ConversionError, SynthesisError};
use crate::pipeline::Conversion;
use crate::validate::describe_mismatch;

/// Classified result of one conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    /// Template built and validated above the acceptance threshold.
    Success,
    /// Template built but validation fell short, or too many fields were
    /// unanchored.
    LowConfidence,
    /// No valid candidate template could be built, including a job whose
    /// thread died before it produced one.
    SynthesisError,
    /// Source template malformed for its engine.
    EngineError,
    /// Sample produced no records.
    NoMatch,
    /// Job exceeded its time ceiling.
    Timeout,
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::LowConfidence => write!(f, "low_confidence"),
            Self::SynthesisError => write!(f, "synthesis_error"),
            Self::EngineError => write!(f, "engine_error"),
            Self::NoMatch => write!(f, "no_match"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl From<&ConversionError> for JobOutcome {
    fn from(err: &ConversionError) -> Self {
        match err {
            ConversionError::Engine(_) => Self::EngineError,
            ConversionError::Aborted(_) => Self::SynthesisError,
            ConversionError::NoMatch(_) => Self::NoMatch,
            ConversionError::Synthesis {
                reason: SynthesisError::LowConfidence { .. },
                ..
            } => Self::LowConfidence,
            ConversionError::Synthesis { .. } => Self::SynthesisError,
            ConversionError::Timeout(_) => Self::Timeout,
        }
    }
}

/// Per-job report entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub key: String,
    pub vendor: String,
    pub outcome: JobOutcome,
    /// Strategy that produced the template, or the one attempted on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    /// Strategy picked before any demotion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classified: Option<Strategy>,
    pub oracle_rows: usize,
    pub target_rows: usize,
    pub match_ratio: f64,
    pub row_count_match: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unanchored: Vec<String>,
    pub locator_failures: usize,
    /// Failure description or first mismatches, for triage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub elapsed_ms: u64,
}

/// Mismatches quoted in a low-confidence job's detail.
const DETAIL_MISMATCHES: usize = 3;

impl JobReport {
    /// Report for a job that produced a template.
    pub fn from_conversion(template: &Template, conversion: &Conversion, elapsed: Duration) -> Self {
        let validation = &conversion.validation;
        let detail = (!conversion.accepted).then(|| {
            let mut parts = vec![format!(
                "match ratio {:.3}, rows {}/{}",
                validation.match_ratio(),
                validation.target_rows,
                validation.oracle_rows
            )];
            parts.extend(
                validation
                    .mismatches
                    .iter()
                    .take(DETAIL_MISMATCHES)
                    .map(describe_mismatch),
            );
            parts.join("; ")
        });

        Self {
            key: template.key.clone(),
            vendor: template.vendor().to_string(),
            outcome: if conversion.accepted {
                JobOutcome::Success
            } else {
                JobOutcome::LowConfidence
            },
            strategy: Some(conversion.synthesized.strategy),
            classified: Some(conversion.classified),
            oracle_rows: validation.oracle_rows,
            target_rows: validation.target_rows,
            match_ratio: validation.match_ratio(),
            row_count_match: validation.row_count_matches(),
            unanchored: conversion.synthesized.unanchored.clone(),
            locator_failures: conversion.locator_failures.len(),
            detail,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Report for a failed job.
    pub fn from_error(template: &Template, err: &ConversionError, elapsed: Duration) -> Self {
        let strategy = match err {
            ConversionError::Synthesis { strategy, .. } => Some(*strategy),
            _ => None,
        };
        Self {
            key: template.key.clone(),
            vendor: template.vendor().to_string(),
            outcome: JobOutcome::from(err),
            strategy,
            classified: strategy,
            oracle_rows: 0,
            target_rows: 0,
            match_ratio: 0.0,
            row_count_match: false,
            unanchored: Vec::new(),
            locator_failures: 0,
            detail: Some(err.to_string()),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Outcome counts for one breakdown bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub total: usize,
    pub success: usize,
    pub low_confidence: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    fn record(&mut self, outcome: JobOutcome) {
        self.total += 1;
        match outcome {
            JobOutcome::Success => self.success += 1,
            JobOutcome::LowConfidence => self.low_confidence += 1,
            _ => self.failed += 1,
        }
    }
}

/// Aggregate report for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    pub generated_at: String,
    pub version: String,
    pub total: usize,
    /// Job count per outcome, keyed by its snake_case name.
    pub outcomes: BTreeMap<String, usize>,
    pub by_vendor: BTreeMap<String, OutcomeCounts>,
    /// Keyed by the strategy that produced (or was attempted for) the template.
    pub by_strategy: BTreeMap<String, OutcomeCounts>,
    /// Mean match ratio over jobs that produced a template.
    pub mean_match_ratio: f64,
    /// Helper threads left running after their job timed out.
    #[serde(default)]
    pub abandoned: usize,
    pub elapsed_secs: f64,
    /// Jobs per second.
    pub throughput: f64,
    /// Job reports sorted by key.
    pub jobs: Vec<JobReport>,
}

impl ConversionReport {
    pub fn new(mut jobs: Vec<JobReport>, elapsed: Duration) -> Self {
        jobs.sort_by(|a, b| a.key.cmp(&b.key));

        let mut outcomes = BTreeMap::new();
        let mut by_vendor: BTreeMap<String, OutcomeCounts> = BTreeMap::new();
        let mut by_strategy: BTreeMap<String, OutcomeCounts> = BTreeMap::new();
        let mut ratio_sum = 0.0;
        let mut built = 0usize;

        for job in &jobs {
            *outcomes.entry(job.outcome.to_string()).or_insert(0) += 1;
            by_vendor.entry(job.vendor.clone()).or_default().record(job.outcome);
            if let Some(strategy) = job.strategy {
                by_strategy
                    .entry(strategy.to_string())
                    .or_default()
                    .record(job.outcome);
            }
            if matches!(job.outcome, JobOutcome::Success | JobOutcome::LowConfidence)
                && job.oracle_rows > 0
            {
                ratio_sum += job.match_ratio;
                built += 1;
            }
        }

        let elapsed_secs = elapsed.as_secs_f64();
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            total: jobs.len(),
            outcomes,
            by_vendor,
            by_strategy,
            mean_match_ratio: if built == 0 { 0.0 } else { ratio_sum / built as f64 },
            abandoned: jobs
                .iter()
                .filter(|job| job.outcome == JobOutcome::Timeout)
                .count(),
            elapsed_secs,
            throughput: if elapsed_secs > 0.0 {
                jobs.len() as f64 / elapsed_secs
            } else {
                0.0
            },
            jobs,
        }
    }

    pub fn count(&self, outcome: JobOutcome) -> usize {
        self.outcomes.get(&outcome.to_string()).copied().unwrap_or(0)
    }

    /// Outcome distribution, most frequent first.
    pub fn outcome_summary(&self) -> Vec<(String, usize)> {
        let mut summary: Vec<(String, usize)> =
            self.outcomes.iter().map(|(k, v)| (k.clone(), *v)).collect();
        summary.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn test_job_outcome_display_matches_serde() {
        let variants = [
            JobOutcome::Success,
            JobOutcome::LowConfidence,
            JobOutcome::SynthesisError,
            JobOutcome::EngineError,
            JobOutcome::NoMatch,
            JobOutcome::Timeout,
        ];
        for variant in variants {
            let display = variant.to_string();
            let serde = serde_json::to_value(variant).unwrap();
            assert_eq!(serde.as_str().unwrap(), display);
        }
    }

    #[test]
    fn test_errors_map_to_outcomes() {
        let low = ConversionError::Synthesis {
            strategy: Strategy::Table,
            reason: SynthesisError::LowConfidence {
                unanchored: 3,
                total: 4,
            },
        };
        assert_eq!(JobOutcome::from(&low), JobOutcome::LowConfidence);
        let empty = ConversionError::Synthesis {
            strategy: Strategy::Paragraph,
            reason: SynthesisError::Empty,
        };
        assert_eq!(JobOutcome::from(&empty), JobOutcome::SynthesisError);
        assert_eq!(
            JobOutcome::from(&ConversionError::from(EngineError::MissingStart)),
            JobOutcome::EngineError
        );
        assert_eq!(
            JobOutcome::from(&ConversionError::from(EngineError::NoMatch)),
            JobOutcome::NoMatch
        );
        assert_eq!(
            JobOutcome::from(&ConversionError::Timeout(Duration::from_secs(1))),
            JobOutcome::Timeout
        );
        assert_eq!(
            JobOutcome::from(&ConversionError::Aborted("thread died".into())),
            JobOutcome::SynthesisError
        );
    }

    #[test]
    fn test_report_aggregates_breakdowns() {
        let a = Template::source("cisco_ios_show_version", "");
        let b = Template::source("arista_eos_show_vlan", "");
        let err = ConversionError::NoMatch("sample produced zero records".into());
        let jobs = vec![
            JobReport::from_error(&a, &err, Duration::from_millis(5)),
            JobReport::from_error(&b, &ConversionError::Timeout(Duration::from_secs(30)), Duration::ZERO),
        ];
        let report = ConversionReport::new(jobs, Duration::from_secs(2));
        assert_eq!(report.total, 2);
        assert_eq!(report.count(JobOutcome::NoMatch), 1);
        assert_eq!(report.count(JobOutcome::Success), 0);
        assert_eq!(report.jobs[0].key, "arista_eos_show_vlan");
        assert_eq!(report.by_vendor["cisco"].failed, 1);
        assert!((report.throughput - 1.0).abs() < 1e-9);
        assert_eq!(report.mean_match_ratio, 0.0);
        assert_eq!(report.abandoned, 1);
    }
}
