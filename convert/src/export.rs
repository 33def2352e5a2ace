//! Writes converted templates and batch reports to disk.
//!
//! Each template lands as `<key>.ttp` with the body verbatim, next to a
//! `<key>.json` sidecar holding its provenance and validation figures.
//! Templates that failed validation go under `low_confidence/` when exported
//! at all.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use template_bridge_core::Strategy;
use thiserror::Error;
use tracing::info;

use crate::batch::ConvertedTemplate;
use crate::report::ConversionReport;

pub const LOW_CONFIDENCE_DIR: &str = "low_confidence";
pub const REPORT_FILE: &str = "conversion-report.json";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct Sidecar<'a> {
    key: &'a str,
    source_key: &'a str,
    strategy: Strategy,
    accepted: bool,
    oracle_rows: usize,
    target_rows: usize,
    match_ratio: f64,
    unanchored: &'a [String],
    sample: &'a str,
}

/// Files written by [`export_templates`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub accepted: usize,
    pub low_confidence: usize,
    pub skipped: usize,
}

/// Replaces every character outside `[A-Za-z0-9_.-]` so a key is a safe file
/// stem.
pub fn sanitize_key(key: &str) -> String {
    let cleaned: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "template".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Writes templates under `dir`, creating it as needed.
///
/// # Errors
///
/// Returns the first I/O or serialization failure; files already written are
/// left in place.
pub fn export_templates(
    dir: &Path,
    templates: &[ConvertedTemplate],
    include_low_confidence: bool,
) -> Result<ExportSummary, ExportError> {
    let mut summary = ExportSummary::default();
    for converted in templates {
        let target_dir = if converted.accepted {
            summary.accepted += 1;
            dir.to_path_buf()
        } else if include_low_confidence {
            summary.low_confidence += 1;
            dir.join(LOW_CONFIDENCE_DIR)
        } else {
            summary.skipped += 1;
            continue;
        };
        create_dir(&target_dir)?;
        write_template(&target_dir, converted)?;
    }
    info!(
        dir = %dir.display(),
        accepted = summary.accepted,
        low_confidence = summary.low_confidence,
        skipped = summary.skipped,
        "exported templates"
    );
    Ok(summary)
}

fn write_template(dir: &Path, converted: &ConvertedTemplate) -> Result<(), ExportError> {
    let synthesized = &converted.synthesized;
    let template = &synthesized.template;
    let stem = sanitize_key(&template.key);

    write_file(&dir.join(format!("{stem}.ttp")), &template.body)?;

    let sidecar = Sidecar {
        key: &template.key,
        source_key: &synthesized.source_key,
        strategy: synthesized.strategy,
        accepted: converted.accepted,
        oracle_rows: converted.validation.oracle_rows,
        target_rows: converted.validation.target_rows,
        match_ratio: converted.validation.match_ratio(),
        unanchored: &synthesized.unanchored,
        sample: &template.sample,
    };
    let json = serde_json::to_string_pretty(&sidecar)?;
    write_file(&dir.join(format!("{stem}.json")), &json)
}

/// Writes the batch report as `conversion-report.json` under `dir`.
pub fn write_report(dir: &Path, report: &ConversionReport) -> Result<PathBuf, ExportError> {
    create_dir(dir)?;
    let path = dir.join(REPORT_FILE);
    let json = serde_json::to_string_pretty(report)?;
    write_file(&path, &json)?;
    Ok(path)
}

fn create_dir(dir: &Path) -> Result<(), ExportError> {
    fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, contents: &str) -> Result<(), ExportError> {
    fs::write(path, contents).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}
