//! Error types for engines, synthesis and conversion jobs.

use std::time::Duration;

use template_bridge_core::Strategy;
use thiserror::Error;

/// Failure of a template engine to compile a template or run it over text.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Template body is malformed for its engine.
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// A rule or field pattern is not a valid regular expression.
    #[error("line {line}: invalid regex: {message}")]
    Regex { line: usize, message: String },

    /// State-machine template has no `Start` state.
    #[error("template has no Start state")]
    MissingStart,

    /// A rule transitions to a state that is never declared.
    #[error("line {line}: transition to undefined state '{state}'")]
    UndefinedState { line: usize, state: String },

    /// Template declares no fields at all.
    #[error("template declares no fields")]
    NoFields,

    /// An `Error` action fired while parsing input.
    #[error("error action in state '{state}' on input line {line}: {message}")]
    ErrorAction {
        state: String,
        line: usize,
        message: String,
    },

    /// Parsing succeeded but produced zero records.
    #[error("no records extracted from input")]
    NoMatch,
}

impl EngineError {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn regex(line: usize, err: regex::Error) -> Self {
        Self::Regex {
            line,
            message: err.to_string(),
        }
    }
}

/// Failure to build a candidate target template.
#[derive(Debug, Clone, Error)]
pub enum SynthesisError {
    /// Generated body was rejected by the target engine.
    #[error("generated template does not parse: {0}")]
    InvalidSyntax(EngineError),

    /// Too many fields could not be located in the sample.
    #[error("{unanchored} of {total} populated fields could not be located")]
    LowConfidence { unanchored: usize, total: usize },

    /// Nothing in the sample could be turned into a line pattern.
    #[error("no line pattern could be built from the sample")]
    Empty,
}

/// Classified failure of one conversion job.
#[derive(Debug, Clone, Error)]
pub enum ConversionError {
    /// Template is malformed for its engine, or the engine failed at runtime.
    #[error("engine error: {0}")]
    Engine(EngineError),

    /// The sample produced no records, so there is nothing to convert.
    #[error("no data to convert: {0}")]
    NoMatch(String),

    /// No valid candidate template could be built.
    #[error("{strategy} synthesis failed: {reason}")]
    Synthesis {
        strategy: Strategy,
        reason: SynthesisError,
    },

    /// The job exceeded its ceiling and was abandoned.
    #[error("conversion exceeded {0:?}")]
    Timeout(Duration),

    /// The job died without reporting a result.
    #[error("conversion aborted: {0}")]
    Aborted(String),
}

impl From<EngineError> for ConversionError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NoMatch => Self::NoMatch("sample produced zero records".to_string()),
            other => Self::Engine(other),
        }
    }
}

/// Convenience alias for engine results.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Convenience alias for conversion results.
pub type Result<T> = std::result::Result<T, ConversionError>;
