//! Conversion of state-machine parsing templates into placeholder templates.
//!
//! A source template is run against its own sample text to obtain ground
//! truth records. Those values are located back in the sample, the data is
//! classified by shape, a placeholder template is synthesized from the
//! surrounding literal text, and the result is re-parsed against the same
//! sample to prove it reproduces the records.
//!
//! # Main entry points
//!
//! - [`convert_template`] converts one template.
//! - [`BatchRunner`] converts many on a bounded worker pool and aggregates a
//!   [`ConversionReport`].
//! - [`rank_templates`] scores stored templates of either format against
//!   unknown text and picks the best parser.
//!
//! # Example
//!
//! ```
//! use template_bridge_convert::{ConversionConfig, convert_template};
//! use template_bridge_core::{Strategy, Template};
//!
//! let source = Template::source(
//!     "demo_show_interfaces",
//!     "Value NAME (eth\\d+)\nValue STATE (up|down)\n\nStart\n  ^${NAME}\\s+${STATE} -> Record\n",
//! )
//! .with_sample("eth0   up\neth1   down\neth2   up\n");
//!
//! let conversion = convert_template(&source, None, &ConversionConfig::default()).unwrap();
//! assert_eq!(conversion.synthesized.strategy, Strategy::Table);
//! assert_eq!(conversion.validation.match_ratio(), 1.0);
//! ```

pub mod batch;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod locate;
pub mod pipeline;
pub mod report;
pub mod score;
pub mod synth;
pub mod validate;

pub use batch::{BatchResult, BatchRunner, ConversionJob, ConvertedTemplate};
pub use config::{BatchConfig, BridgeConfig, ConfigError, ConversionConfig, ScoreConfig};
pub use engine::{TemplateEngine, TemplateProfile, engine_for};
pub use error::{ConversionError, EngineError, SynthesisError};
pub use export::{ExportError, export_templates, write_report};
pub use pipeline::{Conversion, convert_template};
pub use report::{ConversionReport, JobOutcome, JobReport};
pub use score::{MatchResult, ScoreBreakdown, ScoredTemplate, rank_templates, score_records};
