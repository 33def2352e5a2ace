//! Core data model for template conversion.
//!
//! This crate defines the types shared by the conversion pipeline, the
//! template store and the command-line front end:
//!
//! - [`Template`]: a keyed parsing template in either [`TemplateFormat`],
//!   carrying the sample text it is validated against.
//! - [`Record`] / [`FieldValue`]: one parsed row; values are scalars or
//!   ordered lists.
//! - [`FieldOccurrence`] / [`Span`]: where a value was found in a sample.
//! - [`TypeHint`]: coarse lexical type of a value.
//! - [`Strategy`] / [`SynthesizedTemplate`] / [`ValidationResult`]: the
//!   products of a conversion.
//!
//! Validation ([`validate_template`], [`validate_templates`]) catches
//! structural problems before templates are stored or converted, and
//! [`TemplateRepository`] is the narrow capability the pipeline uses to read
//! and write stored templates.
//!
//! # Example
//!
//! ```
//! use template_bridge_core::*;
//!
//! let template = Template::source("cisco_ios_show_version", "Version: (?P<VERSION>\\S+)")
//!     .with_sample("Version: 15.2");
//! assert!(validate_template(&template).is_empty());
//!
//! let mut record = Record::new();
//! record.insert("VERSION", "15.2");
//! assert_eq!(TypeHint::infer_all(record.get("VERSION").unwrap().parts()), TypeHint::Decimal);
//! ```

mod normalize;
mod repository;
mod types;
mod validate;

pub use normalize::{normalize_whitespace, values_equal};
pub use repository::{
    TemplateFilter, TemplateRepository, UpsertOutcome, filter_terms,
};
pub use types::*;
pub use validate::{TemplateError, validate_template, validate_templates};
