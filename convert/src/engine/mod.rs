//! Template engines behind one narrow capability interface.
//!
//! The pipeline never branches on which engine is in play: the oracle parse
//! of a source template and the validation parse of a synthesized target
//! template both go through [`TemplateEngine`]. Engines also expose a
//! [`TemplateProfile`], the structural view (field order, carry-forward
//! fields, literal anchors, declared patterns) that the locator, classifier
//! and synthesizers consume.
//!
//! Both adapters compile the template on every call and keep no state
//! between calls, so they are reentrant and need no locking.

pub mod fsm;
pub(crate) mod literal;
pub mod placeholder;

use template_bridge_core::{Record, Template, TemplateFormat};

use crate::error::{EngineError, EngineResult};

/// Literal text immediately around one reference to a field in a template.
///
/// Line boundaries are rendered as `'\n'`, whitespace classes as a single
/// space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Anchor {
    pub before: String,
    pub after: String,
}

/// What a template says about one of its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldProfile {
    pub name: String,
    /// Value persists across records until overwritten.
    pub carry: bool,
    /// Value accumulates every match into a list.
    pub list: bool,
    /// Records lacking this value are dropped by the engine.
    pub required: bool,
    /// Regex the field's value is declared to match, when known.
    pub pattern: Option<String>,
    pub anchors: Vec<Anchor>,
}

impl FieldProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            carry: false,
            list: false,
            required: false,
            pattern: None,
            anchors: Vec::new(),
        }
    }
}

/// Structural view of a compiled template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateProfile {
    /// Fields in declaration order.
    pub fields: Vec<FieldProfile>,
}

impl TemplateProfile {
    pub fn field(&self, name: &str) -> Option<&FieldProfile> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_carry(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.carry)
    }

    pub fn carry_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.carry)
            .map(|f| f.name.as_str())
            .collect()
    }

    pub fn has_carry_fields(&self) -> bool {
        self.fields.iter().any(|f| f.carry)
    }
}

/// Capability shared by the source and target engines.
pub trait TemplateEngine: Send + Sync {
    /// Which template format this engine understands.
    fn format(&self) -> TemplateFormat;

    /// Parses `text` with `body`, returning records in emission order.
    ///
    /// Zero records is a valid result here; see [`extract`](Self::extract).
    fn parse(&self, body: &str, text: &str) -> EngineResult<Vec<Record>>;

    /// Compiles `body` and describes its fields.
    fn profile(&self, body: &str) -> EngineResult<TemplateProfile>;

    /// Parses a stored template against `text`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoMatch`] when the template compiles but
    /// produces no records, so callers can tell "nothing matched" apart
    /// from a malformed template.
    fn extract(&self, template: &Template, text: &str) -> EngineResult<Vec<Record>> {
        let records = self.parse(&template.body, text)?;
        if records.is_empty() {
            return Err(EngineError::NoMatch);
        }
        Ok(records)
    }
}

static STATE_MACHINE: fsm::StateMachineEngine = fsm::StateMachineEngine;
static PLACEHOLDER: placeholder::PlaceholderEngine = placeholder::PlaceholderEngine;

/// Returns the engine for a template format.
///
/// # Examples
///
/// ```
/// use template_bridge_convert::engine::engine_for;
/// use template_bridge_core::{Template, TemplateFormat};
///
/// let template = Template::source("demo", "Version: (?P<VERSION>\\S+)");
/// let records = engine_for(TemplateFormat::Source)
///     .extract(&template, "Version: 15.2")
///     .unwrap();
/// assert_eq!(records[0].get("VERSION").unwrap().as_scalar(), Some("15.2"));
/// ```
pub fn engine_for(format: TemplateFormat) -> &'static dyn TemplateEngine {
    match format {
        TemplateFormat::Source => &STATE_MACHINE,
        TemplateFormat::Target => &PLACEHOLDER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_for_reports_its_format() {
        for format in [TemplateFormat::Source, TemplateFormat::Target] {
            assert_eq!(engine_for(format).format(), format);
        }
    }

    #[test]
    fn test_extract_distinguishes_no_match() {
        let template = Template::target("t", "Version: {{ VERSION }}");
        let err = engine_for(TemplateFormat::Target)
            .extract(&template, "nothing here")
            .unwrap_err();
        assert!(matches!(err, EngineError::NoMatch));
    }

    #[test]
    fn test_engines_are_shareable_across_threads() {
        let engine = engine_for(TemplateFormat::Source);
        std::thread::scope(|scope| {
            for n in 0..4 {
                scope.spawn(move || {
                    let text = format!("Version: {n}.0");
                    let records = engine.parse("Version: (?P<V>\\S+)", &text).unwrap();
                    assert_eq!(records.len(), 1);
                });
            }
        });
    }
}
