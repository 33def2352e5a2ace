//! One conversion job: oracle, locate, classify, synthesize, validate.

use template_bridge_core::{Record, Strategy, SynthesizedTemplate, Template, ValidationResult};
use tracing::{debug, info};

use crate::classify::classify;
use crate::config::ConversionConfig;
use crate::engine::engine_for;
use crate::error::{ConversionError, Result, SynthesisError};
use crate::locate::{LocateFailure, SampleText, locate_records};
use crate::synth::{SynthesisInput, synthesize};
use crate::validate::validate;

/// Outcome of a conversion that produced a target template.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub synthesized: SynthesizedTemplate,
    pub validation: ValidationResult,
    /// Oracle records the template was validated against.
    pub records: Vec<Record>,
    pub locator_failures: Vec<LocateFailure>,
    /// Strategy picked by classification or override, before demotion.
    pub classified: Strategy,
    /// Validation cleared the configured acceptance threshold.
    pub accepted: bool,
}

/// Converts a template using its own sample as ground truth.
///
/// # Errors
///
/// - [`ConversionError::NoMatch`] when the sample is empty or yields no records.
/// - [`ConversionError::Engine`] when the template is malformed.
/// - [`ConversionError::Synthesis`] when no valid target template could be built.
///
/// A validation shortfall is not an error: it is reported through
/// [`Conversion::accepted`].
///
/// # Examples
///
/// ```
/// use template_bridge_convert::config::ConversionConfig;
/// use template_bridge_convert::pipeline::convert_template;
/// use template_bridge_core::Template;
///
/// let source = Template::source("show_version", r"Version: (?P<VERSION>\S+)")
///     .with_sample("Version: 15.2");
/// let conversion = convert_template(&source, None, &ConversionConfig::default()).unwrap();
/// assert!(conversion.accepted);
/// assert!(conversion.synthesized.template.body.contains("Version: {{ VERSION"));
/// ```
pub fn convert_template(
    template: &Template,
    strategy: Option<Strategy>,
    config: &ConversionConfig,
) -> Result<Conversion> {
    if template.sample.trim().is_empty() {
        return Err(ConversionError::NoMatch("template has no sample text".to_string()));
    }

    let engine = engine_for(template.format);
    let records = engine.extract(template, &template.sample)?;
    let profile = engine.profile(&template.body)?;

    let sample = SampleText::new(&template.sample);
    let located = locate_records(&sample, &profile, &records, config);
    let locator_failures: Vec<LocateFailure> = located
        .iter()
        .flat_map(|r| r.failures.iter().cloned())
        .collect();

    let classified = strategy.unwrap_or_else(|| classify(&profile, &records, config));
    debug!(
        key = %template.key,
        records = records.len(),
        %classified,
        overridden = strategy.is_some(),
        "classified"
    );

    let input = SynthesisInput {
        source: template,
        sample: &sample,
        profile: &profile,
        records: &records,
        located: &located,
        config,
    };
    let synthesized = synthesize(classified, &input).map_err(|reason| ConversionError::Synthesis {
        strategy: classified,
        reason,
    })?;

    let validation = validate(&synthesized.template.body, &template.sample, &records).map_err(
        |err| ConversionError::Synthesis {
            strategy: synthesized.strategy,
            reason: SynthesisError::InvalidSyntax(err),
        },
    )?;
    let accepted = config.accepts(&validation);

    info!(
        key = %template.key,
        strategy = %synthesized.strategy,
        match_ratio = validation.match_ratio(),
        oracle_rows = validation.oracle_rows,
        target_rows = validation.target_rows,
        accepted,
        "converted"
    );

    Ok(Conversion {
        synthesized,
        validation,
        records,
        locator_failures,
        classified,
        accepted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use template_bridge_core::TemplateFormat;

    #[test]
    fn test_empty_sample_is_no_match() {
        let source = Template::source("t", r"Version: (?P<VERSION>\S+)");
        let err = convert_template(&source, None, &ConversionConfig::default()).unwrap_err();
        assert!(matches!(err, ConversionError::NoMatch(_)));
    }

    #[test]
    fn test_sample_without_records_is_no_match() {
        let source = Template::source("t", r"Version: (?P<VERSION>\S+)").with_sample("nothing");
        let err = convert_template(&source, None, &ConversionConfig::default()).unwrap_err();
        assert!(matches!(err, ConversionError::NoMatch(_)));
    }

    #[test]
    fn test_malformed_template_is_engine_error() {
        let source = Template::source("t", "Value X (\\S+)\n\nStart\n  ^x ${X} -> Nowhere\n")
            .with_sample("x 1");
        let err = convert_template(&source, None, &ConversionConfig::default()).unwrap_err();
        assert!(matches!(err, ConversionError::Engine(_)));
    }

    #[test]
    fn test_strategy_override_is_recorded() {
        let source = Template::source("t", r"Version: (?P<VERSION>\S+)").with_sample("Version: 1");
        let conversion =
            convert_template(&source, Some(Strategy::Table), &ConversionConfig::default()).unwrap();
        assert_eq!(conversion.classified, Strategy::Table);
        assert_eq!(conversion.synthesized.template.format, TemplateFormat::Target);
        assert!(conversion.accepted);
    }
}
