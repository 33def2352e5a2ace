//! Target template synthesis.
//!
//! Every strategy builds a group layout from rendered sample lines; the
//! layout is then assembled into a target body, unanchored fields are
//! declared, and the body is compiled by the target engine before it is
//! returned. Strategies may hand the job to a less specific strategy when
//! the sample does not fit their shape:
//!
//! - Table demotes to Paragraph when row skeletons diverge,
//! - MultiSection falls back to Table or Paragraph when no carried value
//!   could be located.
//!
//! Sample lines that hold no located value but would still be captured by a
//! synthesized pattern (column headers, banners the source template skipped)
//! are written as literal lines ahead of the groups so they are consumed
//! without starting a record.

mod multisection;
mod paragraph;
pub(crate) mod render;
mod table;

use std::collections::{BTreeSet, HashSet};

use template_bridge_core::{Record, Strategy, SynthesizedTemplate, Template};
use tracing::{debug, info};

use crate::config::ConversionConfig;
use crate::engine::TemplateProfile;
use crate::engine::placeholder::{Placeholder, PlaceholderTemplate};
use crate::error::SynthesisError;
use crate::locate::{LocatedRecord, SampleText};
use render::{FieldStyles, RenderedLine};

/// Everything a strategy may look at.
pub struct SynthesisInput<'a> {
    pub source: &'a Template,
    pub sample: &'a SampleText<'a>,
    pub profile: &'a TemplateProfile,
    /// Oracle records.
    pub records: &'a [Record],
    /// Oracle records mapped onto the sample, index-aligned with `records`.
    pub located: &'a [LocatedRecord],
    pub config: &'a ConversionConfig,
}

/// A record-producing group of line patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GroupLayout {
    pub name: String,
    pub lines: Vec<RenderedLine>,
    pub children: Vec<GroupLayout>,
}

impl GroupLayout {
    /// Fields placed anywhere in this group or its children.
    fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self
            .lines
            .iter()
            .flat_map(|l| l.fields.iter().map(String::as_str))
            .collect();
        for child in &self.children {
            fields.extend(child.fields());
        }
        fields
    }

    fn line_count(&self) -> usize {
        self.lines.len() + self.children.iter().map(Self::line_count).sum::<usize>()
    }
}

/// What a strategy produced.
#[derive(Debug)]
pub(crate) enum Layout {
    Groups(Vec<GroupLayout>),
    /// The sample does not fit; retry with another strategy.
    Demote(Strategy),
}

/// Builds a target template with `strategy`, following demotions.
///
/// The returned template records the strategy that actually produced it.
///
/// # Errors
///
/// - [`SynthesisError::LowConfidence`] when more than
///   `max_unanchored_fraction` of the populated fields end up unanchored.
/// - [`SynthesisError::Empty`] when no line pattern could be built.
/// - [`SynthesisError::InvalidSyntax`] when the target engine rejects the body.
pub fn synthesize(
    strategy: Strategy,
    input: &SynthesisInput<'_>,
) -> Result<SynthesizedTemplate, SynthesisError> {
    let styles = FieldStyles::new(input.profile, input.located);

    let mut strategy = strategy;
    let groups = loop {
        let layout = match strategy {
            Strategy::Table => table::layout(input, &styles),
            Strategy::Paragraph => paragraph::layout(input, &styles),
            Strategy::MultiSection => multisection::layout(input, &styles),
        };
        match layout {
            Layout::Groups(groups) => break groups,
            Layout::Demote(next) => {
                info!(key = %input.source.key, from = %strategy, to = %next, "strategy demoted");
                strategy = next;
            }
        }
    };

    let populated = populated_fields(input.records);
    let anchored: HashSet<&str> = groups.iter().flat_map(GroupLayout::fields).collect();
    let unanchored: Vec<String> = populated
        .iter()
        .filter(|name| !anchored.contains(name.as_str()))
        .cloned()
        .collect();

    if !populated.is_empty()
        && unanchored.len() as f64 / populated.len() as f64 > input.config.max_unanchored_fraction
    {
        return Err(SynthesisError::LowConfidence {
            unanchored: unanchored.len(),
            total: populated.len(),
        });
    }
    if groups.iter().map(GroupLayout::line_count).sum::<usize>() == 0 {
        return Err(SynthesisError::Empty);
    }

    let body = assemble(&[], &groups, &unanchored);
    let compiled = PlaceholderTemplate::parse(&body).map_err(SynthesisError::InvalidSyntax)?;
    let skipped = skipped_lines(input, &compiled, &styles);
    let body = if skipped.is_empty() {
        body
    } else {
        let body = assemble(&skipped, &groups, &unanchored);
        PlaceholderTemplate::parse(&body).map_err(SynthesisError::InvalidSyntax)?;
        body
    };
    debug!(
        key = %input.source.key,
        %strategy,
        groups = groups.len(),
        skipped = skipped.len(),
        unanchored = unanchored.len(),
        "template synthesized"
    );

    Ok(SynthesizedTemplate {
        template: Template::target(input.source.key.clone(), body)
            .with_sample(input.source.sample.clone()),
        strategy,
        source_key: input.source.key.clone(),
        unanchored,
    })
}

/// Fields holding a value in at least one record, in first-seen order.
fn populated_fields(records: &[Record]) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    for record in records {
        for name in record.populated_fields() {
            if !seen.iter().any(|s| s == name) {
                seen.push(name.to_string());
            }
        }
    }
    seen
}

/// Literal patterns for unclaimed sample lines that `compiled` would capture
/// fields from, in text order.
fn skipped_lines(
    input: &SynthesisInput<'_>,
    compiled: &PlaceholderTemplate,
    styles: &FieldStyles,
) -> Vec<String> {
    let sample = input.sample;
    let claimed: BTreeSet<usize> = input
        .located
        .iter()
        .flat_map(|r| r.occurrences())
        .map(|o| sample.line_of(o.span.start))
        .collect();
    let claimed_text: HashSet<String> = claimed
        .iter()
        .map(|&line| render::render_line(sample, line, &[], styles).pattern)
        .collect();

    let mut skipped: Vec<String> = Vec::new();
    for line in (0..sample.line_count()).filter(|l| !claimed.contains(l)) {
        let text = sample.line(line);
        if text.trim().is_empty() || !compiled.captures_fields(text) {
            continue;
        }
        let pattern = render::render_line(sample, line, &[], styles).pattern;
        if !claimed_text.contains(&pattern) && !skipped.contains(&pattern) {
            skipped.push(pattern);
        }
    }
    skipped
}

/// Writes the skipped literal lines, then the group tree; identical lines are
/// emitted once per template and unanchored declarations close the first
/// top-level group.
fn assemble(skipped: &[String], groups: &[GroupLayout], unanchored: &[String]) -> String {
    let mut out = String::new();
    let mut seen = HashSet::new();
    for line in skipped {
        out.push_str(line);
        out.push('\n');
    }
    for (idx, group) in groups.iter().enumerate() {
        let trailer = if idx == 0 { unanchored } else { &[][..] };
        write_group(&mut out, group, &mut seen, trailer);
    }
    out
}

fn write_group(
    out: &mut String,
    group: &GroupLayout,
    seen: &mut HashSet<String>,
    unanchored: &[String],
) {
    out.push_str(&format!("<group name=\"{}\">\n", group.name));
    for line in &group.lines {
        if seen.insert(line.pattern.clone()) {
            out.push_str(&line.pattern);
            out.push('\n');
        }
    }
    for child in &group.children {
        write_group(out, child, seen, &[]);
    }
    for name in unanchored {
        let mut placeholder = Placeholder::new(name);
        placeholder.unanchored = true;
        out.push_str(&placeholder.to_string());
        out.push('\n');
    }
    out.push_str("</group>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{TemplateEngine, engine_for};
    use crate::locate::locate_records;
    use template_bridge_core::TemplateFormat;

    fn run(source: &Template, strategy: Strategy) -> Result<SynthesizedTemplate, SynthesisError> {
        let engine = engine_for(TemplateFormat::Source);
        let records = engine.extract(source, &source.sample).unwrap();
        let profile = engine.profile(&source.body).unwrap();
        let sample = SampleText::new(&source.sample);
        let config = ConversionConfig::default();
        let located = locate_records(&sample, &profile, &records, &config);
        let input = SynthesisInput {
            source,
            sample: &sample,
            profile: &profile,
            records: &records,
            located: &located,
            config: &config,
        };
        synthesize(strategy, &input)
    }

    #[test]
    fn test_paragraph_single_line() {
        let source = Template::source("show_version", r"Version: (?P<VERSION>\S+)")
            .with_sample("Version: 15.2");
        let synthesized = run(&source, Strategy::Paragraph).unwrap();
        assert_eq!(synthesized.strategy, Strategy::Paragraph);
        assert_eq!(synthesized.source_key, "show_version");
        assert_eq!(synthesized.template.format, TemplateFormat::Target);
        assert!(synthesized.template.body.contains("Version: {{ VERSION"));
        assert!(synthesized.unanchored.is_empty());
    }

    #[test]
    fn test_never_populated_field_is_not_declared() {
        let source = Template::source(
            "demo",
            "Value HOST (\\S+)\nValue MODEL (\\S+)\nValue SERIAL (\\S+)\n\nStart\n  ^host ${HOST}\n  ^model ${MODEL}\n  ^serial ${SERIAL}\n",
        )
        .with_sample("host r1\nmodel x9\nserial  \n");
        let synthesized = run(&source, Strategy::Paragraph).unwrap();
        assert!(synthesized.unanchored.is_empty());
        assert!(!synthesized.template.body.contains("SERIAL"));
    }

    #[test]
    fn test_too_many_unanchored_fields_is_low_confidence() {
        let source = Template::source(
            "demo",
            "Value A (\\S+)\nValue B (\\S+)\nValue C (\\S+)\n\nStart\n  ^a ${A} ${B} ${C}\n",
        )
        .with_sample("a 1 2 3\n");
        let engine = engine_for(TemplateFormat::Source);
        let records = engine.extract(&source, &source.sample).unwrap();
        let profile = engine.profile(&source.body).unwrap();
        let sample = SampleText::new(&source.sample);
        let config = ConversionConfig::default();
        let mut located = locate_records(&sample, &profile, &records, &config);
        for field in &mut located[0].fields[1..] {
            field.occurrences.clear();
        }
        let input = SynthesisInput {
            source: &source,
            sample: &sample,
            profile: &profile,
            records: &records,
            located: &located,
            config: &config,
        };
        let err = synthesize(Strategy::Paragraph, &input).unwrap_err();
        assert!(matches!(err, SynthesisError::LowConfidence { unanchored: 2, total: 3 }));
    }

    #[test]
    fn test_unanchored_declaration_in_body() {
        let source = Template::source(
            "demo",
            "Value A (\\S+)\nValue B (\\S+)\nValue C (\\S+)\n\nStart\n  ^a ${A} ${B} ${C}\n",
        )
        .with_sample("a 1 2 3\n");
        let engine = engine_for(TemplateFormat::Source);
        let records = engine.extract(&source, &source.sample).unwrap();
        let profile = engine.profile(&source.body).unwrap();
        let sample = SampleText::new(&source.sample);
        let config = ConversionConfig::default();
        let mut located = locate_records(&sample, &profile, &records, &config);
        located[0].fields[2].occurrences.clear();
        let input = SynthesisInput {
            source: &source,
            sample: &sample,
            profile: &profile,
            records: &records,
            located: &located,
            config: &config,
        };
        let synthesized = synthesize(Strategy::Paragraph, &input).unwrap();
        assert_eq!(synthesized.unanchored, vec!["C"]);
        assert!(synthesized.template.body.contains("{{ C | unanchored }}"));
    }

    #[test]
    fn test_header_line_is_consumed_not_recorded() {
        let source = Template::source(
            "show_interface_status",
            "Value INTERFACE (\\S+)\nValue STATUS (\\S+)\n\nStart\n  ^Interface\\s+Status -> Next\n  ^${INTERFACE}\\s+${STATUS} -> Record\n",
        )
        .with_sample("Interface  Status\nGi0/1 up\nGi0/2 down\nGi0/3 up\n");
        let synthesized = run(&source, Strategy::Table).unwrap();
        let body = &synthesized.template.body;
        assert!(body.starts_with("Interface Status\n<group"), "{body}");

        let records = engine_for(TemplateFormat::Target)
            .parse(body, &source.sample)
            .unwrap();
        assert_eq!(records.len(), 3, "{body}");
        assert_eq!(records[0].get("INTERFACE").and_then(|v| v.as_scalar()), Some("Gi0/1"));
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let source = Template::source(
            "demo",
            "Value NAME (eth\\d+)\nValue STATE (up|down)\n\nStart\n  ^${NAME}\\s+${STATE} -> Record\n",
        )
        .with_sample("eth0 up\neth1 down\neth2 up\n");
        let first = run(&source, Strategy::Table).unwrap();
        let second = run(&source, Strategy::Table).unwrap();
        assert_eq!(first.template.body, second.template.body);
    }
}
