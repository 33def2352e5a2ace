//! Repeating header blocks with nested detail records.

use std::collections::{BTreeMap, BTreeSet};

use template_bridge_core::{FieldOccurrence, Strategy};
use tracing::debug;

use super::render::{FieldStyles, RenderedLine, group_name, render_line};
use super::{GroupLayout, Layout, SynthesisInput};
use crate::classify::is_consistent_table;

/// Splits the sample at lines holding freshly located carried values.
///
/// Those header lines form the outer group; each distinct shape of per-record
/// detail lines becomes a nested group. Without any located carried value
/// the job falls back to Table for consistent records, else Paragraph.
pub(super) fn layout(input: &SynthesisInput<'_>, styles: &FieldStyles) -> Layout {
    let header_lines: BTreeSet<usize> = input
        .located
        .iter()
        .flat_map(|r| r.fields.iter())
        .filter(|f| !f.inherited && input.profile.is_carry(&f.name))
        .flat_map(|f| f.occurrences.iter())
        .map(|o| input.sample.line_of(o.span.start))
        .collect();

    if header_lines.is_empty() {
        let fallback = if is_consistent_table(input.records, input.config) {
            Strategy::Table
        } else {
            Strategy::Paragraph
        };
        debug!(%fallback, "no carried value located");
        return Layout::Demote(fallback);
    }

    let mut header_occurrences: BTreeMap<usize, Vec<&FieldOccurrence>> = BTreeMap::new();
    let mut shapes: Vec<(String, Vec<RenderedLine>)> = Vec::new();

    for record in input.located {
        let mut detail: BTreeMap<usize, Vec<&FieldOccurrence>> = BTreeMap::new();
        for occurrence in record.fresh_occurrences() {
            let line = input.sample.line_of(occurrence.span.start);
            let bucket = if header_lines.contains(&line) {
                header_occurrences.entry(line).or_default()
            } else {
                detail.entry(line).or_default()
            };
            if !bucket.iter().any(|o| o.span.overlaps(&occurrence.span)) {
                bucket.push(occurrence);
            }
        }
        if detail.is_empty() {
            continue;
        }

        let lines: Vec<RenderedLine> = detail
            .into_iter()
            .map(|(line, occurrences)| render_line(input.sample, line, &occurrences, styles))
            .collect();
        let key = lines
            .iter()
            .map(|l| l.skeleton.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if !shapes.iter().any(|(existing, _)| *existing == key) {
            shapes.push((key, lines));
        }
    }

    let headers: Vec<RenderedLine> = header_occurrences
        .into_iter()
        .map(|(line, occurrences)| render_line(input.sample, line, &occurrences, styles))
        .collect();
    let carried: Vec<&str> = headers
        .iter()
        .flat_map(|l| l.fields.iter().map(String::as_str))
        .filter(|name| input.profile.is_carry(name))
        .collect();

    let children = shapes
        .into_iter()
        .map(|(_, lines)| GroupLayout {
            name: group_name(lines.iter().flat_map(|l| l.fields.iter().map(String::as_str))),
            lines,
            children: Vec::new(),
        })
        .collect();

    Layout::Groups(vec![GroupLayout {
        name: group_name(carried),
        lines: headers,
        children,
    }])
}

#[cfg(test)]
mod tests {
    use super::super::synthesize;
    use super::*;
    use crate::config::ConversionConfig;
    use crate::engine::engine_for;
    use crate::locate::{SampleText, locate_records};
    use template_bridge_core::{SynthesizedTemplate, Template, TemplateFormat};

    const INTERFACES: &str = "\
Value Filldown IFACE (\\S+)
Value ADDR (\\d+\\.\\d+\\.\\d+\\.\\d+)

Start
  ^interface ${IFACE}
  ^\\s+ip address ${ADDR} -> Record
";

    const SAMPLE: &str = "\
interface eth0
  ip address 10.0.0.1
  ip address 10.0.0.2
interface eth1
  ip address 10.1.0.1
";

    fn synth(source: &Template, strategy: Strategy) -> SynthesizedTemplate {
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
        synthesize(strategy, &input).unwrap()
    }

    #[test]
    fn test_header_and_detail_groups() {
        let source = Template::source("show_ip_int", INTERFACES).with_sample(SAMPLE);
        let synthesized = synth(&source, Strategy::MultiSection);
        assert_eq!(synthesized.strategy, Strategy::MultiSection);
        let body = &synthesized.template.body;
        assert!(body.starts_with("<group name=\"iface\">\ninterface {{ IFACE"), "{body}");
        assert!(body.contains("| carry }}"), "{body}");
        assert!(body.contains("<group name=\"addr\">\n ip address {{ ADDR | IP"), "{body}");
        assert_eq!(body.matches("ip address").count(), 1, "{body}");
    }

    #[test]
    fn test_target_reproduces_carried_rows() {
        let source = Template::source("show_ip_int", INTERFACES).with_sample(SAMPLE);
        let synthesized = synth(&source, Strategy::MultiSection);
        let records = engine_for(TemplateFormat::Target)
            .parse(&synthesized.template.body, SAMPLE)
            .unwrap();
        let ifaces: Vec<_> = records
            .iter()
            .map(|r| r.get("IFACE").unwrap().as_scalar().unwrap())
            .collect();
        assert_eq!(ifaces, vec!["eth0", "eth0", "eth1"]);
    }

    #[test]
    fn test_without_carry_falls_back() {
        let source = Template::source(
            "demo",
            "Value NAME (eth\\d+)\nValue STATE (up|down)\n\nStart\n  ^${NAME}\\s+${STATE} -> Record\n",
        )
        .with_sample("eth0 up\neth1 down\n");
        let synthesized = synth(&source, Strategy::MultiSection);
        assert_eq!(synthesized.strategy, Strategy::Table);
    }
}
