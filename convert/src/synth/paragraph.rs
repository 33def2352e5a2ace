//! One scattered record.

use std::collections::{BTreeMap, HashSet};

use template_bridge_core::FieldOccurrence;

use super::render::{FieldStyles, RenderedLine, group_name, render_line};
use super::{GroupLayout, Layout, SynthesisInput};

/// Places each field at the spans of the first record that located it and
/// emits the touched lines in text order inside a single group.
///
/// Later records whose lines render to a shape not seen yet add those lines
/// too: a single-line record becomes a sibling group of its own, the lines
/// of a multi-line record join the main group.
pub(super) fn layout(input: &SynthesisInput<'_>, styles: &FieldStyles) -> Layout {
    let mut order: Vec<&str> = Vec::new();
    for field in input.located.iter().flat_map(|r| r.fields.iter()) {
        if !order.contains(&field.name.as_str()) {
            order.push(&field.name);
        }
    }

    let mut chosen: Vec<&FieldOccurrence> = Vec::new();
    for name in order {
        let Some(field) = input
            .located
            .iter()
            .filter_map(|r| r.field(name))
            .find(|f| !f.occurrences.is_empty())
        else {
            continue;
        };
        for occurrence in &field.occurrences {
            if !chosen.iter().any(|c| c.span.overlaps(&occurrence.span)) {
                chosen.push(occurrence);
            }
        }
    }

    let mut by_line: BTreeMap<usize, Vec<&FieldOccurrence>> = BTreeMap::new();
    for occurrence in chosen {
        by_line
            .entry(input.sample.line_of(occurrence.span.start))
            .or_default()
            .push(occurrence);
    }

    let used: HashSet<usize> = by_line.keys().copied().collect();
    let mut lines: Vec<RenderedLine> = by_line
        .into_iter()
        .map(|(line, occurrences)| render_line(input.sample, line, &occurrences, styles))
        .collect();
    let mut seen: HashSet<String> = lines.iter().map(|l| l.skeleton.clone()).collect();
    let mut siblings: Vec<GroupLayout> = Vec::new();
    for record in input.located {
        let mut record_lines: BTreeMap<usize, Vec<&FieldOccurrence>> = BTreeMap::new();
        for occurrence in record.fresh_occurrences() {
            record_lines
                .entry(input.sample.line_of(occurrence.span.start))
                .or_default()
                .push(occurrence);
        }
        let single = record_lines.len() == 1;
        let rendered: Vec<RenderedLine> = record_lines
            .into_iter()
            .filter(|(line, _)| !used.contains(line))
            .map(|(line, occurrences)| render_line(input.sample, line, &occurrences, styles))
            .filter(|l| seen.insert(l.skeleton.clone()))
            .collect();
        if single && rendered.len() == 1 {
            siblings.extend(rendered.into_iter().map(|line| GroupLayout {
                name: group_name(line.fields.iter().map(String::as_str)),
                lines: vec![line],
                children: Vec::new(),
            }));
        } else {
            lines.extend(rendered);
        }
    }

    let name = group_name(lines.iter().flat_map(|l| l.fields.iter().map(String::as_str)));
    let mut groups = vec![GroupLayout {
        name,
        lines,
        children: Vec::new(),
    }];
    groups.extend(siblings);
    Layout::Groups(groups)
}
