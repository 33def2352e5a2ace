//! One line pattern per row.

use std::collections::BTreeSet;

use template_bridge_core::{FieldOccurrence, Strategy};
use tracing::debug;

use super::render::{FieldStyles, RenderedLine, group_name, render_line};
use super::{GroupLayout, Layout, SynthesisInput};

/// Renders every single-line row and keeps one group per distinct skeleton.
///
/// Demotes to [`Strategy::Paragraph`] when the most common skeleton covers
/// less than `table_skeleton_share` of the rows.
pub(super) fn layout(input: &SynthesisInput<'_>, styles: &FieldStyles) -> Layout {
    let mut rows = 0usize;
    let mut shapes: Vec<(RenderedLine, usize)> = Vec::new();

    for record in input.located {
        let occurrences: Vec<&FieldOccurrence> = record.occurrences().collect();
        if occurrences.is_empty() {
            continue;
        }
        rows += 1;

        let lines: Vec<usize> = occurrences
            .iter()
            .map(|o| input.sample.line_of(o.span.start))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let &[line] = lines.as_slice() else {
            debug!(record = record.index, "row spans several lines");
            continue;
        };

        let rendered = render_line(input.sample, line, &occurrences, styles);
        match shapes.iter_mut().find(|(shape, _)| shape.skeleton == rendered.skeleton) {
            Some((_, count)) => *count += 1,
            None => shapes.push((rendered, 1)),
        }
    }

    if rows == 0 {
        return Layout::Groups(Vec::new());
    }
    let dominant = shapes.iter().map(|(_, count)| *count).max().unwrap_or(0);
    let share = dominant as f64 / rows as f64;
    if share < input.config.table_skeleton_share {
        debug!(share, rows, shapes = shapes.len(), "row skeletons diverge");
        return Layout::Demote(Strategy::Paragraph);
    }

    Layout::Groups(
        shapes
            .into_iter()
            .map(|(line, _)| GroupLayout {
                name: group_name(line.fields.iter().map(String::as_str)),
                lines: vec![line],
                children: Vec::new(),
            })
            .collect(),
    )
}
