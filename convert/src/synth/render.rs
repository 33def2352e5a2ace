//! Turning sample lines into placeholder line patterns.

use std::collections::BTreeMap;

use template_bridge_core::{FieldOccurrence, TypeHint};

use crate::engine::TemplateProfile;
use crate::engine::placeholder::Placeholder;
use crate::locate::{LocatedRecord, SampleText};

/// Phrase pattern tolerating blank runs inside the value.
const LOOSE_PHRASE: &str = r"\S+(?:[ \t]+\S+)*";

/// How each field is written as a placeholder, fixed for a whole template.
#[derive(Debug, Clone, Default)]
pub(crate) struct FieldStyles {
    styles: BTreeMap<String, Placeholder>,
}

impl FieldStyles {
    /// Widens hints over every located value and merges template modifiers.
    pub(crate) fn new(profile: &TemplateProfile, located: &[LocatedRecord]) -> Self {
        let mut styles: BTreeMap<String, Placeholder> = BTreeMap::new();
        let mut loose: Vec<String> = Vec::new();

        for field in located.iter().flat_map(|r| r.fields.iter()) {
            if field.value.is_empty() {
                continue;
            }
            let style = styles
                .entry(field.name.clone())
                .or_insert_with(|| Placeholder::new(&field.name));
            style.hint = Some(style.hint.map_or(field.hint, |h| h.widen(field.hint)));
            style.list |= field.value.is_list();
            if field
                .occurrences
                .iter()
                .any(|o| o.value.contains("  ") || o.value.contains('\t'))
            {
                loose.push(field.name.clone());
            }
        }

        for (name, style) in styles.iter_mut() {
            if let Some(field) = profile.field(name) {
                style.carry = field.carry;
                style.list |= field.list;
                style.pattern = field.pattern.clone();
            }
            if style.hint == Some(TypeHint::Word) {
                style.hint = None;
            }
            if style.pattern.is_none()
                && style.hint == Some(TypeHint::Phrase)
                && loose.contains(name)
            {
                style.pattern = Some(LOOSE_PHRASE.to_string());
            }
        }

        Self { styles }
    }

    /// Placeholder text for a field; `typed` adds hints and modifiers.
    pub(crate) fn placeholder(&self, field: &str, typed: bool) -> String {
        match self.styles.get(field) {
            Some(style) if typed => style.to_string(),
            _ => Placeholder::new(field).to_string(),
        }
    }
}

/// One rendered sample line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RenderedLine {
    /// Zero-based sample line it was rendered from.
    pub line: usize,
    /// Target-format line with typed placeholders.
    pub pattern: String,
    /// Same line with bare placeholders, used to compare row shapes.
    pub skeleton: String,
    /// Fields placed on the line, left to right.
    pub fields: Vec<String>,
}

/// Renders one sample line, replacing the given occurrences with placeholders.
///
/// Occurrences outside the line, or overlapping an earlier one, are ignored.
pub(crate) fn render_line(
    sample: &SampleText<'_>,
    line: usize,
    occurrences: &[&FieldOccurrence],
    styles: &FieldStyles,
) -> RenderedLine {
    let bounds = sample.line_span(line);
    let text = sample.as_str();

    let mut placed: Vec<&FieldOccurrence> = occurrences
        .iter()
        .copied()
        .filter(|o| o.span.start >= bounds.start && o.span.end <= bounds.end && !o.span.is_empty())
        .collect();
    placed.sort_by_key(|o| (o.span.start, o.span.end));

    let mut pattern = String::new();
    let mut skeleton = String::new();
    let mut fields = Vec::new();
    let mut pos = bounds.start;
    for occurrence in placed {
        if occurrence.span.start < pos {
            continue;
        }
        let literal = escape_literal(&text[pos..occurrence.span.start]);
        pattern.push_str(&literal);
        skeleton.push_str(&literal);
        pattern.push_str(&styles.placeholder(&occurrence.field, true));
        skeleton.push_str(&styles.placeholder(&occurrence.field, false));
        fields.push(occurrence.field.clone());
        pos = occurrence.span.end;
    }
    let literal = escape_literal(&text[pos..bounds.end]);
    pattern.push_str(&literal);
    skeleton.push_str(&literal);

    let indented = text[bounds.start..bounds.end].starts_with([' ', '\t']);
    RenderedLine {
        line,
        pattern: finish_line(&pattern, indented),
        skeleton: finish_line(&skeleton, indented),
        fields,
    }
}

/// Regex-escapes literal text and collapses each whitespace run to a space.
pub(crate) fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word = String::new();
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            flush_word(&mut out, &mut word);
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            word.push(c);
            in_space = false;
        }
    }
    flush_word(&mut out, &mut word);
    out
}

fn flush_word(out: &mut String, word: &mut String) {
    if word.is_empty() {
        return;
    }
    // Braces are spelled as hex escapes so they never form `{{` or `}}`.
    let escaped = regex::escape(word)
        .replace("\\{", "\\x7B")
        .replace("\\}", "\\x7D");
    out.push_str(&escaped);
    word.clear();
}

/// Trims a rendered line, keeping one leading space for indentation.
fn finish_line(content: &str, indented: bool) -> String {
    let content = content.trim();
    let content = match content.strip_prefix('<') {
        Some(rest) => format!("\\x3C{rest}"),
        None => content.to_string(),
    };
    if indented && !content.is_empty() {
        format!(" {content}")
    } else {
        content
    }
}

/// Group name derived from the fields it holds.
pub(crate) fn group_name<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    let mut names: Vec<String> = fields.into_iter().map(str::to_lowercase).collect();
    names.sort();
    names.dedup();
    names.truncate(4);
    if names.is_empty() {
        "record".to_string()
    } else {
        names.join("_")
    }
}
