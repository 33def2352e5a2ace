//! Value locator: maps oracle records back onto the sample text.
//!
//! Records are located in oracle order. Within a record every field claims
//! the span it is found at, so no two fields of one record ever share text.
//! When a value occurs more than once the candidate is chosen by, in order:
//!
//! 1. token boundaries (a hit inside a longer word is a last resort),
//! 2. span exclusivity (already claimed text is skipped),
//! 3. row locality (hits at or after the current row cursor first),
//! 4. anchor similarity with the literal text around the field in the
//!    template,
//! 5. leftmost ahead of the cursor, or nearest behind it.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde::Serialize;
use template_bridge_core::{FieldOccurrence, FieldValue, Record, Span, TypeHint};
use tracing::debug;

use crate::config::ConversionConfig;
use crate::engine::{Anchor, TemplateProfile};

/// Sample text with a line index.
#[derive(Debug, Clone)]
pub struct SampleText<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> SampleText<'a> {
    pub fn new(text: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(idx, _)| idx + 1))
            .filter(|start| *start < text.len() || *start == 0)
            .collect();
        Self { text, line_starts }
    }

    pub fn as_str(&self) -> &'a str {
        self.text
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Zero-based line holding byte `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_starts
            .partition_point(|start| *start <= offset)
            .saturating_sub(1)
    }

    /// Byte range of a line, without its terminator.
    pub fn line_span(&self, line: usize) -> Span {
        let start = self.line_starts.get(line).copied().unwrap_or(self.text.len());
        let mut end = self
            .line_starts
            .get(line + 1)
            .map_or(self.text.len(), |next| next - 1);
        if self.text[start..end].ends_with('\n') {
            end -= 1;
        }
        if self.text[start..end].ends_with('\r') {
            end -= 1;
        }
        Span::new(start, end)
    }

    pub fn line(&self, line: usize) -> &'a str {
        let span = self.line_span(line);
        &self.text[span.start..span.end]
    }

    /// Offset where the line after the one holding `offset` begins.
    fn next_line_start(&self, offset: usize) -> usize {
        self.line_starts
            .get(self.line_of(offset) + 1)
            .copied()
            .unwrap_or(self.text.len())
    }
}

/// Why a field has no occurrence in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocateFailureReason {
    /// The oracle value is empty.
    Empty,
    /// The value does not appear in the text.
    NotFound,
    /// Every appearance is already claimed by another field of the record.
    Claimed,
}

impl fmt::Display for LocateFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::NotFound => write!(f, "not_found"),
            Self::Claimed => write!(f, "claimed"),
        }
    }
}

/// A field that could not be located in one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocateFailure {
    pub record: usize,
    pub field: String,
    pub reason: LocateFailureReason,
}

/// One field of a located record.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedField {
    pub name: String,
    pub value: FieldValue,
    pub hint: TypeHint,
    /// One occurrence per located part; empty when the field failed.
    pub occurrences: Vec<FieldOccurrence>,
    /// Spans reused from an earlier record for an unchanged carried value.
    pub inherited: bool,
}

/// An oracle record with its fields mapped to spans.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocatedRecord {
    pub index: usize,
    /// Fields in record order.
    pub fields: Vec<LocatedField>,
    pub failures: Vec<LocateFailure>,
}

impl LocatedRecord {
    pub fn field(&self, name: &str) -> Option<&LocatedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Occurrences located for this record rather than inherited.
    pub fn fresh_occurrences(&self) -> impl Iterator<Item = &FieldOccurrence> {
        self.fields
            .iter()
            .filter(|f| !f.inherited)
            .flat_map(|f| f.occurrences.iter())
    }

    pub fn occurrences(&self) -> impl Iterator<Item = &FieldOccurrence> {
        self.fields.iter().flat_map(|f| f.occurrences.iter())
    }
}

/// Stateful locator walking a sample in record order.
pub struct Locator<'a> {
    sample: &'a SampleText<'a>,
    profile: &'a TemplateProfile,
    window: usize,
    cursor: usize,
    carried: HashMap<String, (FieldValue, Vec<FieldOccurrence>)>,
}

impl<'a> Locator<'a> {
    pub fn new(
        sample: &'a SampleText<'a>,
        profile: &'a TemplateProfile,
        config: &ConversionConfig,
    ) -> Self {
        Self {
            sample,
            profile,
            window: config.anchor_window,
            cursor: 0,
            carried: HashMap::new(),
        }
    }

    /// Locates every field of the next record.
    pub fn locate(&mut self, index: usize, record: &Record) -> LocatedRecord {
        let mut order: Vec<(usize, &str, &FieldValue)> = record
            .iter()
            .enumerate()
            .map(|(pos, (name, value))| (pos, name, value))
            .collect();
        order.sort_by(|a, b| longest_part(b.2).cmp(&longest_part(a.2)).then(a.0.cmp(&b.0)));

        let mut slots: Vec<Option<LocatedField>> = vec![None; order.len()];
        let mut failures = Vec::new();
        let mut claimed: Vec<Span> = Vec::new();
        let mut furthest: Option<usize> = None;

        for (pos, name, value) in order {
            let hint = TypeHint::infer_all(value.parts());
            let mut field = LocatedField {
                name: name.to_string(),
                value: value.clone(),
                hint,
                occurrences: Vec::new(),
                inherited: false,
            };

            if value.is_empty() {
                failures.push(LocateFailure {
                    record: index,
                    field: name.to_string(),
                    reason: LocateFailureReason::Empty,
                });
                slots[pos] = Some(field);
                continue;
            }

            let carry = self.profile.is_carry(name);
            if carry {
                if let Some(occurrences) = self.inherit(name, value, &claimed) {
                    claimed.extend(occurrences.iter().map(|o| o.span));
                    field.occurrences = occurrences;
                    field.inherited = true;
                    slots[pos] = Some(field);
                    continue;
                }
            }

            let mut from = self.cursor;
            let mut last_failure = None;
            for part in value.parts() {
                match self.find(name, part, &claimed, from) {
                    Ok(span) => {
                        claimed.push(span);
                        from = span.end;
                        furthest = Some(furthest.map_or(span.end, |end| end.max(span.end)));
                        field.occurrences.push(FieldOccurrence {
                            field: name.to_string(),
                            value: self.sample.as_str()[span.start..span.end].to_string(),
                            span,
                        });
                    }
                    Err(reason) => last_failure = Some(reason),
                }
            }

            if field.occurrences.is_empty() {
                let reason = last_failure.unwrap_or(LocateFailureReason::NotFound);
                debug!(record = index, field = name, %reason, "value not located");
                failures.push(LocateFailure {
                    record: index,
                    field: name.to_string(),
                    reason,
                });
            } else if carry {
                self.carried
                    .insert(name.to_string(), (value.clone(), field.occurrences.clone()));
            }
            slots[pos] = Some(field);
        }

        if let Some(end) = furthest {
            self.cursor = self.cursor.max(self.sample.next_line_start(end.saturating_sub(1)));
        }

        LocatedRecord {
            index,
            fields: slots.into_iter().flatten().collect(),
            failures,
        }
    }

    fn inherit(&self, name: &str, value: &FieldValue, claimed: &[Span]) -> Option<Vec<FieldOccurrence>> {
        let (previous, occurrences) = self.carried.get(name)?;
        let free = occurrences
            .iter()
            .all(|o| !claimed.iter().any(|c| c.overlaps(&o.span)));
        (previous == value && free).then(|| occurrences.clone())
    }

    /// Picks the best free occurrence of `part`.
    fn find(
        &self,
        field: &str,
        part: &str,
        claimed: &[Span],
        from: usize,
    ) -> Result<Span, LocateFailureReason> {
        let text = self.sample.as_str();
        let mut hits = exact_hits(text, part);
        if hits.is_empty() {
            hits = flexible_hits(text, part);
        }
        if hits.is_empty() {
            return Err(LocateFailureReason::NotFound);
        }

        let bounded: Vec<Span> = hits
            .iter()
            .copied()
            .filter(|span| is_token_bounded(text, *span))
            .collect();
        let candidates = if bounded.is_empty() { hits } else { bounded };

        let free: Vec<Span> = candidates
            .into_iter()
            .filter(|span| !claimed.iter().any(|c| c.overlaps(span)))
            .collect();
        match free.as_slice() {
            [] => return Err(LocateFailureReason::Claimed),
            [only] => return Ok(*only),
            _ => {}
        }

        let anchors = self
            .profile
            .field(field)
            .map_or(&[][..], |f| f.anchors.as_slice());
        let (ahead, behind): (Vec<Span>, Vec<Span>) =
            free.into_iter().partition(|span| span.start >= from);

        // `max_by_key` keeps the last maximum: iterating `ahead` right to left
        // settles ties on the leftmost span, `behind` left to right on the
        // nearest one.
        let best = if ahead.is_empty() {
            behind
                .into_iter()
                .max_by_key(|span| self.anchor_score(*span, anchors))
        } else {
            ahead
                .into_iter()
                .rev()
                .max_by_key(|span| self.anchor_score(*span, anchors))
        };
        best.ok_or(LocateFailureReason::Claimed)
    }

    /// Best anchor agreement for a candidate span.
    fn anchor_score(&self, span: Span, anchors: &[Anchor]) -> usize {
        if anchors.is_empty() {
            return 0;
        }
        let text = self.sample.as_str();
        let left = context(text[..span.start].chars().rev(), self.window);
        let right = context(text[span.end..].chars(), self.window);
        anchors
            .iter()
            .map(|anchor| {
                let before = strip_blanks(anchor.before.chars().rev());
                let after = strip_blanks(anchor.after.chars());
                common_prefix(&left, &before) + common_prefix(&right, &after)
            })
            .max()
            .unwrap_or(0)
    }
}

/// Locates all records of one oracle parse.
pub fn locate_records(
    sample: &SampleText<'_>,
    profile: &TemplateProfile,
    records: &[Record],
    config: &ConversionConfig,
) -> Vec<LocatedRecord> {
    let mut locator = Locator::new(sample, profile, config);
    records
        .iter()
        .enumerate()
        .map(|(index, record)| locator.locate(index, record))
        .collect()
}

fn longest_part(value: &FieldValue) -> usize {
    value.parts().iter().map(|p| p.len()).max().unwrap_or(0)
}

/// Whitespace-stripped context read outward from a span edge.
///
/// Running off either end of the text counts as a line break.
fn context(chars: impl Iterator<Item = char>, limit: usize) -> Vec<char> {
    let mut out: Vec<char> = chars.filter(|c| !is_blank(*c)).take(limit).collect();
    if out.len() < limit {
        out.push('\n');
    }
    out
}

fn strip_blanks(chars: impl Iterator<Item = char>) -> Vec<char> {
    chars.filter(|c| !is_blank(*c)).collect()
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r')
}

fn common_prefix(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn exact_hits(text: &str, needle: &str) -> Vec<Span> {
    let mut hits = Vec::new();
    let mut start = 0;
    while let Some(pos) = text[start..].find(needle) {
        let at = start + pos;
        hits.push(Span::new(at, at + needle.len()));
        start = at + needle.chars().next().map_or(1, char::len_utf8);
    }
    hits
}

/// Hits allowing any run of blanks where the value has whitespace.
fn flexible_hits(text: &str, needle: &str) -> Vec<Span> {
    let words: Vec<String> = needle.split_whitespace().map(regex::escape).collect();
    if words.len() < 2 {
        return Vec::new();
    }
    let Ok(regex) = Regex::new(&words.join(r"[ \t]+")) else {
        return Vec::new();
    };
    regex
        .find_iter(text)
        .map(|m| Span::new(m.start(), m.end()))
        .collect()
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_joiner(c: char) -> bool {
    matches!(c, '.' | ':' | '/' | '-')
}

/// Whether a hit is not glued to surrounding word characters.
///
/// A joiner (`.`, `:`, `/`, `-`) next to the hit only disqualifies it when a
/// word character follows on the far side, as in `10` inside `10.1`.
fn is_token_bounded(text: &str, span: Span) -> bool {
    let value = &text[span.start..span.end];
    let left_ok = match value.chars().next() {
        Some(first) if is_word(first) => {
            let mut before = text[..span.start].chars().rev();
            match before.next() {
                None => true,
                Some(c) if is_word(c) => false,
                Some(c) if is_joiner(c) => !before.next().is_some_and(is_word),
                Some(_) => true,
            }
        }
        _ => true,
    };
    let right_ok = match value.chars().next_back() {
        Some(last) if is_word(last) => {
            let mut after = text[span.end..].chars();
            match after.next() {
                None => true,
                Some(c) if is_word(c) => false,
                Some(c) if is_joiner(c) => !after.next().is_some_and(is_word),
                Some(_) => true,
            }
        }
        _ => true,
    };
    left_ok && right_ok
}
