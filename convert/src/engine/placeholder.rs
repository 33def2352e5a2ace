//! Placeholder template engine (the target format).
//!
//! Templates are literal line patterns with embedded placeholders, grouped
//! into (optionally nested) record-producing groups:
//!
//! ```text
//! <group name="interfaces">
//! interface {{ INTERFACE | carry }}
//! <group name="addresses">
//!  ip address {{ ADDRESS | IP }}
//! </group>
//! </group>
//! ```
//!
//! Literal text is a regex fragment; every whitespace run matches one or
//! more blanks. Each input line is matched against the line patterns in
//! template order and the first match wins. The first placeholder line of a
//! group starts a new record of that group. Lines without placeholders only
//! consume the input lines they match.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use template_bridge_core::{FieldValue, Record, TemplateFormat, TypeHint};

use super::literal::{leading_literal, trailing_literal};
use super::{Anchor, FieldProfile, TemplateEngine, TemplateProfile};
use crate::error::{EngineError, EngineResult};

static GROUP_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^<group(?:\s+name\s*=\s*(?:"([^"]*)"|'([^']*)'))?\s*>$"#)
        .expect("static regex must compile")
});

static FIELD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*$").expect("static regex must compile"));

/// Regex a type marker stands for.
pub fn hint_pattern(hint: TypeHint) -> &'static str {
    match hint {
        TypeHint::Integer => r"[-+]?\d+",
        TypeHint::Decimal => r"[-+]?\d*\.?\d+",
        TypeHint::Ipv4 => r"\d{1,3}(?:\.\d{1,3}){3}",
        TypeHint::Ipv6 => r"[0-9A-Fa-f:.]*:[0-9A-Fa-f:.]*",
        TypeHint::Mac => {
            r"(?:[0-9A-Fa-f]{2}(?:[:-][0-9A-Fa-f]{2}){5}|[0-9A-Fa-f]{4}\.[0-9A-Fa-f]{4}\.[0-9A-Fa-f]{4})"
        }
        TypeHint::Hex => r"(?:0[xX])?[0-9A-Fa-f]+",
        TypeHint::Word => r"\S+",
        TypeHint::Phrase => r"\S+(?: \S+)*",
    }
}

/// One `{{ NAME | modifier | ... }}` marker.
///
/// # Examples
///
/// ```
/// use template_bridge_convert::engine::placeholder::Placeholder;
/// use template_bridge_core::TypeHint;
///
/// let mut placeholder = Placeholder::new("MTU");
/// placeholder.hint = Some(TypeHint::Integer);
/// placeholder.carry = true;
/// assert_eq!(placeholder.to_string(), "{{ MTU | DIGIT | carry }}");
/// assert_eq!(Placeholder::parse("MTU | DIGIT | carry", 1).unwrap(), placeholder);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub hint: Option<TypeHint>,
    /// Explicit regex; takes precedence over the hint when matching.
    pub pattern: Option<String>,
    pub carry: bool,
    pub list: bool,
    /// Declares the field without matching anything.
    pub unanchored: bool,
}

impl Placeholder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parses the text between `{{` and `}}`.
    pub fn parse(content: &str, line: usize) -> EngineResult<Self> {
        let mut tokens = split_outside_quotes(content, '|').into_iter().map(str::trim);
        let name = tokens.next().unwrap_or_default();
        if !FIELD_NAME.is_match(name) {
            return Err(EngineError::syntax(
                line,
                format!("invalid placeholder name '{name}'"),
            ));
        }

        let mut placeholder = Self::new(name);
        for token in tokens {
            match token {
                "carry" => placeholder.carry = true,
                "list" => placeholder.list = true,
                "unanchored" => placeholder.unanchored = true,
                _ if token.starts_with("re(") && token.ends_with(')') => {
                    let quoted = token[3..token.len() - 1].trim();
                    let inner = quoted
                        .strip_prefix('"')
                        .and_then(|q| q.strip_suffix('"'))
                        .ok_or_else(|| {
                            EngineError::syntax(line, format!("re() needs a quoted pattern: {token}"))
                        })?;
                    placeholder.pattern = Some(inner.replace("\\\"", "\""));
                }
                _ => match TypeHint::from_marker(token) {
                    Some(hint) => placeholder.hint = Some(hint),
                    None => {
                        return Err(EngineError::syntax(
                            line,
                            format!("unknown modifier '{token}' on '{name}'"),
                        ));
                    }
                },
            }
        }
        Ok(placeholder)
    }

    /// Regex this placeholder matches.
    pub fn matcher(&self) -> String {
        match &self.pattern {
            Some(pattern) => format!("(?:{pattern})"),
            None => hint_pattern(self.hint.unwrap_or(TypeHint::Word)).to_string(),
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{{ {}", self.name)?;
        if let Some(marker) = self.hint.and_then(|h| h.marker()) {
            write!(f, " | {marker}")?;
        }
        if let Some(pattern) = &self.pattern {
            write!(f, " | re(\"{}\")", escape_quotes(pattern))?;
        }
        if self.carry {
            f.write_str(" | carry")?;
        }
        if self.list {
            f.write_str(" | list")?;
        }
        if self.unanchored {
            f.write_str(" | unanchored")?;
        }
        f.write_str(" }}")
    }
}

fn escape_quotes(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut escaped = false;
    for c in pattern.chars() {
        if c == '"' && !escaped {
            out.push('\\');
        }
        escaped = c == '\\' && !escaped;
        out.push(c);
    }
    out
}

/// Splits on `sep` except inside double quotes (backslash escapes honoured).
fn split_outside_quotes(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (idx, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                parts.push(&text[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// Splits a line into literal text and placeholder contents.
fn segments(text: &str, line: usize) -> EngineResult<Vec<Segment<'_>>> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("{{") {
        if open > 0 {
            out.push(Segment::Literal(&rest[..open]));
        }
        let body = &rest[open + 2..];
        let close = find_close(body).ok_or_else(|| EngineError::syntax(line, "unterminated '{{'"))?;
        out.push(Segment::Placeholder(&body[..close]));
        rest = &body[close + 2..];
    }
    if !rest.is_empty() {
        out.push(Segment::Literal(rest));
    }
    Ok(out)
}

fn find_close(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut in_quotes = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_quotes => i += 1,
            b'"' => in_quotes = !in_quotes,
            b'}' if !in_quotes && bytes.get(i + 1) == Some(&b'}') => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Literal regex fragment with each whitespace run matching any blank run.
fn literal_regex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c == ' ' || c == '\t' {
            if !in_space {
                out.push_str("[ \\t]+");
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

#[derive(Debug, Clone)]
struct Group {
    name: String,
    /// Indices of this group and all its ancestors.
    lineage: Vec<usize>,
}

#[derive(Debug, Clone)]
struct LinePattern {
    regex: Regex,
    group: usize,
    /// First line of its group.
    start: bool,
    /// Capture group name and field index.
    slots: Vec<(String, usize)>,
}

#[derive(Debug, Clone)]
struct FieldDecl {
    profile: FieldProfile,
    hint: Option<TypeHint>,
}

/// A compiled placeholder template.
#[derive(Debug, Clone)]
pub struct PlaceholderTemplate {
    fields: Vec<FieldDecl>,
    groups: Vec<Group>,
    lines: Vec<LinePattern>,
}

impl PlaceholderTemplate {
    /// Compiles a template body.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] for unbalanced group tags, malformed
    /// placeholders, unknown modifiers, invalid line regexes, or a template
    /// without any field.
    pub fn parse(body: &str) -> EngineResult<Self> {
        let mut template = Self {
            fields: Vec::new(),
            groups: vec![Group {
                name: String::new(),
                lineage: vec![0],
            }],
            lines: Vec::new(),
        };
        let mut stack = vec![0usize];
        let mut in_comment = false;
        let mut last_line = 0;

        for (idx, raw) in body.lines().enumerate() {
            let line = idx + 1;
            last_line = line;
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if in_comment {
                in_comment = !trimmed.contains("-->");
                continue;
            }
            if trimmed.starts_with("<!--") {
                in_comment = !trimmed.contains("-->");
                continue;
            }
            if let Some(caps) = GROUP_OPEN.captures(trimmed) {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map_or("", |m| m.as_str())
                    .to_string();
                let parent = stack.last().copied().unwrap_or(0);
                let mut lineage = template.groups[parent].lineage.clone();
                let id = template.groups.len();
                lineage.push(id);
                template.groups.push(Group { name, lineage });
                stack.push(id);
                continue;
            }
            if trimmed == "</group>" {
                if stack.len() == 1 {
                    return Err(EngineError::syntax(line, "unbalanced </group>"));
                }
                stack.pop();
                continue;
            }
            if trimmed.starts_with("<group") || trimmed.starts_with("</") {
                return Err(EngineError::syntax(line, format!("malformed tag '{trimmed}'")));
            }

            let group = stack.last().copied().unwrap_or(0);
            template.add_line(raw, line, group)?;
        }

        if stack.len() > 1 {
            return Err(EngineError::syntax(last_line, "unclosed <group>"));
        }
        if template.fields.is_empty() {
            return Err(EngineError::NoFields);
        }
        Ok(template)
    }

    fn add_line(&mut self, raw: &str, line: usize, group: usize) -> EngineResult<()> {
        let indented = raw.starts_with([' ', '\t']);
        let parts = segments(raw.trim(), line)?;

        let placeholders = parts
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(content) => Some(Placeholder::parse(content, line)),
                Segment::Literal(_) => None,
            })
            .collect::<EngineResult<Vec<_>>>()?;

        if placeholders.iter().any(|p| p.unanchored) {
            if parts.len() != 1 {
                return Err(EngineError::syntax(
                    line,
                    "an unanchored placeholder must be alone on its line",
                ));
            }
            self.declare(&placeholders[0]);
            return Ok(());
        }

        let mut pattern = String::from("^");
        let mut anchor_source = String::from("^");
        if indented {
            pattern.push_str("[ \\t]+");
            anchor_source.push(' ');
        }

        let mut slots = Vec::new();
        let mut positions = Vec::new();
        let mut placeholders = placeholders.into_iter();
        for part in &parts {
            match part {
                Segment::Literal(text) => {
                    pattern.push_str(&literal_regex(text));
                    anchor_source.push_str(text);
                }
                Segment::Placeholder(_) => {
                    let Some(placeholder) = placeholders.next() else {
                        continue;
                    };
                    let slot = format!("p{}", slots.len());
                    pattern.push_str(&format!("(?P<{slot}>{})", placeholder.matcher()));
                    let start = anchor_source.len();
                    anchor_source.push_str("(x)");
                    positions.push((start, anchor_source.len()));
                    let field = self.declare(&placeholder);
                    slots.push((slot, field));
                }
            }
        }
        pattern.push_str("[ \\t]*$");
        anchor_source.push('$');

        let regex = Regex::new(&pattern).map_err(|err| EngineError::regex(line, err))?;

        for ((_, field), (start, end)) in slots.iter().zip(&positions) {
            let anchor = Anchor {
                before: trailing_literal(&anchor_source[..*start]),
                after: leading_literal(&anchor_source[*end..]),
            };
            let anchors = &mut self.fields[*field].profile.anchors;
            if !anchors.contains(&anchor) {
                anchors.push(anchor);
            }
        }

        let start = !slots.is_empty()
            && !self
                .lines
                .iter()
                .any(|l| l.group == group && !l.slots.is_empty());
        self.lines.push(LinePattern {
            regex,
            group,
            start,
            slots,
        });
        Ok(())
    }

    /// Registers a field, merging modifiers with earlier declarations.
    fn declare(&mut self, placeholder: &Placeholder) -> usize {
        let idx = match self
            .fields
            .iter()
            .position(|f| f.profile.name == placeholder.name)
        {
            Some(idx) => idx,
            None => {
                self.fields.push(FieldDecl {
                    profile: FieldProfile::new(&placeholder.name),
                    hint: None,
                });
                self.fields.len() - 1
            }
        };
        let field = &mut self.fields[idx];
        field.profile.carry |= placeholder.carry;
        field.profile.list |= placeholder.list;
        if field.profile.pattern.is_none() {
            field.profile.pattern = placeholder.pattern.clone();
        }
        if field.hint.is_none() {
            field.hint = placeholder.hint;
        }
        idx
    }

    /// Names of the groups, outermost first, excluding the implicit root.
    pub fn group_names(&self) -> Vec<&str> {
        self.groups[1..].iter().map(|g| g.name.as_str()).collect()
    }

    /// Declared type hint of a field, if any placeholder carried one.
    pub fn hint(&self, field: &str) -> Option<TypeHint> {
        self.fields
            .iter()
            .find(|f| f.profile.name == field)
            .and_then(|f| f.hint)
    }

    /// Whether the first pattern matching `line` captures any field.
    pub fn captures_fields(&self, line: &str) -> bool {
        self.lines
            .iter()
            .find(|p| p.regex.is_match(line))
            .is_some_and(|p| !p.slots.is_empty())
    }

    /// Matches `text` line by line and returns the emitted records.
    pub fn run(&self, text: &str) -> Vec<Record> {
        let mut run = Run::new(self);
        for line in text.lines() {
            let Some((pattern, caps)) = self
                .lines
                .iter()
                .find_map(|p| p.regex.captures(line).map(|caps| (p, caps)))
            else {
                continue;
            };
            if pattern.start && run.pending_in(pattern.group) {
                run.emit();
            }
            for (slot, field) in &pattern.slots {
                if let Some(m) = caps.name(slot) {
                    run.assign(*field, m.as_str(), pattern.group);
                }
            }
        }
        if run.has_pending() {
            run.emit();
        }
        run.records
    }

    pub fn profile(&self) -> TemplateProfile {
        TemplateProfile {
            fields: self.fields.iter().map(|f| f.profile.clone()).collect(),
        }
    }
}

/// Record-in-progress state for one [`PlaceholderTemplate::run`].
struct Run<'t> {
    template: &'t PlaceholderTemplate,
    /// Current value and the group of the line that set it.
    values: Vec<Option<(FieldValue, usize)>>,
    records: Vec<Record>,
}

impl<'t> Run<'t> {
    fn new(template: &'t PlaceholderTemplate) -> Self {
        Self {
            template,
            values: vec![None; template.fields.len()],
            records: Vec::new(),
        }
    }

    fn assign(&mut self, field: usize, text: &str, group: usize) {
        let decl = &self.template.fields[field];
        let slot = &mut self.values[field];
        if decl.profile.list {
            match slot {
                Some((FieldValue::List(items), setter)) => {
                    items.push(text.to_string());
                    *setter = group;
                }
                _ => *slot = Some((FieldValue::List(vec![text.to_string()]), group)),
            }
        } else {
            *slot = Some((FieldValue::Scalar(text.to_string()), group));
        }
    }

    fn is_fresh(&self, field: usize) -> bool {
        !self.template.fields[field].profile.carry && self.values[field].is_some()
    }

    fn has_pending(&self) -> bool {
        (0..self.values.len()).any(|f| self.is_fresh(f))
    }

    /// Whether a non-carry value was set by a group other than a strict
    /// ancestor of `group`. Values from ancestors belong to the record
    /// `group` is about to fill.
    fn pending_in(&self, group: usize) -> bool {
        let lineage = &self.template.groups[group].lineage;
        let ancestors = &lineage[..lineage.len() - 1];
        self.values.iter().enumerate().any(|(field, value)| {
            self.is_fresh(field)
                && value
                    .as_ref()
                    .is_some_and(|(_, setter)| !ancestors.contains(setter))
        })
    }

    fn emit(&mut self) {
        let record = self
            .template
            .fields
            .iter()
            .zip(&self.values)
            .map(|(decl, value)| {
                let value = match value {
                    Some((value, _)) => value.clone(),
                    None if decl.profile.list => FieldValue::List(Vec::new()),
                    None => FieldValue::default(),
                };
                (decl.profile.name.clone(), value)
            })
            .collect();
        self.records.push(record);

        for (decl, value) in self.template.fields.iter().zip(self.values.iter_mut()) {
            if !decl.profile.carry {
                *value = None;
            }
        }
    }
}

/// Engine adapter for placeholder templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderEngine;

impl TemplateEngine for PlaceholderEngine {
    fn format(&self) -> TemplateFormat {
        TemplateFormat::Target
    }

    fn parse(&self, body: &str, text: &str) -> EngineResult<Vec<Record>> {
        Ok(PlaceholderTemplate::parse(body)?.run(text))
    }

    fn profile(&self, body: &str) -> EngineResult<TemplateProfile> {
        Ok(PlaceholderTemplate::parse(body)?.profile())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(body: &str, text: &str) -> Vec<Record> {
        PlaceholderTemplate::parse(body).unwrap().run(text)
    }

    fn scalar<'a>(record: &'a Record, name: &str) -> &'a str {
        record.get(name).and_then(FieldValue::as_scalar).unwrap()
    }

    #[test]
    fn test_single_line_paragraph() {
        let records = run("Version: {{ VERSION }}", "Cisco IOS\nVersion: 15.2\n");
        assert_eq!(records.len(), 1);
        assert_eq!(scalar(&records[0], "VERSION"), "15.2");
    }

    #[test]
    fn test_table_rows_emit_per_line() {
        let body = "<group name=\"rows\">\n{{ NAME }} {{ MTU | DIGIT }}\n</group>";
        let records = run(body, "Name  MTU\neth0  1500\neth1  9000\n");
        assert_eq!(records.len(), 2);
        assert_eq!(scalar(&records[0], "NAME"), "eth0");
        assert_eq!(scalar(&records[1], "MTU"), "9000");
    }

    #[test]
    fn test_nested_groups_with_carry() {
        let body = "\
<group name=\"interfaces\">
interface {{ IFACE | carry }}
<group name=\"addresses\">
 ip {{ ADDR | IP }}
</group>
</group>";
        let text = "interface eth0\n  ip 10.0.0.1\n  ip 10.0.0.2\ninterface eth1\n  ip 10.1.0.1\n";
        let records = run(body, text);
        assert_eq!(records.len(), 3);
        assert_eq!(scalar(&records[1], "IFACE"), "eth0");
        assert_eq!(scalar(&records[1], "ADDR"), "10.0.0.2");
        assert_eq!(scalar(&records[2], "IFACE"), "eth1");
    }

    #[test]
    fn test_header_value_stays_with_first_detail_row() {
        let body = "\
<group>
interface {{ IFACE | carry }} is {{ STATUS }}
<group>
 ip {{ ADDR }}
</group>
</group>";
        let text = "interface eth0 is up\n ip a\n ip b\n";
        let records = run(body, text);
        assert_eq!(records.len(), 2);
        assert_eq!(scalar(&records[0], "STATUS"), "up");
        assert_eq!(scalar(&records[0], "ADDR"), "a");
        assert_eq!(scalar(&records[1], "STATUS"), "");
    }

    #[test]
    fn test_literal_line_consumes_without_starting_a_record() {
        let body = "Interface Status\n<group name=\"rows\">\n{{ IFACE }} {{ STATUS }}\n</group>";
        let template = PlaceholderTemplate::parse(body).unwrap();
        assert!(!template.captures_fields("Interface  Status"));
        assert!(template.captures_fields("Gi0/1 up"));
        let records = template.run("Interface  Status\nGi0/1 up\nGi0/2 down\n");
        assert_eq!(records.len(), 2);
        assert_eq!(scalar(&records[0], "IFACE"), "Gi0/1");
        assert_eq!(scalar(&records[1], "STATUS"), "down");
    }

    #[test]
    fn test_sibling_group_start_closes_the_open_record() {
        let body = "\
<group name=\"full\">
{{ NAME }} {{ STATE }} {{ MTU | DIGIT }}
</group>
<group name=\"short\">
{{ NAME }} {{ STATE }}
</group>";
        let records = run(body, "eth0 up 1500\neth1 down\neth2 up 9000\n");
        assert_eq!(records.len(), 3);
        assert_eq!(scalar(&records[0], "NAME"), "eth0");
        assert_eq!(scalar(&records[1], "NAME"), "eth1");
        assert_eq!(scalar(&records[1], "MTU"), "");
        assert_eq!(scalar(&records[2], "MTU"), "9000");
    }

    #[test]
    fn test_indented_line_requires_indent() {
        let records = run(" ip {{ ADDR }}", "ip 1.1.1.1\n  ip 2.2.2.2\n");
        assert_eq!(records.len(), 1);
        assert_eq!(scalar(&records[0], "ADDR"), "2.2.2.2");
    }

    #[test]
    fn test_list_modifier_accumulates() {
        let body = "name {{ NAME }}\n member {{ MEMBER | list }}";
        let records = run(body, "name a\n member x\n member y\nname b\n member z\n");
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].get("MEMBER"),
            Some(&FieldValue::List(vec!["x".into(), "y".into()]))
        );
    }

    #[test]
    fn test_unanchored_field_is_declared_but_empty() {
        let body = "Version: {{ VERSION }}\n{{ SERIAL | unanchored }}";
        let records = run(body, "Version: 1\n");
        assert_eq!(records[0].field_names(), vec!["VERSION", "SERIAL"]);
        assert_eq!(scalar(&records[0], "SERIAL"), "");
    }

    #[test]
    fn test_re_modifier_with_alternation_and_quotes() {
        let body = r#"state {{ STATE | re("up|down") }} tag {{ TAG | re("\"[a-z]+\"") }}"#;
        let records = run(body, "state up tag \"blue\"\nstate sideways tag \"x\"\n");
        assert_eq!(records.len(), 1);
        assert_eq!(scalar(&records[0], "TAG"), "\"blue\"");
    }

    #[test]
    fn test_placeholder_display_round_trip() {
        let mut placeholder = Placeholder::new("DESC");
        placeholder.hint = Some(TypeHint::Phrase);
        placeholder.pattern = Some(r#"say "hi"|\d{2}"#.to_string());
        placeholder.list = true;
        let text = placeholder.to_string();
        let content = text.trim_start_matches("{{").trim_end_matches("}}");
        assert_eq!(Placeholder::parse(content, 1).unwrap(), placeholder);
    }

    #[test]
    fn test_comments_are_skipped() {
        let body = "<!-- generated -->\n<!--\nmulti\n-->\nv {{ V }}";
        assert_eq!(run(body, "v 1").len(), 1);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            PlaceholderTemplate::parse("</group>"),
            Err(EngineError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            PlaceholderTemplate::parse("<group>\nv {{ V }}"),
            Err(EngineError::Syntax { .. })
        ));
        assert!(matches!(
            PlaceholderTemplate::parse("v {{ V | BOGUS }}"),
            Err(EngineError::Syntax { .. })
        ));
        assert!(matches!(
            PlaceholderTemplate::parse("v {{ V"),
            Err(EngineError::Syntax { .. })
        ));
        assert!(matches!(
            PlaceholderTemplate::parse("x {{ V | unanchored }}"),
            Err(EngineError::Syntax { .. })
        ));
        assert!(matches!(
            PlaceholderTemplate::parse("no placeholders"),
            Err(EngineError::NoFields)
        ));
        assert!(matches!(
            PlaceholderTemplate::parse("v {{ V | re(\"(\") }}"),
            Err(EngineError::Regex { .. })
        ));
    }

    #[test]
    fn test_profile_anchors_and_flags() {
        let template = PlaceholderTemplate::parse("interface {{ IFACE | carry }}\n mtu {{ MTU | DIGIT }}").unwrap();
        let profile = template.profile();
        assert!(profile.is_carry("IFACE"));
        assert_eq!(profile.field("IFACE").unwrap().anchors[0].before, "\ninterface ");
        assert_eq!(profile.field("MTU").unwrap().anchors[0].before, "\n mtu ");
        assert_eq!(profile.field("MTU").unwrap().anchors[0].after, "\n");
        assert_eq!(template.hint("MTU"), Some(TypeHint::Integer));
    }
}
