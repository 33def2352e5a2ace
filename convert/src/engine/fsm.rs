//! State-machine template engine (the source format).
//!
//! A template declares its fields with `Value` lines, then one or more
//! states made of `^regex -> Action` rules:
//!
//! ```text
//! Value Filldown INTERFACE (\S+)
//! Value Required ADDRESS (\d+\.\d+\.\d+\.\d+)
//!
//! Start
//!   ^interface ${INTERFACE}
//!   ^\s+ip address ${ADDRESS} -> Record
//! ```
//!
//! A body without any `Value` line is read as a list of `Start` rules with
//! inline `(?P<NAME>...)` groups; the last rule records.

use std::sync::LazyLock;

use regex::Regex;
use template_bridge_core::{FieldValue, Record, TemplateFormat};
use tracing::debug;

use super::literal::{
    embeddable_pattern, leading_literal, named_groups, single_group_inner, trailing_literal,
};
use super::{Anchor, FieldProfile, TemplateEngine, TemplateProfile};
use crate::error::{EngineError, EngineResult};

static VALUE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Value\s+(?:([A-Za-z]+(?:,[A-Za-z]+)*)\s+)?(\w+)\s+(\(.*\))\s*$")
        .expect("static regex must compile")
});

static STATE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)$").expect("static regex must compile"));

static RULE_WITH_ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)\s+->\s*(.*)$").expect("static regex must compile"));

const START_STATE: &str = "Start";
const END_STATE: &str = "End";
const EOF_STATE: &str = "EOF";

/// Options attached to a `Value` declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValueOptions {
    pub filldown: bool,
    pub fillup: bool,
    pub required: bool,
    pub list: bool,
    pub key: bool,
}

impl ValueOptions {
    fn parse(list: &str, line: usize) -> EngineResult<Self> {
        let mut options = Self::default();
        for option in list.split(',') {
            match option {
                "Filldown" => options.filldown = true,
                "Fillup" => options.fillup = true,
                "Required" => options.required = true,
                "List" => options.list = true,
                "Key" => options.key = true,
                other => {
                    return Err(EngineError::syntax(
                        line,
                        format!("unknown value option '{other}'"),
                    ));
                }
            }
        }
        Ok(options)
    }
}

/// A declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueDef {
    pub name: String,
    pub options: ValueOptions,
    /// Declared regex including its outer parentheses.
    pub regex: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineOp {
    #[default]
    Next,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordOp {
    #[default]
    NoRecord,
    Record,
    Clear,
    Clearall,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Transition {
        line_op: LineOp,
        record_op: RecordOp,
        new_state: Option<String>,
    },
    Error(String),
}

impl Default for Action {
    fn default() -> Self {
        Self::Transition {
            line_op: LineOp::Next,
            record_op: RecordOp::NoRecord,
            new_state: None,
        }
    }
}

impl Action {
    fn parse(text: &str, line: usize) -> EngineResult<Self> {
        let mut tokens = text.split_whitespace();
        let Some(first) = tokens.next() else {
            return Ok(Self::default());
        };

        if first == "Error" {
            let message = tokens.collect::<Vec<_>>().join(" ");
            return Ok(Self::Error(message.trim_matches('"').to_string()));
        }

        let (line_op, record_op, mut new_state) = match first.split_once('.') {
            Some((line_part, record_part)) => (
                parse_line_op(line_part)
                    .ok_or_else(|| EngineError::syntax(line, format!("unknown line op '{line_part}'")))?,
                parse_record_op(record_part).ok_or_else(|| {
                    EngineError::syntax(line, format!("unknown record op '{record_part}'"))
                })?,
                None,
            ),
            None => match (parse_line_op(first), parse_record_op(first)) {
                (Some(line_op), _) => (line_op, RecordOp::NoRecord, None),
                (None, Some(record_op)) => (LineOp::Next, record_op, None),
                (None, None) => (LineOp::Next, RecordOp::NoRecord, Some(first.to_string())),
            },
        };

        if new_state.is_none() {
            new_state = tokens.next().map(str::to_string);
        }
        if let Some(extra) = tokens.next() {
            return Err(EngineError::syntax(
                line,
                format!("unexpected token '{extra}' in action"),
            ));
        }
        if let Some(state) = &new_state {
            if !STATE_LINE.is_match(state) {
                return Err(EngineError::syntax(line, format!("invalid state name '{state}'")));
            }
            if line_op == LineOp::Continue {
                return Err(EngineError::syntax(
                    line,
                    "Continue cannot be combined with a state change",
                ));
            }
        }

        Ok(Self::Transition {
            line_op,
            record_op,
            new_state,
        })
    }
}

fn parse_line_op(token: &str) -> Option<LineOp> {
    match token {
        "Next" => Some(LineOp::Next),
        "Continue" => Some(LineOp::Continue),
        _ => None,
    }
}

fn parse_record_op(token: &str) -> Option<RecordOp> {
    match token {
        "NoRecord" => Some(RecordOp::NoRecord),
        "Record" => Some(RecordOp::Record),
        "Clear" => Some(RecordOp::Clear),
        "Clearall" => Some(RecordOp::Clearall),
        _ => None,
    }
}

/// Where a field's group sits inside an expanded rule pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldRef {
    name: String,
    start: usize,
    end: usize,
}

/// One compiled `^regex -> Action` line.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Pattern after `${NAME}` expansion.
    pub pattern: String,
    pub action: Action,
    pub line: usize,
    regex: Regex,
    refs: Vec<FieldRef>,
    /// Capture group name and value index for every group that assigns a field.
    assigns: Vec<(String, usize)>,
}

impl Rule {
    fn compile(
        pattern: String,
        refs: Vec<FieldRef>,
        action: Action,
        line: usize,
        values: &[ValueDef],
    ) -> EngineResult<Self> {
        let regex = Regex::new(&pattern).map_err(|err| EngineError::regex(line, err))?;
        let assigns = regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                values
                    .iter()
                    .position(|v| v.name == name)
                    .map(|idx| (name.to_string(), idx))
            })
            .collect();
        Ok(Self {
            pattern,
            action,
            line,
            regex,
            refs,
            assigns,
        })
    }
}

#[derive(Debug, Clone)]
pub struct State {
    pub name: String,
    pub rules: Vec<Rule>,
}

/// A compiled state-machine template.
#[derive(Debug, Clone)]
pub struct StateMachineTemplate {
    pub values: Vec<ValueDef>,
    pub states: Vec<State>,
}

impl StateMachineTemplate {
    /// Compiles a template body.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] for unknown options, rules outside a state,
    /// undefined state transitions, references to undeclared values, invalid
    /// regexes, or a missing `Start` state.
    pub fn parse(body: &str) -> EngineResult<Self> {
        let declares_values = body
            .lines()
            .any(|line| line.trim_start().starts_with("Value "));
        let template = if declares_values {
            Self::parse_declared(body)?
        } else {
            Self::parse_inline(body)?
        };
        template.check_transitions()?;
        Ok(template)
    }

    fn parse_declared(body: &str) -> EngineResult<Self> {
        let mut values: Vec<ValueDef> = Vec::new();
        let mut states: Vec<State> = Vec::new();

        for (idx, raw) in body.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if states.is_empty() && trimmed.starts_with("Value ") {
                let value = parse_value(trimmed, line)?;
                if values.iter().any(|v| v.name == value.name) {
                    return Err(EngineError::syntax(
                        line,
                        format!("duplicate value '{}'", value.name),
                    ));
                }
                values.push(value);
                continue;
            }

            if !raw.starts_with(char::is_whitespace) {
                if !STATE_LINE.is_match(trimmed) {
                    return Err(EngineError::syntax(
                        line,
                        format!("expected a state name, found '{trimmed}'"),
                    ));
                }
                if states.iter().any(|s| s.name == trimmed) {
                    return Err(EngineError::syntax(line, format!("duplicate state '{trimmed}'")));
                }
                states.push(State {
                    name: trimmed.to_string(),
                    rules: Vec::new(),
                });
                continue;
            }

            let Some(state) = states.last_mut() else {
                return Err(EngineError::syntax(line, "rule outside of a state"));
            };
            state.rules.push(parse_rule(trimmed, line, &values)?);
        }

        if values.is_empty() {
            return Err(EngineError::NoFields);
        }
        if !states.iter().any(|s| s.name == START_STATE) {
            return Err(EngineError::MissingStart);
        }
        Ok(Self { values, states })
    }

    fn parse_inline(body: &str) -> EngineResult<Self> {
        let lines: Vec<(usize, &str)> = body
            .lines()
            .enumerate()
            .map(|(idx, raw)| (idx + 1, raw.trim_end()))
            .filter(|(_, raw)| !raw.trim().is_empty() && !raw.trim_start().starts_with('#'))
            .collect();

        let mut values: Vec<ValueDef> = Vec::new();
        let mut pending = Vec::new();
        for (line, raw) in &lines {
            let pattern = if raw.starts_with('^') {
                raw.to_string()
            } else {
                format!("^{raw}")
            };
            let groups = named_groups(&pattern);
            for group in &groups {
                if !values.iter().any(|v| v.name == group.name) {
                    values.push(ValueDef {
                        name: group.name.clone(),
                        options: ValueOptions::default(),
                        regex: format!("({})", group.inner),
                    });
                }
            }
            let refs = groups
                .into_iter()
                .map(|g| FieldRef {
                    name: g.name,
                    start: g.start,
                    end: g.end,
                })
                .collect();
            pending.push((*line, pattern, refs));
        }

        if values.is_empty() {
            return Err(EngineError::NoFields);
        }

        let last = pending.len().saturating_sub(1);
        let mut rules = Vec::with_capacity(pending.len());
        for (idx, (line, pattern, refs)) in pending.into_iter().enumerate() {
            let action = if idx == last {
                Action::Transition {
                    line_op: LineOp::Next,
                    record_op: RecordOp::Record,
                    new_state: None,
                }
            } else {
                Action::default()
            };
            rules.push(Rule::compile(pattern, refs, action, line, &values)?);
        }

        Ok(Self {
            values,
            states: vec![State {
                name: START_STATE.to_string(),
                rules,
            }],
        })
    }

    fn check_transitions(&self) -> EngineResult<()> {
        for state in &self.states {
            for rule in &state.rules {
                if let Action::Transition {
                    new_state: Some(target),
                    ..
                } = &rule.action
                {
                    let reserved = target == END_STATE || target == EOF_STATE;
                    if !reserved && self.state_index(target).is_none() {
                        return Err(EngineError::UndefinedState {
                            line: rule.line,
                            state: target.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn state_index(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|s| s.name == name)
    }

    /// Runs the machine over `text`, returning records in emission order.
    pub fn run(&self, text: &str) -> EngineResult<Vec<Record>> {
        let mut state = self.state_index(START_STATE).ok_or(EngineError::MissingStart)?;
        let mut state_name = START_STATE;
        let mut machine = Machine::new(&self.values);

        for (idx, line) in text.lines().enumerate() {
            let current = &self.states[state];
            for rule in &current.rules {
                let Some(caps) = rule.regex.captures(line) else {
                    continue;
                };
                for (group, value_idx) in &rule.assigns {
                    if let Some(m) = caps.name(group) {
                        machine.assign(*value_idx, m.as_str());
                    }
                }

                match &rule.action {
                    Action::Error(message) => {
                        return Err(EngineError::ErrorAction {
                            state: current.name.clone(),
                            line: idx + 1,
                            message: if message.is_empty() {
                                format!("rule at template line {} matched", rule.line)
                            } else {
                                message.clone()
                            },
                        });
                    }
                    Action::Transition {
                        line_op,
                        record_op,
                        new_state,
                    } => {
                        machine.apply(*record_op);
                        if *line_op == LineOp::Continue {
                            continue;
                        }
                        if let Some(target) = new_state {
                            state_name = target.as_str();
                            if let Some(next) = self.state_index(target) {
                                state = next;
                            }
                        }
                        break;
                    }
                }
            }

            if state_name == END_STATE || state_name == EOF_STATE {
                debug!(state = state_name, line = idx + 1, "State machine stopped early");
                break;
            }
        }

        if state_name != END_STATE && self.state_index(EOF_STATE).is_none() {
            machine.append_record();
        }

        Ok(machine.into_records())
    }

    /// Describes the fields: options, declared patterns and literal anchors.
    pub fn profile(&self) -> TemplateProfile {
        let mut fields: Vec<FieldProfile> = self
            .values
            .iter()
            .map(|value| {
                let mut field = FieldProfile::new(&value.name);
                field.carry = value.options.filldown;
                field.list = value.options.list;
                field.required = value.options.required;
                field.pattern = single_group_inner(&value.regex).and_then(embeddable_pattern);
                field
            })
            .collect();

        for rule in self.states.iter().flat_map(|s| &s.rules) {
            for field_ref in &rule.refs {
                let anchor = Anchor {
                    before: trailing_literal(&rule.pattern[..field_ref.start]),
                    after: leading_literal(&rule.pattern[field_ref.end..]),
                };
                if let Some(field) = fields.iter_mut().find(|f| f.name == field_ref.name) {
                    if !field.anchors.contains(&anchor) {
                        field.anchors.push(anchor);
                    }
                }
            }
        }

        TemplateProfile { fields }
    }
}

fn parse_value(text: &str, line: usize) -> EngineResult<ValueDef> {
    let caps = VALUE_LINE
        .captures(text)
        .ok_or_else(|| EngineError::syntax(line, format!("malformed value line '{text}'")))?;
    let options = match caps.get(1) {
        Some(list) => ValueOptions::parse(list.as_str(), line)?,
        None => ValueOptions::default(),
    };
    let name = caps[2].to_string();
    let regex = caps[3].to_string();
    if single_group_inner(&regex).is_none() {
        return Err(EngineError::syntax(
            line,
            format!("value '{name}' regex must be a single parenthesized group"),
        ));
    }
    Ok(ValueDef {
        name,
        options,
        regex,
    })
}

fn parse_rule(text: &str, line: usize, values: &[ValueDef]) -> EngineResult<Rule> {
    if !text.starts_with('^') {
        return Err(EngineError::syntax(line, "rule must start with '^'"));
    }
    let (source, action) = match RULE_WITH_ACTION.captures(text) {
        Some(caps) => (
            caps.get(1).map_or("", |m| m.as_str()),
            Action::parse(caps.get(2).map_or("", |m| m.as_str()), line)?,
        ),
        None => (text, Action::default()),
    };
    let (pattern, refs) = expand_references(source, values, line)?;
    Rule::compile(pattern, refs, action, line, values)
}

/// Expands `${NAME}` / `$NAME` into named groups and `$$` into `$`.
fn expand_references(
    source: &str,
    values: &[ValueDef],
    line: usize,
) -> EngineResult<(String, Vec<FieldRef>)> {
    let mut out = String::with_capacity(source.len() * 2);
    let mut refs = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let name = match chars.peek() {
            Some('$') => {
                chars.next();
                out.push('$');
                continue;
            }
            Some('{') => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(EngineError::syntax(line, "unterminated '${' reference"));
                        }
                    }
                }
                name
            }
            Some(ch) if ch.is_alphanumeric() || *ch == '_' => {
                let mut name = String::new();
                while let Some(ch) = chars.peek().copied() {
                    if !(ch.is_alphanumeric() || ch == '_') {
                        break;
                    }
                    name.push(ch);
                    chars.next();
                }
                name
            }
            _ => {
                out.push('$');
                continue;
            }
        };

        let value = values
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| EngineError::syntax(line, format!("reference to undeclared value '{name}'")))?;
        let start = out.len();
        out.push_str(&format!("(?P<{}>{}", value.name, &value.regex[1..]));
        refs.push(FieldRef {
            name,
            start,
            end: out.len(),
        });
    }

    Ok((out, refs))
}

/// Per-value runtime state.
#[derive(Debug, Clone, Default)]
struct Cell {
    value: Option<String>,
    list: Vec<String>,
    /// Last assigned value, restored on `Clear` for `Filldown` fields.
    saved: Option<String>,
}

struct Machine<'t> {
    values: &'t [ValueDef],
    cells: Vec<Cell>,
    rows: Vec<Vec<FieldValue>>,
}

impl<'t> Machine<'t> {
    fn new(values: &'t [ValueDef]) -> Self {
        Self {
            values,
            cells: vec![Cell::default(); values.len()],
            rows: Vec::new(),
        }
    }

    fn assign(&mut self, idx: usize, text: &str) {
        let options = self.values[idx].options;
        let cell = &mut self.cells[idx];
        if options.list {
            cell.list.push(text.to_string());
        }
        cell.value = Some(text.to_string());
        if options.filldown {
            cell.saved = cell.value.clone();
        }
        if options.fillup && !text.is_empty() {
            for row in self.rows.iter_mut().rev() {
                if !row[idx].is_empty() {
                    break;
                }
                row[idx] = if options.list {
                    FieldValue::List(vec![text.to_string()])
                } else {
                    FieldValue::Scalar(text.to_string())
                };
            }
        }
    }

    fn apply(&mut self, op: RecordOp) {
        match op {
            RecordOp::NoRecord => {}
            RecordOp::Record => self.append_record(),
            RecordOp::Clear => self.clear(),
            RecordOp::Clearall => self.clear_all(),
        }
    }

    fn append_record(&mut self) {
        let mut row = Vec::with_capacity(self.values.len());
        let mut missing_required = false;
        for (def, cell) in self.values.iter().zip(&self.cells) {
            let value = if def.options.list {
                FieldValue::List(cell.list.clone())
            } else {
                FieldValue::Scalar(cell.value.clone().unwrap_or_default())
            };
            missing_required |= def.options.required && value.is_empty();
            row.push(value);
        }
        if missing_required {
            self.clear();
            return;
        }
        if row.iter().all(FieldValue::is_empty) {
            return;
        }
        self.rows.push(row);
        self.clear();
    }

    fn clear(&mut self) {
        for (def, cell) in self.values.iter().zip(self.cells.iter_mut()) {
            if def.options.filldown {
                cell.value = cell.saved.clone();
            } else {
                cell.value = None;
                cell.list.clear();
            }
        }
    }

    fn clear_all(&mut self) {
        for cell in &mut self.cells {
            *cell = Cell::default();
        }
    }

    fn into_records(self) -> Vec<Record> {
        let names: Vec<&str> = self.values.iter().map(|v| v.name.as_str()).collect();
        self.rows
            .into_iter()
            .map(|row| names.iter().copied().zip(row).collect())
            .collect()
    }
}

/// Engine adapter for state-machine templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateMachineEngine;

impl TemplateEngine for StateMachineEngine {
    fn format(&self) -> TemplateFormat {
        TemplateFormat::Source
    }

    fn parse(&self, body: &str, text: &str) -> EngineResult<Vec<Record>> {
        StateMachineTemplate::parse(body)?.run(text)
    }

    fn profile(&self, body: &str) -> EngineResult<TemplateProfile> {
        Ok(StateMachineTemplate::parse(body)?.profile())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(body: &str, text: &str) -> Vec<Record> {
        StateMachineTemplate::parse(body).unwrap().run(text).unwrap()
    }

    fn scalar<'a>(record: &'a Record, name: &str) -> &'a str {
        record.get(name).and_then(FieldValue::as_scalar).unwrap()
    }

    #[test]
    fn test_inline_single_line_template() {
        let records = run(r"Version: (?P<VERSION>\S+)", "Version: 15.2\n");
        assert_eq!(records.len(), 1);
        assert_eq!(scalar(&records[0], "VERSION"), "15.2");
    }

    #[test]
    fn test_inline_multi_line_records_after_last_rule() {
        let body = "Hostname: (?P<HOST>\\S+)\nUptime: (?P<UPTIME>.+)";
        let records = run(body, "Hostname: r1\nUptime: 3 days\n");
        assert_eq!(records.len(), 1);
        assert_eq!(scalar(&records[0], "HOST"), "r1");
        assert_eq!(scalar(&records[0], "UPTIME"), "3 days");
    }

    #[test]
    fn test_table_records() {
        let body = "\
Value NAME (\\S+)
Value STATE (up|down)

Start
  ^${NAME}\\s+${STATE}\\s*$$ -> Record
";
        let records = run(body, "Name  State\neth0  up\neth1  down\n");
        assert_eq!(records.len(), 2);
        assert_eq!(scalar(&records[1], "NAME"), "eth1");
        assert_eq!(scalar(&records[1], "STATE"), "down");
    }

    #[test]
    fn test_filldown_survives_record_and_emits_trailing_row() {
        let body = "\
Value Filldown IFACE (\\S+)
Value ADDR (\\S+)

Start
  ^interface ${IFACE}
  ^  ip ${ADDR} -> Record
";
        let text = "interface eth0\n  ip 10.0.0.1\n  ip 10.0.0.2\n";
        let records = run(body, text);
        assert_eq!(records.len(), 3);
        assert_eq!(scalar(&records[1], "IFACE"), "eth0");
        assert_eq!(scalar(&records[1], "ADDR"), "10.0.0.2");
        assert_eq!(scalar(&records[2], "ADDR"), "");
    }

    #[test]
    fn test_required_suppresses_incomplete_rows() {
        let body = "\
Value Filldown IFACE (\\S+)
Value Required ADDR (\\S+)

Start
  ^interface ${IFACE}
  ^  ip ${ADDR} -> Record
";
        let records = run(body, "interface eth0\n  ip 10.0.0.1\ninterface eth1\n");
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_list_values_accumulate() {
        let body = "\
Value NAME (\\S+)
Value List MEMBERS (\\S+)

Start
  ^group -> Continue.Record
  ^group ${NAME}
  ^  member ${MEMBERS}
";
        let records = run(body, "group a\n  member x\n  member y\ngroup b\n  member z\n");
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].get("MEMBERS"),
            Some(&FieldValue::List(vec!["x".into(), "y".into()]))
        );
        assert_eq!(scalar(&records[0], "NAME"), "a");
        assert_eq!(
            records[1].get("MEMBERS"),
            Some(&FieldValue::List(vec!["z".into()]))
        );
    }

    #[test]
    fn test_fillup_fills_previous_rows() {
        let body = "\
Value A (\\d+)
Value Fillup B (\\w+)

Start
  ^a=${A} -> Record
  ^b=${B}
";
        let records = run(body, "a=1\na=2\nb=x\n");
        assert_eq!(records.len(), 3);
        assert_eq!(scalar(&records[0], "B"), "x");
        assert_eq!(scalar(&records[1], "B"), "x");
    }

    #[test]
    fn test_state_transitions() {
        let body = "\
Value NAME (\\S+)

Start
  ^Table: -> Rows

Rows
  ^row ${NAME} -> Record
";
        let records = run(body, "row ignored\nTable:\nrow kept\n");
        assert_eq!(records.len(), 1);
        assert_eq!(scalar(&records[0], "NAME"), "kept");
    }

    #[test]
    fn test_end_state_suppresses_eof_record() {
        let body = "\
Value NAME (\\S+)

Start
  ^name ${NAME}
  ^done -> End
";
        assert!(run(body, "name x\ndone\n").is_empty());
        assert_eq!(run(body, "name x\n").len(), 1);
    }

    #[test]
    fn test_eof_state_suppresses_implicit_record() {
        let body = "\
Value NAME (\\S+)

Start
  ^name ${NAME}

EOF
";
        assert!(run(body, "name x\n").is_empty());
    }

    #[test]
    fn test_clearall_resets_filldown() {
        let body = "\
Value Filldown A (\\S+)
Value B (\\S+)

Start
  ^a ${A}
  ^b ${B} -> Record
  ^reset -> Clearall
";
        let records = run(body, "a 1\nb 2\nreset\nb 3\n");
        assert_eq!(records.len(), 2);
        assert_eq!(scalar(&records[1], "A"), "");
    }

    #[test]
    fn test_error_action_fails_the_parse() {
        let body = "\
Value A (\\S+)

Start
  ^a ${A}
  ^. -> Error \"unexpected line\"
";
        let err = StateMachineTemplate::parse(body)
            .unwrap()
            .run("a 1\nboom\n")
            .unwrap_err();
        match err {
            EngineError::ErrorAction { line, message, .. } => {
                assert_eq!(line, 2);
                assert_eq!(message, "unexpected line");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_templates() {
        assert!(matches!(
            StateMachineTemplate::parse("Value A (x)\n\nOther\n  ^x"),
            Err(EngineError::MissingStart)
        ));
        assert!(matches!(
            StateMachineTemplate::parse("Value A (x)\n\nStart\n  ^${A} -> Nowhere"),
            Err(EngineError::UndefinedState { .. })
        ));
        assert!(matches!(
            StateMachineTemplate::parse("Value Bogus A (x)\n\nStart\n  ^${A}"),
            Err(EngineError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            StateMachineTemplate::parse("Value A (x)\n\nStart\n  ^${B}"),
            Err(EngineError::Syntax { line: 4, .. })
        ));
        assert!(matches!(
            StateMachineTemplate::parse("Value A (x)\n\nStart\n  ^${A} -> Continue Start"),
            Err(EngineError::Syntax { .. })
        ));
        assert!(matches!(
            StateMachineTemplate::parse("no groups here"),
            Err(EngineError::NoFields)
        ));
        assert!(matches!(
            StateMachineTemplate::parse("Value A (a{2,1})\n\nStart\n  ^${A}"),
            Err(EngineError::Regex { .. })
        ));
    }

    #[test]
    fn test_profile_reports_options_patterns_and_anchors() {
        let body = "\
Value Filldown IFACE (\\S+)
Value MTU (\\d+)

Start
  ^interface ${IFACE}
  ^\\s+mtu ${MTU}\\s*$$ -> Record
";
        let profile = StateMachineTemplate::parse(body).unwrap().profile();
        let iface = profile.field("IFACE").unwrap();
        assert!(iface.carry);
        assert_eq!(iface.pattern.as_deref(), Some("\\S+"));
        assert_eq!(iface.anchors[0].before, "\ninterface ");

        let mtu = profile.field("MTU").unwrap();
        assert!(!mtu.carry);
        assert_eq!(mtu.anchors[0].before, "\n mtu ");
        assert_eq!(mtu.anchors[0].after, " \n");
        assert_eq!(profile.carry_fields(), vec!["IFACE"]);
    }

    #[test]
    fn test_inline_profile_anchors() {
        let profile = StateMachineTemplate::parse(r"Version: (?P<VERSION>\S+)")
            .unwrap()
            .profile();
        let version = profile.field("VERSION").unwrap();
        assert_eq!(version.anchors[0].before, "\nVersion: ");
        assert_eq!(version.pattern.as_deref(), Some("\\S+"));
    }
}
