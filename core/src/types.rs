//! Template, record and validation type definitions.
//!
//! This module defines the data model shared by the conversion pipeline, the
//! template store and the command-line front end. The types are designed for
//! serialization with [`serde`] and can round-trip through JSON and SQLite.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::validate::TemplateError;

/// Format tag of a stored template.
///
/// `Source` templates are line-oriented state machines built from regular
/// expressions; `Target` templates are declarative line patterns with
/// embedded `{{ placeholder }}` markers.
///
/// # Examples
///
/// ```
/// use template_bridge_core::TemplateFormat;
///
/// assert_eq!(TemplateFormat::default(), TemplateFormat::Source);
/// assert_eq!("target".parse::<TemplateFormat>().unwrap(), TemplateFormat::Target);
/// assert_eq!(TemplateFormat::Target.file_extension(), "ttp");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum TemplateFormat {
    /// Regex/state-machine template (the format converted from).
    #[default]
    Source,
    /// Placeholder template (the format converted to).
    Target,
}

impl TemplateFormat {
    /// Stable lowercase label, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Target => "target",
        }
    }

    /// File extension used when templates are exported or seeded.
    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Source => "textfsm",
            Self::Target => "ttp",
        }
    }
}

impl fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateFormat {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "source" | "textfsm" => Ok(Self::Source),
            "target" | "ttp" => Ok(Self::Target),
            other => Err(TemplateError::UnknownFormat(other.to_string())),
        }
    }
}

/// A stored parsing template together with its validation fixture.
///
/// Templates are immutable once stored: re-converting a source template
/// produces a new target template that supersedes the previous one.
///
/// # Examples
///
/// ```
/// use template_bridge_core::{Template, TemplateFormat};
///
/// let template = Template::source("cisco_ios_show_version", "Version: (?P<VERSION>\\S+)")
///     .with_sample("Version: 15.2");
/// assert_eq!(template.format, TemplateFormat::Source);
/// assert_eq!(template.vendor(), "cisco");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Unique command identifier (e.g. `cisco_ios_show_version`).
    pub key: String,
    /// Which engine understands `body`.
    pub format: TemplateFormat,
    /// Raw template body.
    pub body: String,
    /// Sample command output used as ground truth.
    #[serde(default)]
    pub sample: String,
}

impl Template {
    /// Creates a template with an empty sample.
    pub fn new(key: impl Into<String>, format: TemplateFormat, body: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            format,
            body: body.into(),
            sample: String::new(),
        }
    }

    /// Creates a source-format template.
    pub fn source(key: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(key, TemplateFormat::Source, body)
    }

    /// Creates a target-format template.
    pub fn target(key: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(key, TemplateFormat::Target, body)
    }

    /// Attaches the sample text used as the validation fixture.
    pub fn with_sample(mut self, sample: impl Into<String>) -> Self {
        self.sample = sample.into();
        self
    }

    /// Vendor prefix of the key: everything before the first underscore.
    pub fn vendor(&self) -> &str {
        self.key.split('_').next().unwrap_or(&self.key)
    }
}

/// Value of one field in a parsed record.
///
/// Serialized untagged: scalars as JSON strings, lists as arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Returns `true` when the value carries no text at all.
    ///
    /// A list is empty when every element is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(value) => value.is_empty(),
            Self::List(values) => values.iter().all(String::is_empty),
        }
    }

    /// Returns the scalar text, or `None` for list values.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(value) => Some(value),
            Self::List(_) => None,
        }
    }

    /// Non-empty parts of the value, in order.
    pub fn parts(&self) -> Vec<&str> {
        match self {
            Self::Scalar(value) if value.is_empty() => Vec::new(),
            Self::Scalar(value) => vec![value.as_str()],
            Self::List(values) => values
                .iter()
                .map(String::as_str)
                .filter(|v| !v.is_empty())
                .collect(),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::Scalar(String::new())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(value) => f.write_str(value),
            Self::List(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

/// An ordered mapping from field name to value.
///
/// Field order is the declaration order of the template that produced the
/// record. Serializes as a JSON object preserving that order.
///
/// # Examples
///
/// ```
/// use template_bridge_core::{FieldValue, Record};
///
/// let mut record = Record::new();
/// record.insert("NAME", "eth0");
/// record.insert("MTU", "");
/// assert_eq!(record.get("NAME"), Some(&FieldValue::from("eth0")));
/// assert_eq!(record.populated_fields(), vec!["NAME"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing any previous value while keeping its position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Iterates over `(name, value)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Names of fields holding a non-empty value, in field order.
    pub fn populated_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns `true` when no field holds a value.
    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|(_, value)| value.is_empty())
    }
}

impl<N: Into<String>, V: Into<FieldValue>> FromIterator<(N, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Half-open `[start, end)` byte range into a sample text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Returns `true` when the two ranges share at least one byte.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One concrete appearance of a field value in the sample text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOccurrence {
    pub field: String,
    pub value: String,
    pub span: Span,
}

/// Coarse lexical type of a field value.
///
/// Hints are inferred by trying each classifier in declaration order and
/// taking the first that matches the whole value; [`TypeHint::Word`] and
/// [`TypeHint::Phrase`] are the catch-alls for values without and with
/// inner whitespace.
///
/// # Examples
///
/// ```
/// use template_bridge_core::TypeHint;
///
/// assert_eq!(TypeHint::infer("42"), TypeHint::Integer);
/// assert_eq!(TypeHint::infer("10.0.0.1"), TypeHint::Ipv4);
/// assert_eq!(TypeHint::infer("aabb.ccdd.eeff"), TypeHint::Mac);
/// assert_eq!(TypeHint::infer("up"), TypeHint::Word);
/// assert_eq!(TypeHint::infer("admin down"), TypeHint::Phrase);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeHint {
    Integer,
    Decimal,
    Ipv4,
    Ipv6,
    Mac,
    Hex,
    Word,
    Phrase,
}

impl TypeHint {
    /// Infers the hint for a single value.
    pub fn infer(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            return Self::Word;
        }
        if value.chars().any(char::is_whitespace) {
            return Self::Phrase;
        }
        if is_integer(value) {
            Self::Integer
        } else if is_decimal(value) {
            Self::Decimal
        } else if value.parse::<std::net::Ipv4Addr>().is_ok() {
            Self::Ipv4
        } else if value.contains(':') && value.parse::<std::net::Ipv6Addr>().is_ok() {
            Self::Ipv6
        } else if is_mac(value) {
            Self::Mac
        } else if is_hex(value) {
            Self::Hex
        } else {
            Self::Word
        }
    }

    /// Infers a single hint covering every non-empty part of a value.
    pub fn infer_all<'a>(parts: impl IntoIterator<Item = &'a str>) -> Self {
        parts
            .into_iter()
            .map(Self::infer)
            .reduce(Self::widen)
            .unwrap_or(Self::Word)
    }

    /// Smallest hint accepting values of both `self` and `other`.
    ///
    /// # Examples
    ///
    /// ```
    /// use template_bridge_core::TypeHint;
    ///
    /// assert_eq!(TypeHint::Integer.widen(TypeHint::Decimal), TypeHint::Decimal);
    /// assert_eq!(TypeHint::Ipv4.widen(TypeHint::Integer), TypeHint::Word);
    /// assert_eq!(TypeHint::Word.widen(TypeHint::Phrase), TypeHint::Phrase);
    /// ```
    pub fn widen(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Phrase, _) | (_, Self::Phrase) => Self::Phrase,
            (Self::Integer, Self::Decimal) | (Self::Decimal, Self::Integer) => Self::Decimal,
            _ => Self::Word,
        }
    }

    /// Placeholder modifier naming this type in target-format templates.
    ///
    /// `Word` is the target engine's default and has no marker.
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            Self::Integer => Some("DIGIT"),
            Self::Decimal => Some("DECIMAL"),
            Self::Ipv4 => Some("IP"),
            Self::Ipv6 => Some("IPV6"),
            Self::Mac => Some("MAC"),
            Self::Hex => Some("HEX"),
            Self::Word => None,
            Self::Phrase => Some("PHRASE"),
        }
    }

    /// Reverse of [`marker`](Self::marker); accepts `WORD` and `ORPHRASE`.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "DIGIT" => Some(Self::Integer),
            "DECIMAL" => Some(Self::Decimal),
            "IP" => Some(Self::Ipv4),
            "IPV6" => Some(Self::Ipv6),
            "MAC" => Some(Self::Mac),
            "HEX" => Some(Self::Hex),
            "WORD" => Some(Self::Word),
            "PHRASE" | "ORPHRASE" => Some(Self::Phrase),
            _ => None,
        }
    }
}

fn is_integer(value: &str) -> bool {
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_decimal(value: &str) -> bool {
    let body = value.strip_prefix(['-', '+']).unwrap_or(value);
    match body.split_once('.') {
        Some((whole, frac)) => {
            !frac.is_empty()
                && whole.chars().all(|c| c.is_ascii_digit())
                && frac.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

fn is_mac(value: &str) -> bool {
    let groups = |sep: char, count: usize, width: usize| {
        let parts: Vec<&str> = value.split(sep).collect();
        parts.len() == count
            && parts
                .iter()
                .all(|p| p.len() == width && p.chars().all(|c| c.is_ascii_hexdigit()))
    };
    groups(':', 6, 2) || groups('-', 6, 2) || groups('.', 3, 4)
}

fn is_hex(value: &str) -> bool {
    if let Some(digits) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        return !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit());
    }
    value.chars().all(|c| c.is_ascii_hexdigit())
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().any(|c| c.is_ascii_alphabetic())
}

/// Synthesis strategy: the structural shape of the sample data.
///
/// A closed set dispatched through one `synthesize` entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One line pattern per row, repeated.
    Table,
    /// A single record scattered over several lines.
    Paragraph,
    /// Repeating header blocks with nested detail rows.
    MultiSection,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Self::Table, Self::Paragraph, Self::MultiSection];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Paragraph => "paragraph",
            Self::MultiSection => "multi_section",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "table" => Ok(Self::Table),
            "paragraph" => Ok(Self::Paragraph),
            "multi_section" | "multisection" => Ok(Self::MultiSection),
            other => Err(TemplateError::UnknownStrategy(other.to_string())),
        }
    }
}

/// A candidate target template plus how it was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedTemplate {
    /// The generated target-format template (its sample is the source sample).
    pub template: Template,
    /// Strategy that produced the body (after any demotion).
    pub strategy: Strategy,
    /// Key of the source template this was converted from.
    pub source_key: String,
    /// Fields declared without a literal anchor because they were never located.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unanchored: Vec<String>,
}

/// One field value that differs between the oracle and the target parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMismatch {
    /// Zero-based row index within the overlapping rows.
    pub row: usize,
    pub field: String,
    pub expected: FieldValue,
    /// `None` when the target record lacks the field entirely.
    pub actual: Option<FieldValue>,
}

/// Per-field agreement counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldTally {
    pub expected: usize,
    pub matched: usize,
}

/// Outcome of re-parsing the sample with a synthesized template.
///
/// Field agreement is measured only over rows present in both parses; a
/// row-count difference is reported through [`row_count_matches`] and never
/// folded into the ratio.
///
/// [`row_count_matches`]: ValidationResult::row_count_matches
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub oracle_rows: usize,
    pub target_rows: usize,
    pub compared_rows: usize,
    /// Populated oracle field values inside the compared rows.
    pub fields_expected: usize,
    pub fields_matched: usize,
    pub per_field: BTreeMap<String, FieldTally>,
    pub mismatches: Vec<FieldMismatch>,
}

impl ValidationResult {
    /// Fraction of expected field values reproduced by the target parse.
    ///
    /// Returns `0.0` when nothing was comparable.
    pub fn match_ratio(&self) -> f64 {
        if self.fields_expected == 0 {
            return 0.0;
        }
        self.fields_matched as f64 / self.fields_expected as f64
    }

    pub fn row_count_matches(&self) -> bool {
        self.oracle_rows == self.target_rows
    }
}
