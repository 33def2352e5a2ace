//! Template store capability.
//!
//! The conversion pipeline reaches persistent storage only through
//! [`TemplateRepository`]: fetch by key or filter, and upsert by key. The
//! SQLite backend lives in `template-bridge-sqlite`; tests use in-memory
//! implementations.

use serde::{Deserialize, Serialize};

use crate::{Template, TemplateFormat};

/// Selection criteria for fetching templates.
///
/// All criteria are conjunctive. Key matching is case-insensitive.
///
/// # Examples
///
/// ```
/// use template_bridge_core::{Template, TemplateFilter, TemplateFormat};
///
/// let filter = TemplateFilter::for_format(TemplateFormat::Source)
///     .with_query("show_ip-route")
///     .with_vendors(vec!["cisco".into()]);
/// assert_eq!(filter.terms, vec!["show", "route"]);
///
/// let hit = Template::source("cisco_ios_show_ip_route", "x");
/// let miss = Template::source("arista_eos_show_ip_route", "x");
/// assert!(filter.matches(&hit));
/// assert!(!filter.matches(&miss));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateFilter {
    /// Restrict to one format.
    pub format: Option<TemplateFormat>,
    /// Exact key; when set, terms are ignored.
    pub key: Option<String>,
    /// Every term must appear somewhere in the key.
    pub terms: Vec<String>,
    /// Key must start with one of these vendor prefixes (empty = any).
    pub vendors: Vec<String>,
    /// Maximum number of templates returned.
    pub limit: Option<usize>,
}

impl TemplateFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_format(format: TemplateFormat) -> Self {
        Self {
            format: Some(format),
            ..Self::default()
        }
    }

    /// Matches exactly one key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Derives key terms from a free-form query with [`filter_terms`].
    pub fn with_query(mut self, query: &str) -> Self {
        self.terms = filter_terms(query);
        self
    }

    pub fn with_vendors(mut self, vendors: Vec<String>) -> Self {
        self.vendors = vendors
            .into_iter()
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty())
            .collect();
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Returns `true` when the template satisfies every criterion except `limit`.
    pub fn matches(&self, template: &Template) -> bool {
        if self.format.is_some_and(|format| format != template.format) {
            return false;
        }
        if let Some(key) = &self.key {
            return &template.key == key;
        }
        let key = template.key.to_lowercase();
        let vendor_ok =
            self.vendors.is_empty() || self.vendors.iter().any(|v| key.starts_with(v.as_str()));
        vendor_ok && self.terms.iter().all(|term| key.contains(term.as_str()))
    }
}

/// Splits a query on `_`, `-` and whitespace, keeping lowercase terms longer
/// than two characters.
///
/// Short fragments such as `ip` or `sh` match too many keys to be useful.
///
/// # Examples
///
/// ```
/// use template_bridge_core::filter_terms;
///
/// assert_eq!(filter_terms("cisco_ios_show_ip_int_brief"), vec!["cisco", "ios", "show", "int", "brief"]);
/// assert!(filter_terms("ip").is_empty());
/// ```
pub fn filter_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|term| term.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// What an upsert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    /// An identical template was already stored.
    Unchanged,
}

/// Keyed template store.
///
/// Implementations must be usable from the orchestrating thread; conversion
/// workers never touch the store directly.
pub trait TemplateRepository {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns matching templates ordered by key, then format.
    fn fetch(&self, filter: &TemplateFilter) -> Result<Vec<Template>, Self::Error>;

    /// Inserts the template, or replaces the one stored under the same key and format.
    fn upsert(&self, template: &Template) -> Result<UpsertOutcome, Self::Error>;
}
