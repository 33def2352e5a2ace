//! Strategy classification.
//!
//! A pure function of the template profile and the oracle records: the first
//! matching rule wins.
//!
//! 1. [`Strategy::MultiSection`] when any field carries forward across records.
//! 2. [`Strategy::Table`] when there is more than one record and the dominant
//!    populated-field set covers at least `table_consistency` of them.
//! 3. [`Strategy::Paragraph`] otherwise.

use std::collections::{BTreeSet, HashMap};

use template_bridge_core::{Record, Strategy};

use crate::config::ConversionConfig;
use crate::engine::TemplateProfile;

/// Chooses the synthesis strategy for a template and its oracle output.
///
/// # Examples
///
/// ```
/// use template_bridge_convert::classify::classify;
/// use template_bridge_convert::config::ConversionConfig;
/// use template_bridge_convert::engine::TemplateProfile;
/// use template_bridge_core::{Record, Strategy};
///
/// let records = vec![Record::from_iter([("VERSION", "15.2")])];
/// let strategy = classify(&TemplateProfile::default(), &records, &ConversionConfig::default());
/// assert_eq!(strategy, Strategy::Paragraph);
/// ```
pub fn classify(profile: &TemplateProfile, records: &[Record], config: &ConversionConfig) -> Strategy {
    if profile.has_carry_fields() {
        Strategy::MultiSection
    } else if is_consistent_table(records, config) {
        Strategy::Table
    } else {
        Strategy::Paragraph
    }
}

/// Whether records look like rows of one table.
pub fn is_consistent_table(records: &[Record], config: &ConversionConfig) -> bool {
    records.len() > 1 && dominant_field_set_share(records) >= config.table_consistency
}

/// Share of records whose populated field set is the most common one.
///
/// Returns `0.0` for no records.
pub fn dominant_field_set_share(records: &[Record]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<BTreeSet<&str>, usize> = HashMap::new();
    for record in records {
        let set: BTreeSet<&str> = record.populated_fields().into_iter().collect();
        *counts.entry(set).or_default() += 1;
    }
    let dominant = counts.values().copied().max().unwrap_or(0);
    dominant as f64 / records.len() as f64
}
