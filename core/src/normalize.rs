//! Whitespace normalization and value comparison.
//!
//! Both the value locator and the validator compare text through
//! [`normalize_whitespace`], so a value located in the sample and a value
//! produced by either engine agree on what "equal" means.

use crate::FieldValue;

/// Trims the value and collapses every internal whitespace run to one space.
///
/// # Examples
///
/// ```
/// use template_bridge_core::normalize_whitespace;
///
/// assert_eq!(normalize_whitespace("  admin \t down "), "admin down");
/// ```
pub fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compares an expected (oracle) value with an actual (target) value.
///
/// Scalars compare exactly after normalization. When either side is a list
/// the comparison is order-insensitive over the non-empty normalized parts,
/// so a single-element list equals the matching scalar.
///
/// # Examples
///
/// ```
/// use template_bridge_core::{FieldValue, values_equal};
///
/// let expected = FieldValue::List(vec!["b".into(), "a".into()]);
/// let actual = FieldValue::List(vec!["a".into(), "b".into()]);
/// assert!(values_equal(&expected, &actual));
/// assert!(!values_equal(&FieldValue::from("a"), &FieldValue::from("b")));
/// ```
pub fn values_equal(expected: &FieldValue, actual: &FieldValue) -> bool {
    match (expected, actual) {
        (FieldValue::Scalar(a), FieldValue::Scalar(b)) => {
            normalize_whitespace(a) == normalize_whitespace(b)
        }
        _ => sorted_parts(expected) == sorted_parts(actual),
    }
}

fn sorted_parts(value: &FieldValue) -> Vec<String> {
    let mut parts: Vec<String> = value
        .parts()
        .into_iter()
        .map(normalize_whitespace)
        .filter(|p| !p.is_empty())
        .collect();
    parts.sort();
    parts
}
