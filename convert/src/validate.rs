//! Round-trip validation of a synthesized template.

use template_bridge_core::{
    FieldMismatch, FieldValue, Record, TemplateFormat, ValidationResult, values_equal,
};
use tracing::debug;

use crate::engine::engine_for;
use crate::error::EngineResult;

/// Re-parses `sample` with a target body and compares against the oracle.
///
/// Rows are compared by position over the rows both parses produced. Only
/// populated oracle values are expected; a target record lacking such a
/// field counts as a mismatch. Scalars compare after whitespace
/// normalization, lists as multisets.
///
/// # Errors
///
/// Returns the target engine's error when `body` does not compile.
///
/// # Examples
///
/// ```
/// use template_bridge_convert::validate::validate;
/// use template_bridge_core::Record;
///
/// let oracle = vec![Record::from_iter([("VERSION", "15.2")])];
/// let result = validate("Version: {{ VERSION }}", "Version: 15.2", &oracle).unwrap();
/// assert_eq!(result.match_ratio(), 1.0);
/// assert!(result.row_count_matches());
/// ```
pub fn validate(body: &str, sample: &str, oracle: &[Record]) -> EngineResult<ValidationResult> {
    let target = engine_for(TemplateFormat::Target).parse(body, sample)?;
    let result = compare(oracle, &target);
    debug!(
        oracle_rows = result.oracle_rows,
        target_rows = result.target_rows,
        matched = result.fields_matched,
        expected = result.fields_expected,
        "validated"
    );
    Ok(result)
}

/// Field-level comparison of two record sequences.
pub fn compare(oracle: &[Record], target: &[Record]) -> ValidationResult {
    let mut result = ValidationResult {
        oracle_rows: oracle.len(),
        target_rows: target.len(),
        compared_rows: oracle.len().min(target.len()),
        ..ValidationResult::default()
    };

    for (row, (expected, actual)) in oracle.iter().zip(target).enumerate() {
        for (field, value) in expected.iter() {
            if value.is_empty() {
                continue;
            }
            let tally = result.per_field.entry(field.to_string()).or_default();
            tally.expected += 1;
            result.fields_expected += 1;

            let found = actual.get(field);
            if found.is_some_and(|found| values_equal(value, found)) {
                tally.matched += 1;
                result.fields_matched += 1;
            } else {
                result.mismatches.push(FieldMismatch {
                    row,
                    field: field.to_string(),
                    expected: value.clone(),
                    actual: found.cloned(),
                });
            }
        }
    }
    result
}

/// Mismatch summary line used in reports.
pub fn describe_mismatch(mismatch: &FieldMismatch) -> String {
    let actual = mismatch
        .actual
        .as_ref()
        .map_or_else(|| "<missing>".to_string(), FieldValue::to_string);
    format!(
        "row {} {}: expected '{}', got '{}'",
        mismatch.row, mismatch.field, mismatch.expected, actual
    )
}
