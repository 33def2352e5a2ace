//! Auto-match scoring: which stored template best parses unknown text.
//!
//! Every candidate is run through its own engine and scored 0-100 from four
//! capped sub-scores:
//!
//! | sub-score   | weight | saturates at                              |
//! |-------------|--------|-------------------------------------------|
//! | records     | 30     | `row_threshold` records                   |
//! | fields      | 30     | `field_threshold` populated fields/record |
//! | population  | 25     | every field slot non-empty                |
//! | consistency | 15     | every record sharing one field set        |

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::Serialize;
use template_bridge_core::{Record, Template, TemplateFormat};
use tracing::{debug, info};

use crate::classify::dominant_field_set_share;
use crate::config::ScoreConfig;
use crate::engine::engine_for;

const RECORD_WEIGHT: f64 = 30.0;
const FIELD_WEIGHT: f64 = 30.0;
const POPULATION_WEIGHT: f64 = 25.0;
const CONSISTENCY_WEIGHT: f64 = 15.0;

/// Sub-scores of one candidate and their sum.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreBreakdown {
    pub records: f64,
    pub fields: f64,
    pub population: f64,
    pub consistency: f64,
    pub total: f64,
}

/// Scores parsed records. No records score zero.
///
/// # Examples
///
/// ```
/// use template_bridge_convert::config::ScoreConfig;
/// use template_bridge_convert::score::score_records;
/// use template_bridge_core::Record;
///
/// let records = vec![Record::from_iter([("A", "1"), ("B", "2")]); 3];
/// let score = score_records(&records, &ScoreConfig::default());
/// assert_eq!(score.total, 55.0);
/// ```
pub fn score_records(records: &[Record], config: &ScoreConfig) -> ScoreBreakdown {
    if records.is_empty() {
        return ScoreBreakdown::default();
    }

    let count = records.len();
    let populated: usize = records.iter().map(|r| r.populated_fields().len()).sum();
    let slots: usize = records.iter().map(Record::len).sum();
    let avg_populated = populated as f64 / count as f64;

    let records_score = RECORD_WEIGHT * saturate(count as f64, config.row_threshold);
    let fields_score = FIELD_WEIGHT * saturate(avg_populated, config.field_threshold);
    let population = if slots == 0 {
        0.0
    } else {
        POPULATION_WEIGHT * populated as f64 / slots as f64
    };
    let consistency = CONSISTENCY_WEIGHT * dominant_field_set_share(records);

    ScoreBreakdown {
        records: records_score,
        fields: fields_score,
        population,
        consistency,
        total: records_score + fields_score + population + consistency,
    }
}

fn saturate(value: f64, threshold: usize) -> f64 {
    if threshold == 0 {
        return 1.0;
    }
    value.min(threshold as f64) / threshold as f64
}

/// A candidate that parsed the text with a positive score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredTemplate {
    pub key: String,
    pub format: TemplateFormat,
    pub score: ScoreBreakdown,
    pub records: Vec<Record>,
}

/// A candidate whose engine rejected its body.
#[derive(Debug, Clone, Serialize)]
pub struct MatchFailure {
    pub key: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchResult {
    /// Highest-ranked candidate, if any scored above zero.
    pub best: Option<ScoredTemplate>,
    /// Candidates with a positive score, best first.
    pub ranked: Vec<ScoredTemplate>,
    pub failed: Vec<MatchFailure>,
}

impl MatchResult {
    pub fn top(&self, n: usize) -> &[ScoredTemplate] {
        &self.ranked[..n.min(self.ranked.len())]
    }
}

/// Runs every candidate against `text` in parallel and ranks them.
///
/// Ties on total score are broken by key, so the ranking is deterministic.
/// Candidates scoring zero are dropped; engine failures are collected
/// without affecting the others.
pub fn rank_templates(text: &str, candidates: &[Template], config: &ScoreConfig) -> MatchResult {
    let outcomes: Vec<Result<ScoredTemplate, MatchFailure>> = candidates
        .par_iter()
        .map(|template| {
            let records = engine_for(template.format)
                .parse(&template.body, text)
                .map_err(|err| MatchFailure {
                    key: template.key.clone(),
                    error: err.to_string(),
                })?;
            let score = score_records(&records, config);
            debug!(key = %template.key, records = records.len(), total = score.total, "scored");
            Ok(ScoredTemplate {
                key: template.key.clone(),
                format: template.format,
                score,
                records,
            })
        })
        .collect();

    let mut result = MatchResult::default();
    for outcome in outcomes {
        match outcome {
            Ok(scored) if scored.score.total > 0.0 => result.ranked.push(scored),
            Ok(_) => {}
            Err(failure) => result.failed.push(failure),
        }
    }
    result.ranked.sort_by(|a, b| {
        b.score
            .total
            .partial_cmp(&a.score.total)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
    result.failed.sort_by(|a, b| a.key.cmp(&b.key));
    result.best = result.ranked.first().cloned();

    info!(
        candidates = candidates.len(),
        matched = result.ranked.len(),
        failed = result.failed.len(),
        best = result.best.as_ref().map(|b| b.key.as_str()).unwrap_or("-"),
        "ranked templates"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(count: usize, fields: usize) -> Vec<Record> {
        (0..count)
            .map(|row| {
                (0..fields)
                    .map(|f| (format!("F{f}"), format!("v{row}")))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_richer_candidate_scores_higher() {
        let config = ScoreConfig::default();
        let a = score_records(&rows(3, 2), &config);
        let b = score_records(&rows(3, 5), &config);
        assert_eq!(a.total, 55.0);
        assert_eq!(b.total, 64.0);
        assert!(b.total > a.total);
    }

    #[test]
    fn test_sub_scores_saturate() {
        let config = ScoreConfig {
            row_threshold: 2,
            field_threshold: 2,
        };
        let score = score_records(&rows(5, 4), &config);
        assert_eq!(score.records, 30.0);
        assert_eq!(score.fields, 30.0);
        assert_eq!(score.total, 100.0);
    }

    #[test]
    fn test_population_and_consistency() {
        let records = vec![
            Record::from_iter([("A", "1"), ("B", "")]),
            Record::from_iter([("A", "2"), ("B", "x")]),
        ];
        let score = score_records(&records, &ScoreConfig::default());
        assert_eq!(score.population, 25.0 * 3.0 / 4.0);
        assert_eq!(score.consistency, 7.5);
    }

    #[test]
    fn test_no_records_scores_zero() {
        assert_eq!(score_records(&[], &ScoreConfig::default()).total, 0.0);
    }

    #[test]
    fn test_more_populated_fields_never_lowers_score() {
        let config = ScoreConfig::default();
        let mut previous = 0.0;
        for populated in 0..=6 {
            let records: Vec<Record> = (0..4)
                .map(|row| {
                    (0..6)
                        .map(|f| {
                            let value = if f < populated { format!("v{row}") } else { String::new() };
                            (format!("F{f}"), value)
                        })
                        .collect()
                })
                .collect();
            let total = score_records(&records, &config).total;
            assert!(total >= previous, "{populated}: {total} < {previous}");
            previous = total;
        }
    }

    #[test]
    fn test_rank_orders_by_score_then_key() {
        let text = "eth0 up 1500\neth1 down 9000\n";
        let candidates = vec![
            Template::target("b_names", "{{ NAME }} {{ STATE }} {{ MTU }}"),
            Template::target("a_names", "{{ NAME }} {{ STATE }} {{ MTU }}"),
            Template::target("c_partial", "{{ NAME }} up {{ MTU }}"),
            Template::target("d_nothing", "vlan {{ VLAN }}"),
            Template::source("e_broken", "Value X (\\S+)\n"),
        ];
        let result = rank_templates(text, &candidates, &ScoreConfig::default());
        let keys: Vec<&str> = result.ranked.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["a_names", "b_names", "c_partial"]);
        assert_eq!(result.best.as_ref().map(|b| b.key.as_str()), Some("a_names"));
        assert_eq!(result.best.as_ref().map(|b| b.records.len()), Some(2));
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].key, "e_broken");
        assert_eq!(result.top(1).len(), 1);
    }

    #[test]
    fn test_no_candidate_matches() {
        let candidates = vec![Template::target("vlan", "vlan {{ VLAN }}")];
        let result = rank_templates("nothing here", &candidates, &ScoreConfig::default());
        assert!(result.best.is_none());
        assert!(result.ranked.is_empty());
    }
}
