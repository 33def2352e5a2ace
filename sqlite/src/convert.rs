//! Conversion between [`Template`] values and `{prefix}templates` rows.
//!
//! Most functions here are `pub(crate)` and shared by
//! [`Migration`](crate::Migration) and [`TemplateStore`](crate::TemplateStore)
//! so that seeding and runtime upserts follow the same dedup rules.

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use sha2::{Digest, Sha256};
use template_bridge_core::{Strategy, Template, TemplateFormat, UpsertOutcome};

use crate::error::{Result, SqliteError};

/// Columns selected by every template query, in [`stored_from_row`] order.
pub(crate) const COLUMNS: &str =
    "key, format, body, sample, source_key, strategy, match_ratio, content_hash, created_at, updated_at";

/// A template row with its stored metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredTemplate {
    pub template: Template,
    /// Source template a converted template came from.
    pub source_key: Option<String>,
    pub strategy: Option<Strategy>,
    pub match_ratio: Option<f64>,
    pub content_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Provenance recorded alongside a converted template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Provenance<'a> {
    pub source_key: &'a str,
    pub strategy: Strategy,
    pub match_ratio: f64,
}

/// SHA-256 over the format, body and sample, hex encoded.
///
/// Two templates with the same hash are interchangeable for every stored
/// purpose, so upserting one over the other is a no-op.
pub fn content_hash(template: &Template) -> String {
    let mut hasher = Sha256::new();
    hasher.update(template.format.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(template.body.as_bytes());
    hasher.update([0]);
    hasher.update(template.sample.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn parse_column<T: std::str::FromStr>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse::<T>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
    })
}

pub(crate) fn stored_from_row(row: &Row<'_>) -> rusqlite::Result<StoredTemplate> {
    let format: TemplateFormat = parse_column(row, 1)?;
    let strategy = match row.get::<_, Option<String>>(5)? {
        Some(text) => Some(text.parse::<Strategy>().map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(err))
        })?),
        None => None,
    };
    Ok(StoredTemplate {
        template: Template {
            key: row.get(0)?,
            format,
            body: row.get(2)?,
            sample: row.get(3)?,
        },
        source_key: row.get(4)?,
        strategy,
        match_ratio: row.get(6)?,
        content_hash: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Loads one row by key and format.
pub(crate) fn load_template(
    conn: &Connection,
    prefix: &str,
    key: &str,
    format: TemplateFormat,
) -> Result<Option<StoredTemplate>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM {prefix}templates WHERE key = ?1 AND format = ?2"
    ))?;
    let stored = stmt
        .query_row(params![key, format.as_str()], stored_from_row)
        .optional()?;
    Ok(stored)
}

/// Inserts the template or replaces the row stored under its key and
/// format. A row with the same content hash is left untouched.
pub(crate) fn upsert_template(
    conn: &Connection,
    prefix: &str,
    template: &Template,
) -> Result<UpsertOutcome> {
    if template.key.trim().is_empty() {
        return Err(SqliteError::ConversionError(
            "template key cannot be empty".to_string(),
        ));
    }
    let hash = content_hash(template);
    let existing: Option<String> = conn
        .query_row(
            &format!("SELECT content_hash FROM {prefix}templates WHERE key = ?1 AND format = ?2"),
            params![template.key, template.format.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(stored) if stored == hash => Ok(UpsertOutcome::Unchanged),
        Some(_) => {
            conn.execute(
                &format!(
                    "UPDATE {prefix}templates
                     SET body = ?3, sample = ?4, content_hash = ?5, updated_at = datetime('now')
                     WHERE key = ?1 AND format = ?2"
                ),
                params![
                    template.key,
                    template.format.as_str(),
                    template.body,
                    template.sample,
                    hash
                ],
            )?;
            Ok(UpsertOutcome::Replaced)
        }
        None => {
            conn.execute(
                &format!(
                    "INSERT INTO {prefix}templates (key, format, body, sample, content_hash)
                     VALUES (?1, ?2, ?3, ?4, ?5)"
                ),
                params![
                    template.key,
                    template.format.as_str(),
                    template.body,
                    template.sample,
                    hash
                ],
            )?;
            Ok(UpsertOutcome::Inserted)
        }
    }
}

/// Records where a stored template came from.
pub(crate) fn set_provenance(
    conn: &Connection,
    prefix: &str,
    key: &str,
    format: TemplateFormat,
    provenance: &Provenance<'_>,
) -> Result<()> {
    conn.execute(
        &format!(
            "UPDATE {prefix}templates SET source_key = ?3, strategy = ?4, match_ratio = ?5
             WHERE key = ?1 AND format = ?2"
        ),
        params![
            key,
            format.as_str(),
            provenance.source_key,
            provenance.strategy.as_str(),
            provenance.match_ratio
        ],
    )?;
    Ok(())
}

/// Counts rows, optionally restricted to one format.
pub(crate) fn count_templates(
    conn: &Connection,
    prefix: &str,
    format: Option<TemplateFormat>,
) -> Result<usize> {
    let count: i64 = match format {
        Some(format) => conn.query_row(
            &format!("SELECT COUNT(*) FROM {prefix}templates WHERE format = ?1"),
            [format.as_str()],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            &format!("SELECT COUNT(*) FROM {prefix}templates"),
            [],
            |row| row.get(0),
        )?,
    };
    Ok(count as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::generate_schema_sql;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&generate_schema_sql("t_").unwrap()).unwrap();
        conn
    }

    #[test]
    fn test_content_hash_depends_on_every_part() {
        let base = Template::source("k", "body").with_sample("sample");
        let hash = content_hash(&base);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, content_hash(&base.clone()));
        assert_ne!(hash, content_hash(&base.clone().with_sample("other")));
        assert_ne!(hash, content_hash(&Template::target("k", "body").with_sample("sample")));
        // the separator keeps body/sample boundaries distinct
        assert_ne!(
            content_hash(&Template::source("k", "ab").with_sample("c")),
            content_hash(&Template::source("k", "a").with_sample("bc"))
        );
    }

    #[test]
    fn test_upsert_insert_replace_unchanged() {
        let conn = setup();
        let template = Template::source("cisco_ios_show_clock", "Value T (\\S+)").with_sample("x");
        assert_eq!(upsert_template(&conn, "t_", &template).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(upsert_template(&conn, "t_", &template).unwrap(), UpsertOutcome::Unchanged);

        let changed = template.clone().with_sample("y");
        assert_eq!(upsert_template(&conn, "t_", &changed).unwrap(), UpsertOutcome::Replaced);

        let stored = load_template(&conn, "t_", "cisco_ios_show_clock", TemplateFormat::Source)
            .unwrap()
            .unwrap();
        assert_eq!(stored.template, changed);
        assert_eq!(stored.content_hash, content_hash(&changed));
        assert_eq!(count_templates(&conn, "t_", None).unwrap(), 1);
    }

    #[test]
    fn test_same_key_in_both_formats() {
        let conn = setup();
        upsert_template(&conn, "t_", &Template::source("k", "a")).unwrap();
        upsert_template(&conn, "t_", &Template::target("k", "{{ A }}")).unwrap();
        assert_eq!(count_templates(&conn, "t_", Some(TemplateFormat::Target)).unwrap(), 1);
        assert_eq!(count_templates(&conn, "t_", None).unwrap(), 2);
    }

    #[test]
    fn test_provenance_round_trips() {
        let conn = setup();
        upsert_template(&conn, "t_", &Template::target("k", "{{ A }}")).unwrap();
        let provenance = Provenance {
            source_key: "k",
            strategy: Strategy::MultiSection,
            match_ratio: 0.5,
        };
        set_provenance(&conn, "t_", "k", TemplateFormat::Target, &provenance).unwrap();
        let stored = load_template(&conn, "t_", "k", TemplateFormat::Target)
            .unwrap()
            .unwrap();
        assert_eq!(stored.strategy, Some(Strategy::MultiSection));
        assert_eq!(stored.source_key.as_deref(), Some("k"));
        assert_eq!(stored.match_ratio, Some(0.5));
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let conn = setup();
        assert!(upsert_template(&conn, "t_", &Template::source(" ", "a")).is_err());
    }
}
