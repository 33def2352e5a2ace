//! Runtime template access.
//!
//! [`TemplateStore`] owns its connection: open it before a run and
//! [`close`](TemplateStore::close) it after. It implements
//! [`TemplateRepository`], which is all the conversion pipeline needs.
//!
//! # Example
//!
//! ```no_run
//! use template_bridge_core::{Template, TemplateFilter, TemplateFormat, TemplateRepository};
//! use template_bridge_sqlite::TemplateStore;
//!
//! let store = TemplateStore::open("templates.db", "tb_").unwrap();
//! store.upsert(&Template::source("cisco_ios_show_clock", "Value TIME (\\S+)")).unwrap();
//!
//! let filter = TemplateFilter::for_format(TemplateFormat::Source).with_query("show_clock");
//! for template in store.fetch(&filter).unwrap() {
//!     println!("{}", template.key);
//! }
//! store.close().unwrap();
//! ```

use std::path::Path;

use rusqlite::{Connection, params_from_iter};
use template_bridge_core::{
    SynthesizedTemplate, Template, TemplateFilter, TemplateFormat, TemplateRepository,
    UpsertOutcome,
};

use crate::convert::{self, COLUMNS, Provenance, StoredTemplate};
use crate::error::{Result, SqliteError};
use crate::schema::{generate_schema_sql, validate_prefix};

/// Keyed template store backed by one SQLite connection.
pub struct TemplateStore {
    conn: Connection,
    prefix: String,
}

impl TemplateStore {
    /// Opens (or creates) a database file and ensures the tables exist.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`] for a bad prefix, or a database
    /// error when the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self> {
        Self::from_connection(Connection::open(path)?, prefix)
    }

    /// In-memory store, mostly for tests.
    pub fn open_in_memory(prefix: impl Into<String>) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, prefix)
    }

    /// Wraps an existing connection, creating the tables if needed.
    pub fn from_connection(conn: Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        conn.execute_batch(&generate_schema_sql(&prefix)?)?;
        Ok(Self { conn, prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Closes the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, err)| SqliteError::from(err))
    }

    /// Loads one template.
    pub fn get(&self, key: &str, format: TemplateFormat) -> Result<Option<Template>> {
        Ok(self.get_stored(key, format)?.map(|stored| stored.template))
    }

    /// Loads one template, failing when it is absent.
    pub fn require(&self, key: &str, format: TemplateFormat) -> Result<Template> {
        self.get(key, format)?
            .ok_or_else(|| SqliteError::TemplateNotFound {
                key: key.to_string(),
                format: format.to_string(),
            })
    }

    /// Loads one template with its stored metadata.
    pub fn get_stored(&self, key: &str, format: TemplateFormat) -> Result<Option<StoredTemplate>> {
        convert::load_template(&self.conn, &self.prefix, key, format)
    }

    /// Templates matching `filter` with their metadata, ordered by key then
    /// format.
    ///
    /// Key terms and vendor prefixes are matched case-insensitively inside
    /// SQLite, so only selected rows are read.
    pub fn fetch_stored(&self, filter: &TemplateFilter) -> Result<Vec<StoredTemplate>> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(format) = filter.format {
            values.push(format.as_str().to_string());
            clauses.push(format!("format = ?{}", values.len()));
        }
        if let Some(key) = &filter.key {
            values.push(key.clone());
            clauses.push(format!("key = ?{}", values.len()));
        } else {
            for term in &filter.terms {
                values.push(term.to_lowercase());
                clauses.push(format!("instr(lower(key), ?{}) > 0", values.len()));
            }
            if !filter.vendors.is_empty() {
                let mut alternatives = Vec::new();
                for vendor in &filter.vendors {
                    values.push(vendor.to_lowercase());
                    alternatives.push(format!("instr(lower(key), ?{}) = 1", values.len()));
                }
                clauses.push(format!("({})", alternatives.join(" OR ")));
            }
        }

        let mut sql = format!("SELECT {COLUMNS} FROM {}templates", self.prefix);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY key, format");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), convert::stored_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Stores a synthesized template with its provenance in one transaction.
    pub fn upsert_conversion(
        &self,
        synthesized: &SynthesizedTemplate,
        match_ratio: f64,
    ) -> Result<UpsertOutcome> {
        let tx = self.conn.unchecked_transaction()?;
        let template = &synthesized.template;
        let outcome = convert::upsert_template(&tx, &self.prefix, template)?;
        convert::set_provenance(
            &tx,
            &self.prefix,
            &template.key,
            template.format,
            &Provenance {
                source_key: &synthesized.source_key,
                strategy: synthesized.strategy,
                match_ratio,
            },
        )?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Deletes a template in one format, or in every format when `format` is
    /// `None`. Returns the number of rows removed.
    pub fn delete(&self, key: &str, format: Option<TemplateFormat>) -> Result<usize> {
        let removed = match format {
            Some(format) => self.conn.execute(
                &format!("DELETE FROM {}templates WHERE key = ?1 AND format = ?2", self.prefix),
                [key, format.as_str()],
            )?,
            None => self.conn.execute(
                &format!("DELETE FROM {}templates WHERE key = ?1", self.prefix),
                [key],
            )?,
        };
        Ok(removed)
    }

    pub fn count(&self, format: Option<TemplateFormat>) -> Result<usize> {
        convert::count_templates(&self.conn, &self.prefix, format)
    }
}

impl TemplateRepository for TemplateStore {
    type Error = SqliteError;

    fn fetch(&self, filter: &TemplateFilter) -> Result<Vec<Template>> {
        Ok(self
            .fetch_stored(filter)?
            .into_iter()
            .map(|stored| stored.template)
            .collect())
    }

    fn upsert(&self, template: &Template) -> Result<UpsertOutcome> {
        convert::upsert_template(&self.conn, &self.prefix, template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(keys: &[(&str, TemplateFormat)]) -> TemplateStore {
        let store = TemplateStore::open_in_memory("tb_").unwrap();
        for (key, format) in keys {
            store
                .upsert(&Template::new(*key, *format, "body").with_sample("sample"))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_fetch_orders_by_key_then_format() {
        let store = store_with(&[
            ("b_show", TemplateFormat::Source),
            ("a_show", TemplateFormat::Target),
            ("a_show", TemplateFormat::Source),
        ]);
        let all = store.fetch(&TemplateFilter::new()).unwrap();
        let order: Vec<(&str, TemplateFormat)> =
            all.iter().map(|t| (t.key.as_str(), t.format)).collect();
        assert_eq!(
            order,
            vec![
                ("a_show", TemplateFormat::Source),
                ("a_show", TemplateFormat::Target),
                ("b_show", TemplateFormat::Source),
            ]
        );
    }

    #[test]
    fn test_fetch_agrees_with_filter_matches() {
        let store = store_with(&[
            ("cisco_ios_show_ip_route", TemplateFormat::Source),
            ("Cisco_NXOS_show_ip_route", TemplateFormat::Source),
            ("arista_eos_show_ip_route", TemplateFormat::Source),
            ("cisco_ios_show_version", TemplateFormat::Source),
            ("cisco_ios_show_ip_route", TemplateFormat::Target),
        ]);
        let filter = TemplateFilter::for_format(TemplateFormat::Source)
            .with_query("show_ip_route")
            .with_vendors(vec!["cisco".into()]);
        let keys: Vec<String> = store.fetch(&filter).unwrap().into_iter().map(|t| t.key).collect();
        assert_eq!(keys, vec!["Cisco_NXOS_show_ip_route", "cisco_ios_show_ip_route"]);

        let everything = store.fetch(&TemplateFilter::new()).unwrap();
        let expected: Vec<&Template> = everything.iter().filter(|t| filter.matches(t)).collect();
        assert_eq!(expected.len(), keys.len());
    }

    #[test]
    fn test_fetch_limit_and_exact_key() {
        let store = store_with(&[
            ("a_show", TemplateFormat::Source),
            ("a_show_x", TemplateFormat::Source),
            ("b_show", TemplateFormat::Source),
        ]);
        let limited = store.fetch(&TemplateFilter::new().with_limit(Some(2))).unwrap();
        assert_eq!(limited.len(), 2);
        let exact = store.fetch(&TemplateFilter::new().with_key("a_show")).unwrap();
        assert_eq!(exact.len(), 1);
    }

    #[test]
    fn test_require_and_delete() {
        let store = store_with(&[
            ("k", TemplateFormat::Source),
            ("k", TemplateFormat::Target),
        ]);
        assert!(store.require("k", TemplateFormat::Source).is_ok());
        assert!(matches!(
            store.require("missing", TemplateFormat::Source),
            Err(SqliteError::TemplateNotFound { .. })
        ));
        assert_eq!(store.delete("k", Some(TemplateFormat::Target)).unwrap(), 1);
        assert_eq!(store.count(None).unwrap(), 1);
        assert_eq!(store.delete("k", None).unwrap(), 1);
        assert_eq!(store.count(None).unwrap(), 0);
    }

    #[test]
    fn test_invalid_prefix_is_rejected() {
        assert!(matches!(
            TemplateStore::open_in_memory("bad-prefix"),
            Err(SqliteError::InvalidPrefix(_))
        ));
    }
}
