//! Migration lifecycle operations for the template table.
//!
//! [`Migration`] creates and drops the table, reports its status, and seeds
//! it from a directory of template files. Every mutation runs in a
//! transaction.
//!
//! # Seed directory layout
//!
//! - `<key>.textfsm` is a source template, `<key>.ttp` a target template.
//! - The sample comes from `<key>.txt`, or else from the `sample` field of a
//!   `<key>.json` sidecar such as the ones written by an export.
//! - Any other file is ignored.
//!
//! # Example
//!
//! ```no_run
//! use rusqlite::Connection;
//! use template_bridge_sqlite::Migration;
//!
//! let conn = Connection::open("templates.db").unwrap();
//! let mut migration = Migration::new(conn, "tb_").unwrap();
//! migration.up().unwrap();
//!
//! let report = migration.seed("templates/").unwrap();
//! println!("inserted {}, skipped {}", report.inserted, report.skipped.len());
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Deserialize;
use template_bridge_core::{Template, TemplateFormat, UpsertOutcome, validate_template};

use crate::convert;
use crate::error::{Result, SqliteError};
use crate::schema::{generate_drop_sql, generate_schema_sql, validate_prefix};

/// Manages the lifecycle of the template table.
pub struct Migration {
    conn: Connection,
    prefix: String,
}

impl Migration {
    /// Creates a migration manager for the given connection and table prefix.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`] if the prefix contains invalid characters.
    pub fn new(conn: Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self { conn, prefix })
    }

    /// Creates the table and indexes. Safe to call repeatedly.
    pub fn up(&mut self) -> Result<()> {
        let sql = generate_schema_sql(&self.prefix)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql)
            .map_err(|e| SqliteError::MigrationError(format!("failed to create tables: {e}")))?;
        tx.commit()?;
        Ok(())
    }

    /// Drops the table. Safe to call when it does not exist.
    pub fn down(&mut self) -> Result<()> {
        let sql = generate_drop_sql(&self.prefix)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql)
            .map_err(|e| SqliteError::MigrationError(format!("failed to drop tables: {e}")))?;
        tx.commit()?;
        Ok(())
    }

    pub fn status(&self) -> Result<MigrationStatus> {
        if !self.tables_exist()? {
            return Ok(MigrationStatus::default());
        }
        Ok(MigrationStatus {
            tables_exist: true,
            template_count: convert::count_templates(&self.conn, &self.prefix, None)?,
            source_count: convert::count_templates(
                &self.conn,
                &self.prefix,
                Some(TemplateFormat::Source),
            )?,
            target_count: convert::count_templates(
                &self.conn,
                &self.prefix,
                Some(TemplateFormat::Target),
            )?,
        })
    }

    /// Upserts every template file found directly under `source_dir`.
    ///
    /// Files are processed in name order within one transaction. Templates
    /// that fail validation are skipped and listed in the report; they never
    /// abort the seed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::Io`] if the directory or a template file cannot
    /// be read, or a database error if insertion fails.
    pub fn seed(&mut self, source_dir: impl AsRef<Path>) -> Result<SeedReport> {
        let templates = load_dir(source_dir.as_ref())?;
        let tx = self.conn.transaction()?;
        let mut report = SeedReport::default();

        for (path, template) in templates {
            let problems = validate_template(&template);
            if !problems.is_empty() {
                let reasons: Vec<String> = problems.iter().map(ToString::to_string).collect();
                report.skipped.push((path, reasons.join("; ")));
                continue;
            }
            match convert::upsert_template(&tx, &self.prefix, &template)? {
                UpsertOutcome::Inserted => report.inserted += 1,
                UpsertOutcome::Replaced => report.replaced += 1,
                UpsertOutcome::Unchanged => report.unchanged += 1,
            }
        }

        tx.commit()?;
        Ok(report)
    }

    /// Drops the table, recreates it, and seeds from the given directory.
    pub fn refresh(&mut self, source_dir: impl AsRef<Path>) -> Result<SeedReport> {
        self.down()?;
        self.up()?;
        self.seed(source_dir)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Consumes the migration and returns the underlying connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    fn tables_exist(&self) -> Result<bool> {
        let table_name = format!("{}templates", self.prefix);
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [&table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

/// Snapshot returned by [`Migration::status`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationStatus {
    pub tables_exist: bool,
    pub template_count: usize,
    pub source_count: usize,
    pub target_count: usize,
}

/// Outcome of [`Migration::seed`].
#[derive(Debug, Clone, Default)]
pub struct SeedReport {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
    /// Template files rejected by validation, with the reasons.
    pub skipped: Vec<(PathBuf, String)>,
}

impl SeedReport {
    /// Templates the seed wrote or confirmed.
    pub fn total(&self) -> usize {
        self.inserted + self.replaced + self.unchanged
    }
}

#[derive(Deserialize)]
struct SampleSidecar {
    #[serde(default)]
    sample: String,
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| SqliteError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads the sample for `<stem>`: a `.txt` file wins over a JSON sidecar.
fn load_sample(dir: &Path, stem: &str) -> Result<String> {
    let text = dir.join(format!("{stem}.txt"));
    if text.is_file() {
        return read(&text);
    }
    let sidecar = dir.join(format!("{stem}.json"));
    if sidecar.is_file() {
        let parsed: SampleSidecar = serde_json::from_str(&read(&sidecar)?).map_err(|err| {
            SqliteError::ConversionError(format!("{}: {err}", sidecar.display()))
        })?;
        return Ok(parsed.sample);
    }
    Ok(String::new())
}

fn load_dir(dir: &Path) -> Result<Vec<(PathBuf, Template)>> {
    let entries = fs::read_dir(dir).map_err(|source| SqliteError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut templates = Vec::new();
    for path in paths {
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some("textfsm") => TemplateFormat::Source,
            Some("ttp") => TemplateFormat::Target,
            _ => continue,
        };
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let body = read(&path)?;
        let sample = load_sample(dir, stem)?;
        let template = Template::new(stem, format, body).with_sample(sample);
        templates.push((path, template));
    }
    Ok(templates)
}
