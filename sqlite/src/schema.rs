//! SQL schema generation with customizable table prefixes.
//!
//! Templates live in a single `{prefix}templates` table, unique on
//! `(key, format)`. Each row carries the template body and sample plus the
//! provenance of converted templates (`source_key`, `strategy`,
//! `match_ratio`) and a SHA-256 `content_hash` used to skip identical
//! upserts.
//!
//! Prefixes must contain only alphanumeric characters and underscores, so
//! several isolated template sets can share one database file.

use crate::error::{Result, SqliteError};

/// Validates that a table prefix contains only alphanumeric characters and underscores.
pub(crate) fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(SqliteError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}

/// Generates the `CREATE` statements for the given prefix.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix is empty or contains
/// characters other than alphanumerics and underscores.
pub fn generate_schema_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;

    Ok(format!(
        r#"
CREATE TABLE IF NOT EXISTS {prefix}templates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL,
    format TEXT NOT NULL CHECK (format IN ('source', 'target')),
    body TEXT NOT NULL,
    sample TEXT NOT NULL DEFAULT '',
    source_key TEXT,
    strategy TEXT,
    match_ratio REAL,
    content_hash TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (key, format)
);

CREATE INDEX IF NOT EXISTS idx_{prefix}templates_format ON {prefix}templates(format);
CREATE INDEX IF NOT EXISTS idx_{prefix}templates_source_key ON {prefix}templates(source_key);
"#
    ))
}

/// Generates SQL to drop every table for the given prefix.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix is invalid.
pub fn generate_drop_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;
    Ok(format!("DROP TABLE IF EXISTS {prefix}templates;\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_prefix() {
        assert!(validate_prefix("tb_").is_ok());
        assert!(validate_prefix("test123").is_ok());
    }

    #[test]
    fn test_invalid_prefix() {
        assert!(validate_prefix("").is_err());
        assert!(validate_prefix("drop;--").is_err());
        assert!(validate_prefix("test-prefix").is_err());
    }

    #[test]
    fn test_schema_sql_contains_table_and_indexes() {
        let sql = generate_schema_sql("tb_").unwrap();
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS tb_templates"));
        assert!(sql.contains("UNIQUE (key, format)"));
        assert!(sql.contains("idx_tb_templates_format"));
        assert!(sql.contains("idx_tb_templates_source_key"));
    }

    #[test]
    fn test_format_check_constraint() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(&generate_schema_sql("t_").unwrap()).unwrap();
        let insert = "INSERT INTO t_templates (key, format, body, content_hash) VALUES ('k', ?1, 'b', 'h')";
        assert!(conn.execute(insert, ["source"]).is_ok());
        assert!(conn.execute(insert, ["target"]).is_ok());
        assert!(conn.execute(insert, ["yaml"]).is_err());
        // (key, format) is unique
        assert!(conn.execute(insert, ["source"]).is_err());
    }

    #[test]
    fn test_drop_sql() {
        assert_eq!(
            generate_drop_sql("tb_").unwrap(),
            "DROP TABLE IF EXISTS tb_templates;\n"
        );
        assert!(generate_drop_sql("").is_err());
    }
}
