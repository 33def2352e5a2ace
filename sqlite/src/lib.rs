//! SQLite storage backend for parsing templates.
//!
//! Source and target templates share one `{prefix}templates` table keyed by
//! `(key, format)`. Converted templates also record the source key, the
//! strategy that produced them and their validation match ratio.
//!
//! - **`schema`**: SQL generation with customizable table prefixes
//! - **`migration`**: lifecycle operations (up/down/status/seed/refresh)
//! - **`convert`**: row mapping, content hashing and upserts
//! - **`query`**: [`TemplateStore`], the runtime handle implementing
//!   [`TemplateRepository`](template_bridge_core::TemplateRepository)
//!
//! # Quick start
//!
//! ```
//! use template_bridge_core::{Template, TemplateFilter, TemplateRepository, UpsertOutcome};
//! use template_bridge_sqlite::TemplateStore;
//!
//! let store = TemplateStore::open_in_memory("tb_").unwrap();
//! let template = Template::source("cisco_ios_show_clock", "Value TIME (\\S+)").with_sample("12:00");
//! assert_eq!(store.upsert(&template).unwrap(), UpsertOutcome::Inserted);
//! assert_eq!(store.upsert(&template).unwrap(), UpsertOutcome::Unchanged);
//!
//! let found = store.fetch(&TemplateFilter::new().with_query("clock")).unwrap();
//! assert_eq!(found, vec![template]);
//! ```

mod convert;
mod error;
mod migration;
mod query;
mod schema;

pub use convert::{StoredTemplate, content_hash};
pub use error::{Result, SqliteError};
pub use migration::{Migration, MigrationStatus, SeedReport};
pub use query::TemplateStore;
pub use schema::{generate_drop_sql, generate_schema_sql};
