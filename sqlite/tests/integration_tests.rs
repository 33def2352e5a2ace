//! Integration tests for the template-bridge-sqlite crate.

use std::fs;

use rusqlite::Connection;
use tempfile::TempDir;
use template_bridge_core::{
    Strategy, SynthesizedTemplate, Template, TemplateFilter, TemplateFormat, TemplateRepository,
    UpsertOutcome,
};
use template_bridge_sqlite::{Migration, SqliteError, TemplateStore};

fn source(key: &str) -> Template {
    Template::source(key, format!("Value NAME (\\S+)\n\nStart\n  ^{key} ${{NAME}}\n"))
        .with_sample(format!("{key} demo"))
}

#[test]
fn test_store_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("templates.db");

    let store = TemplateStore::open(&path, "tb_").unwrap();
    store.upsert(&source("cisco_ios_show_clock")).unwrap();
    store.upsert(&source("juniper_junos_show_version")).unwrap();
    store.close().unwrap();

    let store = TemplateStore::open(&path, "tb_").unwrap();
    assert_eq!(store.count(Some(TemplateFormat::Source)).unwrap(), 2);
    let clock = store
        .get("cisco_ios_show_clock", TemplateFormat::Source)
        .unwrap()
        .unwrap();
    assert_eq!(clock, source("cisco_ios_show_clock"));
    assert!(
        store
            .get("cisco_ios_show_clock", TemplateFormat::Target)
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_prefixes_isolate_template_sets() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("templates.db");

    let prod = TemplateStore::open(&path, "prod_").unwrap();
    prod.upsert(&source("a_show")).unwrap();
    prod.close().unwrap();

    let test = TemplateStore::open(&path, "test_").unwrap();
    assert_eq!(test.count(None).unwrap(), 0);
}

#[test]
fn test_upsert_conversion_records_provenance() {
    let store = TemplateStore::open_in_memory("tb_").unwrap();
    let synthesized = SynthesizedTemplate {
        template: Template::target("cisco_ios_show_clock", "{{ NAME }}").with_sample("demo"),
        strategy: Strategy::Paragraph,
        source_key: "cisco_ios_show_clock".to_string(),
        unanchored: Vec::new(),
    };

    assert_eq!(
        store.upsert_conversion(&synthesized, 1.0).unwrap(),
        UpsertOutcome::Inserted
    );
    assert_eq!(
        store.upsert_conversion(&synthesized, 1.0).unwrap(),
        UpsertOutcome::Unchanged
    );

    let stored = store
        .get_stored("cisco_ios_show_clock", TemplateFormat::Target)
        .unwrap()
        .unwrap();
    assert_eq!(stored.strategy, Some(Strategy::Paragraph));
    assert_eq!(stored.source_key.as_deref(), Some("cisco_ios_show_clock"));
    assert_eq!(stored.match_ratio, Some(1.0));
    assert!(!stored.created_at.is_empty());
}

#[test]
fn test_fetch_through_repository_trait() {
    fn keys<R: TemplateRepository>(repo: &R, filter: &TemplateFilter) -> Vec<String> {
        repo.fetch(filter)
            .unwrap()
            .into_iter()
            .map(|t| t.key)
            .collect()
    }

    let store = TemplateStore::open_in_memory("tb_").unwrap();
    for key in [
        "cisco_ios_show_interfaces",
        "cisco_ios_show_version",
        "arista_eos_show_interfaces",
    ] {
        store.upsert(&source(key)).unwrap();
    }

    let filter = TemplateFilter::for_format(TemplateFormat::Source).with_query("interfaces");
    assert_eq!(
        keys(&store, &filter),
        vec!["arista_eos_show_interfaces", "cisco_ios_show_interfaces"]
    );
    let cisco = TemplateFilter::new().with_vendors(vec!["CISCO".into()]);
    assert_eq!(keys(&store, &cisco).len(), 2);
}

#[test]
fn test_migration_then_store_on_same_file() {
    let dir = TempDir::new().unwrap();
    let seed_dir = dir.path().join("seed");
    fs::create_dir(&seed_dir).unwrap();
    fs::write(
        seed_dir.join("cisco_ios_show_clock.textfsm"),
        "Value TIME (\\S+)\n\nStart\n  ^${TIME}\n",
    )
    .unwrap();
    fs::write(seed_dir.join("cisco_ios_show_clock.txt"), "12:00:00\n").unwrap();

    let path = dir.path().join("templates.db");
    let mut migration = Migration::new(Connection::open(&path).unwrap(), "tb_").unwrap();
    migration.up().unwrap();
    let report = migration.seed(&seed_dir).unwrap();
    assert_eq!(report.inserted, 1);
    drop(migration);

    let store = TemplateStore::open(&path, "tb_").unwrap();
    let template = store
        .require("cisco_ios_show_clock", TemplateFormat::Source)
        .unwrap();
    assert_eq!(template.sample, "12:00:00\n");
}

#[test]
fn test_refresh_replaces_contents() {
    let dir = TempDir::new().unwrap();
    let seed_dir = dir.path().join("seed");
    fs::create_dir(&seed_dir).unwrap();
    fs::write(seed_dir.join("a_show.ttp"), "{{ A }}").unwrap();
    let path = dir.path().join("templates.db");

    let store = TemplateStore::open(&path, "tb_").unwrap();
    store.upsert(&Template::target("stale", "{{ B }}")).unwrap();
    store.close().unwrap();

    let mut migration = Migration::new(Connection::open(&path).unwrap(), "tb_").unwrap();
    let report = migration.refresh(&seed_dir).unwrap();
    assert_eq!(report.inserted, 1);
    let status = migration.status().unwrap();
    assert_eq!(status.template_count, 1);
    assert_eq!(status.target_count, 1);
}

#[test]
fn test_store_errors_surface() {
    assert!(matches!(
        TemplateStore::open_in_memory("no spaces"),
        Err(SqliteError::InvalidPrefix(_))
    ));
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing").join("templates.db");
    assert!(TemplateStore::open(&missing, "tb_").is_err());
}
