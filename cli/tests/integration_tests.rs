use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../convert/tests/fixtures")
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_template-bridge"))
        .args(args)
        .output()
        .expect("failed to run template-bridge")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Creates a database seeded with every fixture template.
fn seeded_db(dir: &TempDir) -> PathBuf {
    let db = dir.path().join("templates.db");
    let fixtures = fixtures();
    let out = run(&[
        "migrate",
        "seed",
        "--db",
        db.to_str().unwrap(),
        "--source",
        fixtures.to_str().unwrap(),
    ]);
    assert!(
        out.status.success(),
        "seed failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    db
}

// ---------------------------------------------------------------------------
// Migrate tests
// ---------------------------------------------------------------------------

#[test]
fn migrate_up_then_status_reports_tables() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("templates.db");
    let db = db.to_str().unwrap();

    let out = run(&["migrate", "up", "--db", db]);
    assert!(out.status.success(), "migrate up should succeed");

    let out = run(&["migrate", "status", "--db", db]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("Tables exist: yes"), "got: {text}");
    assert!(text.contains("Templates: 0"), "got: {text}");
}

#[test]
fn migrate_seed_counts_fixture_templates() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir);

    let out = run(&["migrate", "status", "--db", db.to_str().unwrap()]);
    let text = stdout(&out);
    assert!(text.contains("Source templates: 4"), "got: {text}");
    assert!(text.contains("Target templates: 0"), "got: {text}");
}

#[test]
fn migrate_rejects_bad_prefix() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("templates.db");
    let out = run(&[
        "migrate",
        "up",
        "--db",
        db.to_str().unwrap(),
        "--prefix",
        "bad prefix",
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("error:"));
}

// ---------------------------------------------------------------------------
// Convert tests
// ---------------------------------------------------------------------------

#[test]
fn convert_exports_templates_and_report() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir);
    let export = dir.path().join("out");

    let out = run(&[
        "convert",
        "--db",
        db.to_str().unwrap(),
        "--export",
        export.to_str().unwrap(),
        "--workers",
        "2",
    ]);
    assert!(
        out.status.success(),
        "convert failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert!(stdout(&out).contains("Converted 4 templates"));

    let body = fs::read_to_string(export.join("linux_ip_link_brief.ttp")).unwrap();
    assert!(body.contains("{{ NAME"));
    assert!(export.join("linux_ip_link_brief.json").exists());

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(export.join("conversion-report.json")).unwrap())
            .unwrap();
    assert_eq!(report["total"], 4);
    assert_eq!(report["jobs"].as_array().unwrap().len(), 4);
}

#[test]
fn convert_filter_limits_the_batch() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir);
    let out = run(&[
        "convert",
        "--db",
        db.to_str().unwrap(),
        "--vendors",
        "cisco",
    ]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("Converted 2 templates"));
}

#[test]
fn convert_save_stores_target_templates() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir);
    let db = db.to_str().unwrap();

    let out = run(&["convert", "--db", db, "--filter", "ip_link", "--save"]);
    assert!(out.status.success());

    let out = run(&["migrate", "status", "--db", db]);
    assert!(stdout(&out).contains("Target templates: 1"));
}

#[test]
fn convert_file_prints_target_template() {
    let fixtures = fixtures();
    let template = fixtures.join("cisco_ios_show_version.textfsm");
    let sample = fixtures.join("cisco_ios_show_version.txt");
    let out = run(&[
        "convert-file",
        "--template",
        template.to_str().unwrap(),
        "--sample",
        sample.to_str().unwrap(),
    ]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("{{ VERSION"), "got: {text}");
    assert!(text.contains("{{ HOSTNAME"), "got: {text}");
    let summary = String::from_utf8_lossy(&out.stderr);
    assert!(summary.contains("match ratio: 1.000"), "got: {summary}");
}

#[test]
fn convert_file_missing_template_fails() {
    let out = run(&[
        "convert-file",
        "--template",
        "/nonexistent/a.textfsm",
        "--sample",
        "/nonexistent/a.txt",
    ]);
    assert!(!out.status.success());
}

// ---------------------------------------------------------------------------
// Match tests
// ---------------------------------------------------------------------------

#[test]
fn match_json_picks_the_parsing_template() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir);
    let input = fixtures().join("linux_ip_link_brief.txt");

    let out = run(&[
        "match",
        "--db",
        db.to_str().unwrap(),
        "--json",
        input.to_str().unwrap(),
    ]);
    assert!(
        out.status.success(),
        "match failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let result: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(result["best"]["key"], "linux_ip_link_brief");
    assert_eq!(result["best"]["records"].as_array().unwrap().len(), 5);
}

#[test]
fn match_list_prints_candidates() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir);
    let out = run(&[
        "match",
        "--db",
        db.to_str().unwrap(),
        "--vendors",
        "linux",
        "--list",
    ]);
    assert!(out.status.success());
    assert_eq!(stdout(&out).trim(), "linux_ip_link_brief\tsource");
}

#[test]
fn match_with_empty_store_fails() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("empty.db");
    let input = fixtures().join("linux_ip_link_brief.txt");
    let out = run(&[
        "match",
        "--db",
        db.to_str().unwrap(),
        input.to_str().unwrap(),
    ]);
    assert!(!out.status.success());
}
