//! Basic CLI E2E tests.
//!
//! Tests run the built binary against a throwaway data directory and verify
//! its JSON output and exit codes.

use std::path::Path;
use std::process::Command;

/// Run a CLI command with `data_dir` as its data directory.
fn run_cli(data_dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_dailypick"))
        .args(args)
        .env("DAILYPICK_DATA_DIR", data_dir)
        .env_remove("DAILYPICK_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn run_json(data_dir: &Path, args: &[&str]) -> serde_json::Value {
    let (code, stdout, stderr) = run_cli(data_dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_pick_today_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let first = run_json(dir.path(), &["pick", "today", "--band", "6-8"]);
    let second = run_json(dir.path(), &["pick", "today", "--band", "6-8"]);
    assert_eq!(first["item"], second["item"]);
    assert_eq!(first["cached"], false);
    assert_eq!(second["cached"], true);
    assert_eq!(first["context_key"], "band=6-8");
}

#[test]
fn test_pick_today_without_storage() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the database file should be makes SQLite fail to open.
    std::fs::create_dir(dir.path().join("dailypick.db")).unwrap();

    let (code, stdout, stderr) = run_cli(dir.path(), &["pick", "today", "--band", "3-5"]);
    assert_eq!(code, 0, "pick failed: {stderr}");
    let first: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(first["item"]["id"].is_string());
    assert_eq!(first["cached"], false);
    assert!(stderr.contains("storage unavailable"));

    let second = run_json(dir.path(), &["pick", "today", "--band", "3-5"]);
    assert_eq!(first["item"], second["item"]);
    assert_eq!(second["cached"], false);
}

#[test]
fn test_pick_again_until_quota() {
    let dir = tempfile::tempdir().unwrap();
    for used in 1..=3 {
        let generation = run_json(dir.path(), &["pick", "again", "--take", "2"]);
        assert_eq!(generation["quota"]["used"], used);
        assert_eq!(generation["items"].as_array().unwrap().len(), 2);
    }
    let (code, stdout, _) = run_cli(dir.path(), &["pick", "again"]);
    assert_eq!(code, 2);
    assert!(stdout.contains("Come back tomorrow"));
}

#[test]
fn test_pick_again_with_generated_idea() {
    let dir = tempfile::tempdir().unwrap();
    let generation = run_json(
        dir.path(),
        &["pick", "again", "--generated", "--take", "50"],
    );
    let ids: Vec<&str> = generation["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap())
        .collect();
    assert!(ids.iter().any(|id| id.starts_with("gen-")));
}

#[test]
fn test_quota_status_and_consume() {
    let dir = tempfile::tempdir().unwrap();
    let status = run_json(dir.path(), &["quota", "status", "story"]);
    assert_eq!(status["used"], 0);
    assert_eq!(status["limit"], 5);
    assert_eq!(status["allowed"], true);

    let consumed = run_json(dir.path(), &["quota", "consume", "story"]);
    assert_eq!(consumed["used"], 1);
    assert_eq!(consumed["remaining"], 4);
}

#[test]
fn test_streak_award_and_show() {
    let dir = tempfile::tempdir().unwrap();
    let award = run_json(dir.path(), &["streak", "award", "10"]);
    assert_eq!(award["after"]["total"], 10);
    assert_eq!(award["extended"], true);

    run_json(dir.path(), &["streak", "award", "5"]);
    let show = run_json(dir.path(), &["streak", "show"]);
    assert_eq!(show["total"], 15);
    assert_eq!(show["current_streak"], 1);
    assert_eq!(show["points_today"], 15);

    let history = run_json(dir.path(), &["streak", "history"]);
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[test]
fn test_catalog_listing() {
    let dir = tempfile::tempdir().unwrap();
    let bands = run_json(dir.path(), &["catalog", "bands"]);
    assert_eq!(bands.as_array().unwrap().len(), 4);

    let items = run_json(dir.path(), &["catalog", "list", "--band", "0-2"]);
    assert!(items
        .as_array()
        .unwrap()
        .iter()
        .all(|i| i["band"].is_null() || i["band"] == "0-2"));
}

#[test]
fn test_custom_catalog_empty_pool() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = dir.path().join("empty.json");
    std::fs::write(&catalog, r#"{ "bands": [], "items": [] }"#).unwrap();
    let path = catalog.to_str().unwrap();

    let (code, stdout, _) = run_cli(dir.path(), &["pick", "today", "--catalog", path]);
    assert_eq!(code, 2);
    assert!(stdout.contains("Try a different"));
}

#[test]
fn test_config_set_get_reset() {
    let dir = tempfile::tempdir().unwrap();
    let limit = run_json(dir.path(), &["config", "get", "quotas.default_limit"]);
    assert_eq!(limit["key"], "quotas.default_limit");
    assert_eq!(limit["value"], 3);

    let set = run_json(dir.path(), &["config", "set", "timezone.utc_offset_minutes", "540"]);
    assert_eq!(set["value"], 540);
    let offset = run_json(dir.path(), &["config", "get", "timezone.utc_offset_minutes"]);
    assert_eq!(offset["value"], 540);

    let (code, stdout, stderr) =
        run_cli(dir.path(), &["config", "set", "timezone.utc_offset_minutes", "5000"]);
    assert_eq!(code, 1);
    assert!(stdout.is_empty());
    assert!(stderr.starts_with("error: "));

    let (code, stdout, stderr) = run_cli(dir.path(), &["config", "get", "no.such.key"]);
    assert_eq!(code, 1);
    assert!(stdout.is_empty());
    assert!(stderr.contains("Unknown configuration key: no.such.key"));

    let reset = run_json(dir.path(), &["config", "reset"]);
    assert_eq!(reset["timezone"]["utc_offset_minutes"], 0);
    let list = run_json(dir.path(), &["config", "list"]);
    assert_eq!(list, reset);
}
