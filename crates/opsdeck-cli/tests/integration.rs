#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn opsdeck(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("opsdeck").unwrap();
    cmd.current_dir(dir.path())
        .env("OPSDECK_CONFIG", dir.path().join("opsdeck.yaml"))
        .env_remove("OPSDECK_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

// ---------------------------------------------------------------------------
// opsdeck config
// ---------------------------------------------------------------------------

#[test]
fn config_check_without_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    opsdeck(&dir)
        .args(["config", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn config_init_writes_defaults_once() {
    let dir = TempDir::new().unwrap();
    opsdeck(&dir)
        .args(["config", "init", "--url", "https://deck.example.com"])
        .assert()
        .success();

    let raw = std::fs::read_to_string(dir.path().join("opsdeck.yaml")).unwrap();
    let yaml: serde_yaml::Value = serde_yaml::from_str(&raw).unwrap();
    assert_eq!(yaml["remote"]["kind"].as_str(), Some("rest"));
    assert_eq!(yaml["remote"]["url"].as_str(), Some("https://deck.example.com"));
    assert_eq!(yaml["feed"]["reconnect"]["initial_delay_ms"].as_u64(), Some(250));

    opsdeck(&dir)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn config_check_reports_rest_remote_without_url() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("opsdeck.yaml"), "remote:\n  kind: rest\n").unwrap();

    opsdeck(&dir)
        .args(["config", "check"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] remote.url is required"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn commands_refuse_invalid_config() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("opsdeck.yaml"), "remote:\n  kind: rest\n").unwrap();

    opsdeck(&dir)
        .arg("snapshot")
        .assert()
        .failure()
        .stderr(predicate::str::contains("config check"));
}

#[test]
fn config_check_json_lists_warnings() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("opsdeck.yaml"),
        "feed:\n  tables: []\n",
    )
    .unwrap();

    let output = opsdeck(&dir)
        .args(["--json", "config", "check"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["warnings"][0]["level"], "warning");
}

// ---------------------------------------------------------------------------
// opsdeck snapshot
// ---------------------------------------------------------------------------

#[test]
fn snapshot_of_memory_remote_shows_fallback_panels() {
    let dir = TempDir::new().unwrap();
    opsdeck(&dir)
        .arg("snapshot")
        .assert()
        .success()
        .stdout(predicate::str::contains("OFFLINE"))
        .stdout(predicate::str::contains("STANDBY"))
        .stdout(predicate::str::contains("(no items)"));
}

#[test]
fn snapshot_json_filters_lanes() {
    let dir = TempDir::new().unwrap();
    let output = opsdeck(&dir)
        .args(["snapshot", "--json", "--owner", "JARVIS"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["revision"], 1);
    assert_eq!(json["lanes"].as_array().unwrap().len(), 1);
    assert_eq!(json["lanes"][0]["owner"], "JARVIS");
    assert_eq!(json["panels"].as_array().unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Work item commands
// ---------------------------------------------------------------------------

#[test]
fn add_joins_title_words() {
    let dir = TempDir::new().unwrap();
    let output = opsdeck(&dir)
        .args(["add", "Z", "Patrol", "perimeter", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["title"], "Patrol perimeter");
    assert_eq!(json["assignee"], "Z");
    assert_eq!(json["status"], "pending");
}

#[test]
fn add_blank_title_fails() {
    let dir = TempDir::new().unwrap();
    opsdeck(&dir)
        .args(["add", "JARVIS", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("title must not be empty"));
}

#[test]
fn add_unknown_owner_fails() {
    let dir = TempDir::new().unwrap();
    opsdeck(&dir)
        .args(["add", "bob", "Recon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown actor"));
}

#[test]
fn toggle_missing_item_fails() {
    let dir = TempDir::new().unwrap();
    opsdeck(&dir)
        .args(["toggle", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("work item not found: 42"));
}

#[test]
fn delete_missing_item_succeeds() {
    let dir = TempDir::new().unwrap();
    opsdeck(&dir)
        .args(["delete", "42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted #42"));
}

#[test]
fn rename_rejects_non_numeric_id() {
    let dir = TempDir::new().unwrap();
    opsdeck(&dir)
        .args(["rename", "abc", "New", "title"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid item id"));
}

// ---------------------------------------------------------------------------
// opsdeck status
// ---------------------------------------------------------------------------

#[test]
fn status_publishes_offline_flag() {
    let dir = TempDir::new().unwrap();
    let output = opsdeck(&dir)
        .args(["--json", "status", "agent", "Scanning", "sector", "7", "--offline"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["user_id"], "JARVIS");
    assert_eq!(json["status_text"], "Scanning sector 7");
    assert_eq!(json["is_online"], false);
}
