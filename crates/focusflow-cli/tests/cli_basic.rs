//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify its JSON output.

use std::path::Path;
use std::process::Command;

use focusflow_core::Database;
use serde_json::Value;
use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_focusflow"))
        .env("FOCUSFLOW_DATA_DIR", data_dir)
        .env_remove("FOCUSFLOW_LOG")
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_ok(data_dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    stdout
}

/// Parse a stream of pretty-printed JSON documents.
fn json_docs(stdout: &str) -> Vec<Value> {
    serde_json::Deserializer::from_str(stdout)
        .into_iter::<Value>()
        .collect::<Result<_, _>>()
        .expect("stdout is not a JSON stream")
}

fn last_doc(stdout: &str) -> Value {
    json_docs(stdout).pop().expect("no JSON output")
}

#[test]
fn test_config_defaults_and_set() {
    let dir = TempDir::new().unwrap();
    let list = run_ok(dir.path(), &["config", "list"]);
    assert!(list.contains("focus.focus_minutes = 25"), "{list}");
    assert!(list.contains("rewards.rules = flat"), "{list}");

    run_ok(dir.path(), &["config", "set", "focus.focus_minutes", "50"]);
    assert_eq!(
        run_ok(dir.path(), &["config", "get", "focus.focus_minutes"]).trim(),
        "50"
    );
    assert!(dir.path().join("config.toml").exists());
}

#[test]
fn test_config_rejects_bad_values() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["config", "set", "focus.short_break_minutes", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"), "{stderr}");

    let (_, _, code) = run_cli(dir.path(), &["config", "get", "focus.nope"]);
    assert_eq!(code, 1);
}

#[test]
fn test_focus_start_pause_status() {
    let dir = TempDir::new().unwrap();
    let started = last_doc(&run_ok(dir.path(), &["focus", "start"]));
    assert_eq!(started["type"], "TimerStarted");
    assert_eq!(started["phase"], "focus");
    assert_eq!(started["duration_secs"], 1500);

    let status = last_doc(&run_ok(dir.path(), &["focus", "status"]));
    assert_eq!(status["status"], "running");
    assert!(status["progress"].as_f64().unwrap() < 0.1, "{status}");

    let paused = last_doc(&run_ok(dir.path(), &["focus", "pause"]));
    assert_eq!(paused["type"], "TimerPaused");

    let snapshot: Value = serde_json::from_slice(
        &std::fs::read(dir.path().join("shared").join("session.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(snapshot["phase"], "focus");
    assert_eq!(snapshot["isRunning"], false);
    assert_eq!(snapshot["endInstant"], Value::Null);
}

fn saved_state(data_dir: &Path) -> Option<String> {
    Database::open_at(&data_dir.join("focusflow.db"))
        .unwrap()
        .kv_get("session_state")
        .unwrap()
}

#[test]
fn test_reset_session_leaves_no_saved_state() {
    let dir = TempDir::new().unwrap();
    run_ok(dir.path(), &["focus", "start"]);
    run_ok(dir.path(), &["run", "start"]);
    assert!(saved_state(dir.path()).is_some());

    run_ok(dir.path(), &["focus", "reset"]);
    // The run still needs saving.
    assert!(saved_state(dir.path()).is_some());

    run_ok(dir.path(), &["run", "reset"]);
    assert!(saved_state(dir.path()).is_none());

    let status = last_doc(&run_ok(dir.path(), &["focus", "status"]));
    assert_eq!(status["status"], "idle");
    assert_eq!(status["completed_focus_count"], 0);
}

#[test]
fn test_focus_complete_earns_energy() {
    let dir = TempDir::new().unwrap();
    run_ok(dir.path(), &["focus", "start"]);
    let docs = json_docs(&run_ok(dir.path(), &["focus", "complete"]));
    assert_eq!(docs[0]["type"], "PhaseCompleted");
    assert_eq!(docs[0]["next"], "short_break");
    assert_eq!(docs[1]["type"], "EnergyGained");

    let balance = last_doc(&run_ok(dir.path(), &["energy", "balance"]));
    assert_eq!(balance["balance"], 1);
    assert_eq!(balance["game_unlocked"], true);

    let history = last_doc(&run_ok(dir.path(), &["history"]));
    assert_eq!(history["stats"]["pomodoros"], 1);
    assert_eq!(history["records"][0]["kind"], "pomodoro");
}

#[test]
fn test_short_run_is_not_credited() {
    let dir = TempDir::new().unwrap();
    run_ok(dir.path(), &["run", "start"]);
    let stopped = last_doc(&run_ok(dir.path(), &["run", "stop"]));
    assert_eq!(stopped["type"], "RunStopped");
    assert_eq!(stopped["credited"], false);

    let balance = last_doc(&run_ok(dir.path(), &["energy", "balance"]));
    assert_eq!(balance["balance"], 0);
    assert_eq!(balance["game_unlocked"], false);
}

#[test]
fn test_game_is_gated_by_energy() {
    let dir = TempDir::new().unwrap();
    let (stdout, stderr, code) = run_cli(dir.path(), &["game", "enter"]);
    assert_eq!(code, 0);
    assert_eq!(last_doc(&stdout)["status"], "locked");
    assert!(stderr.contains("game locked"), "{stderr}");

    run_ok(dir.path(), &["energy", "refund", "1"]);
    let entry = last_doc(&run_ok(dir.path(), &["game", "enter"]));
    assert_eq!(entry["status"], "granted");
    assert_eq!(entry["balance"], 0);

    let finished = last_doc(&run_ok(
        dir.path(),
        &["game", "finish", "--score", "512", "--seconds", "40"],
    ));
    assert_eq!(finished["type"], "GameFinished");

    let history = last_doc(&run_ok(dir.path(), &["history", "--limit", "5"]));
    assert_eq!(history["records"][0]["kind"], "game");
    assert_eq!(history["records"][0]["score"], 512);
}

#[test]
fn test_spend_without_balance_is_refused() {
    let dir = TempDir::new().unwrap();
    let result = last_doc(&run_ok(dir.path(), &["energy", "spend", "2"]));
    assert_eq!(result["spent"], false);

    let (_, _, code) = run_cli(dir.path(), &["energy", "spend", "0"]);
    assert_ne!(code, 0);
}
