//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run with HOME pointed at a temp dir,
//! so every test gets its own data directory.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-q", "-p", "focusync-cli", "--"])
        .args(args)
        .env("HOME", home)
        .env_remove("FOCUSYNC_ENV")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

#[test]
fn test_queue_enqueue_dedupes_by_entity() {
    let home = TempDir::new().unwrap();
    let (_, _, code) = run_cli(
        home.path(),
        &["queue", "enqueue", "create", "task", "task-a", "--payload", r#"{"title":"A"}"#],
    );
    assert_eq!(code, 0, "enqueue create failed");
    let (_, _, code) = run_cli(
        home.path(),
        &["queue", "enqueue", "update", "task", "task-a", "--payload", r#"{"title":"B"}"#],
    );
    assert_eq!(code, 0, "enqueue update failed");

    let (stdout, _, code) = run_cli(home.path(), &["queue", "list", "--json"]);
    assert_eq!(code, 0);
    let ops: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let ops = ops.as_array().unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0]["type"], "update");
    assert_eq!(ops[0]["payload"]["title"], "B");
    assert_eq!(ops[0]["payload"]["id"], "task-a");

    assert!(home
        .path()
        .join(".config/focusync/pending_sync_queue.json")
        .exists());
}

#[test]
fn test_queue_remove_and_clear() {
    let home = TempDir::new().unwrap();
    run_cli(home.path(), &["queue", "enqueue", "delete", "goal", "g-1"]);
    run_cli(home.path(), &["queue", "enqueue", "delete", "goal", "g-2"]);

    let (stdout, _, code) = run_cli(home.path(), &["queue", "remove", "g-1"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("removed 1"));

    let (_, _, code) = run_cli(home.path(), &["queue", "clear"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(home.path(), &["queue", "list"]);
    assert!(stdout.contains("queue is empty"));
}

#[test]
fn test_enqueue_rejects_unknown_entity_type() {
    let home = TempDir::new().unwrap();
    let (_, _, code) = run_cli(home.path(), &["queue", "enqueue", "create", "invoice", "i-1"]);
    assert_ne!(code, 0);
}

#[test]
fn test_config_set_and_get() {
    let home = TempDir::new().unwrap();
    let (_, _, code) = run_cli(home.path(), &["config", "set", "sync.max_retry_attempts", "3"]);
    assert_eq!(code, 0);
    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "sync.max_retry_attempts"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "3");

    let (_, _, code) = run_cli(home.path(), &["config", "get", "sync.nope"]);
    assert_ne!(code, 0);
}

#[test]
fn test_backoff_schedule() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["backoff"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("after failure 1: retry in 1s"));
    assert!(stdout.contains("after failure 4: retry in 10s"));
    assert!(stdout.contains("after failure 5: dropped"));
}

#[test]
fn test_failed_list_empty() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["failed", "list", "--json"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "[]");
}

#[test]
fn test_sync_requires_remote() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["sync", "run"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("not configured"));

    let (stdout, _, code) = run_cli(home.path(), &["sync", "status"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("remote: not configured"));
    assert!(stdout.contains("last sync: never"));
}

#[test]
fn test_sync_status_needs_sync_before_first_sync() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["sync", "status", "--json"]);
    assert_eq!(code, 0);
    let status: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(status["pending_count"], 0);
    assert!(status["last_successful_sync"].is_null());
    assert_eq!(status["needs_sync"], true);
}

#[test]
fn test_enqueue_reports_after_persisting() {
    let home = TempDir::new().unwrap();
    // A directory in place of the temp file makes the queue write fail.
    let data_dir = home.path().join(".config/focusync");
    std::fs::create_dir_all(data_dir.join("pending_sync_queue.json.tmp")).unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["queue", "enqueue", "delete", "goal", "g-1"]);
    assert_ne!(code, 0);
    assert!(!stdout.contains("queued"));
    std::fs::remove_dir(data_dir.join("pending_sync_queue.json.tmp")).unwrap();

    let (stdout, _, code) = run_cli(home.path(), &["queue", "enqueue", "delete", "goal", "g-1"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("queued delete goal g-1"));
}
