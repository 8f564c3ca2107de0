/// End-to-end tests driving the real `cli` binary through stdin.
/// Tests cover: basic ops, capacity flushes, restarts, configuration errors.
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::tempdir;

/// Runs the CLI against `db_dir` with `capacity`, feeding `commands` on stdin.
fn run_cli(db_dir: &Path, capacity: &str, commands: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_cli"))
        .env("LSMKV_DB_DIR", db_dir)
        .env("LSMKV_CAPACITY", capacity)
        .env("LSMKV_WAL_SYNC", "true")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn cli");

    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(commands.as_bytes())
        .expect("failed to write commands");

    child.wait_with_output().expect("failed to read output")
}

fn stdout_of(db_dir: &Path, capacity: &str, commands: &str) -> String {
    let output = run_cli(db_dir, capacity, commands);
    assert!(output.status.success(), "cli failed: {:?}", output);
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_basic_set_get() {
    let dir = tempdir().unwrap();
    let out = stdout_of(dir.path(), "100", "SET key1 value1\nGET key1\nEXIT\n");

    assert!(out.contains("OK"));
    assert!(out.contains("value1"));
    assert!(out.trim_end().ends_with("bye"));
}

#[test]
fn test_missing_key_prints_nil() {
    let dir = tempdir().unwrap();
    let out = stdout_of(dir.path(), "100", "GET ghost\n");
    assert!(out.contains("(nil)"));
}

#[test]
fn test_capacity_flush_creates_segment() {
    let dir = tempdir().unwrap();
    let out = stdout_of(dir.path(), "2", "SET a 1\nSET b 2\nSET c 3\nSTATS\nGET a\n");

    assert!(out.contains("memtable entries: 1"));
    assert!(out.contains("segments:         1"));
    assert!(dir.path().join("sst-00000000000000000001.sst").exists());
    assert!(dir.path().join("sst-00000000000000000001.index").exists());
}

#[test]
fn test_restart_recovers_wal_and_segments() {
    let dir = tempdir().unwrap();
    stdout_of(dir.path(), "100", "SET flushed yes\nFLUSH\nSET pending also yes\nQUIT\n");

    let out = stdout_of(dir.path(), "100", "GET flushed\nGET pending\nKEYS\n");
    assert!(out.contains("yes"));
    assert!(out.contains("also yes"));
    assert!(out.contains("(1 keys)"));
    assert!(out.contains("segments=1"));
}

#[test]
fn test_newest_value_wins_across_restarts() {
    let dir = tempdir().unwrap();
    stdout_of(dir.path(), "100", "SET k v1\nFLUSH\n");
    stdout_of(dir.path(), "100", "SET k v2\nFLUSH\n");

    let out = stdout_of(dir.path(), "100", "GET k\n");
    assert!(out.contains("v2"));
    assert!(!out.contains("v1"));
}

#[test]
fn test_invalid_config_fails_to_start() {
    let dir = tempdir().unwrap();
    let output = run_cli(dir.path(), "0", "EXIT\n");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("capacity"), "stderr: {}", stderr);
}

#[test]
fn test_many_keys_survive_multiple_flushes() {
    let dir = tempdir().unwrap();
    let mut script = String::new();
    for i in 0..250 {
        script.push_str(&format!("SET key{:03} value{}\n", i, i));
    }
    stdout_of(dir.path(), "50", &script);

    let mut gets = String::new();
    for i in (0..250).step_by(17) {
        gets.push_str(&format!("GET key{:03}\n", i));
    }
    let out = stdout_of(dir.path(), "50", &gets);
    for i in (0..250).step_by(17) {
        assert!(out.contains(&format!("value{}\n", i)), "missing value{}", i);
    }
    assert!(out.contains("segments=5"));
}
