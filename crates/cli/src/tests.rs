use super::*;
use std::io::Cursor;
use tempfile::tempdir;

fn open(dir: &std::path::Path, capacity: usize) -> Engine {
    let cfg = EngineConfig::new(dir)
        .with_capacity(capacity)
        .with_wal_sync(false);
    Engine::open(cfg).unwrap()
}

/// Runs `script` through the REPL and returns stdout without prompts or banner.
fn session(engine: &mut Engine, script: &str) -> Vec<String> {
    let mut out = Vec::new();
    run(engine, Cursor::new(script.as_bytes()), &mut out).unwrap();
    String::from_utf8(out)
        .unwrap()
        .replace("> ", "")
        .lines()
        .skip(2)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[test]
fn set_get_and_nil() {
    let dir = tempdir().unwrap();
    let mut engine = open(dir.path(), 100);
    let lines = session(&mut engine, "SET name Alice\nGET name\nGET nobody\nEXIT\n");
    assert_eq!(lines, vec!["OK", "Alice", "(nil)", "bye"]);
}

#[test]
fn set_value_keeps_inner_spaces() {
    let dir = tempdir().unwrap();
    let mut engine = open(dir.path(), 100);
    let lines = session(&mut engine, "set user:1 {\"name\": \"alice\",  \"age\": 25}\nget user:1\n");
    assert_eq!(lines[1], "{\"name\": \"alice\",  \"age\": 25}");
}

#[test]
fn usage_errors() {
    let dir = tempdir().unwrap();
    let mut engine = open(dir.path(), 100);
    let lines = session(&mut engine, "SET\nSET onlykey\nGET\nFROB x\n");
    assert_eq!(lines[0], "ERR usage: SET key value");
    assert_eq!(lines[1], "ERR usage: SET key value");
    assert_eq!(lines[2], "ERR usage: GET key");
    assert!(lines[3].starts_with("ERR unknown command: FROB"));
}

#[test]
fn flush_keys_and_stats() {
    let dir = tempdir().unwrap();
    let mut engine = open(dir.path(), 100);
    let lines = session(
        &mut engine,
        "KEYS\nSET b 2\nSET a 1\nKEYS\nFLUSH\nKEYS\nSTATS\nGET a\n",
    );
    assert_eq!(lines[0], "(empty memtable)");
    assert_eq!(&lines[3..6], ["a", "b", "(2 keys)"]);
    assert_eq!(lines[6], "OK (segments=1)");
    assert_eq!(lines[7], "(empty memtable)");
    assert!(lines.iter().any(|l| l.starts_with("segments:") && l.ends_with('1')));
    assert!(lines.iter().any(|l| l.contains("segment 1 (")));
    assert!(lines.contains(&"1".to_string()));
}

#[test]
fn end_of_input_closes_engine() {
    let dir = tempdir().unwrap();
    let mut engine = open(dir.path(), 100);
    let lines = session(&mut engine, "SET k v\n");
    assert_eq!(lines.last().map(String::as_str), Some("bye"));
    assert!(!engine.is_open());

    // The unflushed write is recovered from the WAL.
    let engine = open(dir.path(), 100);
    assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn quit_stops_reading() {
    let dir = tempdir().unwrap();
    let mut engine = open(dir.path(), 100);
    let lines = session(&mut engine, "QUIT\nSET k v\n");
    assert_eq!(lines, vec!["bye"]);
}
