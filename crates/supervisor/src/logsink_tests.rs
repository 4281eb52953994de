// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn read(path: &std::path::Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

#[test]
fn appends_stdout_lines_verbatim() {
    let dir = TempDir::new().unwrap();
    let mut sink = LogSink::open(dir.path(), 123, LogRotation::default());
    sink.append_line(r#"{"type":"assistant"}"#);
    sink.append_line(r#"{"type":"result"}"#);
    let content = read(&dir.path().join("agent-123.jsonl"));
    assert_eq!(content, "{\"type\":\"assistant\"}\n{\"type\":\"result\"}\n");
}

#[test]
fn wraps_stderr_in_envelope() {
    let dir = TempDir::new().unwrap();
    let mut sink = LogSink::open(dir.path(), 7, LogRotation::default());
    sink.append_stderr("warning: deprecated flag");
    let content = read(&dir.path().join("agent-7.jsonl"));
    let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
    assert_eq!(parsed["_type"], "stderr");
    assert_eq!(parsed["_content"], "warning: deprecated flag");
    assert!(parsed["_timestamp"].is_string());
}

#[test]
fn rotates_when_size_cap_is_reached() {
    let dir = TempDir::new().unwrap();
    let rotation = LogRotation { max_bytes: 64, backups: 2 };
    let mut sink = LogSink::open(dir.path(), 9, rotation);
    let line = "x".repeat(40);
    sink.append_line(&line); // 41 bytes
    sink.append_line(&line); // would cross 64 → rotate first
    sink.append_line(&line); // rotates again

    let active = dir.path().join("agent-9.jsonl");
    let backup1 = dir.path().join("agent-9.jsonl.1");
    let backup2 = dir.path().join("agent-9.jsonl.2");
    assert!(active.exists());
    assert!(backup1.exists());
    assert!(backup2.exists());
    assert_eq!(read(&active).len(), 41);
}

#[test]
fn bounded_number_of_backups() {
    let dir = TempDir::new().unwrap();
    let rotation = LogRotation { max_bytes: 16, backups: 1 };
    let mut sink = LogSink::open(dir.path(), 1, rotation);
    for _ in 0..5 {
        sink.append_line("0123456789abcdef");
    }
    assert!(dir.path().join("agent-1.jsonl").exists());
    assert!(dir.path().join("agent-1.jsonl.1").exists());
    assert!(!dir.path().join("agent-1.jsonl.2").exists());
}

#[test]
fn unwritable_directory_disables_sink_quietly() {
    let mut sink = LogSink::open(std::path::Path::new("/dev/null/nope"), 1, LogRotation::default());
    // Must not panic or error — the sink just goes dark.
    sink.append_line("dropped");
    sink.append_stderr("dropped");
}
