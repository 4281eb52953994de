// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write as _;
use tether_core::EventKind;
use tether_hub::{Subscriber, SubscriberHandle};
use tempfile::TempDir;

fn harness(initial: &str) -> (Tail, SubscriberHandle, TempDir) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.jsonl");
    std::fs::write(&path, initial).unwrap();
    let hub = EventHub::default();
    let handle = hub.subscribe(Subscriber::new("t"));
    let mut tail = Tail {
        hub,
        session_id: SessionId::new("s1"),
        path,
        offset: 0,
    };
    tail.offset = tail.current_size();
    (tail, handle, dir)
}

fn append(tail: &Tail, content: &str) {
    let mut file = std::fs::OpenOptions::new().append(true).open(&tail.path).unwrap();
    write!(file, "{content}").unwrap();
}

fn drain_messages(handle: &mut SubscriberHandle) -> Vec<tether_core::MessagePayload> {
    let mut out = Vec::new();
    while let Ok(ev) = handle.events.try_recv() {
        if let EventPayload::SessionMessage(payload) = &ev.payload {
            out.push(payload.clone());
        }
    }
    out
}

#[tokio::test]
async fn starts_past_existing_content() {
    let (mut tail, mut handle, _dir) =
        harness("{\"type\":\"user\",\"message\":{\"content\":\"old\"}}\n");
    tail.drain_new_lines();
    assert!(drain_messages(&mut handle).is_empty(), "history is not replayed");
}

#[tokio::test]
async fn publishes_appended_lines() {
    let (mut tail, mut handle, _dir) = harness("");
    append(&tail, "{\"type\":\"user\",\"message\":{\"content\":\"hello\"}}\n");
    append(
        &tail,
        "{\"type\":\"assistant\",\"message\":{\"content\":[{\"type\":\"text\",\"text\":\"hi\"}]}}\n",
    );
    tail.drain_new_lines();

    let messages = drain_messages(&mut handle);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].kind, tether_core::MessageKind::User);
    assert_eq!(messages[1].kind, tether_core::MessageKind::Assistant);
    assert_eq!(messages[0].session_id.as_ref().map(|s| s.as_str()), Some("s1"));
}

#[tokio::test]
async fn partial_trailing_line_waits_for_its_newline() {
    let (mut tail, mut handle, _dir) = harness("");
    append(&tail, "{\"type\":\"user\",\"message\":{\"content\":\"partial");
    tail.drain_new_lines();
    assert!(drain_messages(&mut handle).is_empty());
    let offset_before = tail.offset;

    append(&tail, "\"}}\n");
    tail.drain_new_lines();
    let messages = drain_messages(&mut handle);
    assert_eq!(messages.len(), 1);
    assert!(tail.offset > offset_before);
}

#[tokio::test]
async fn offset_only_advances_past_consumed_lines() {
    let (mut tail, mut handle, _dir) = harness("");
    append(&tail, "{\"type\":\"user\",\"message\":{\"content\":\"a\"}}\n");
    tail.drain_new_lines();
    let after_first = tail.offset;

    // Draining again with no new content is a no-op.
    tail.drain_new_lines();
    assert_eq!(tail.offset, after_first);
    drain_messages(&mut handle);

    append(&tail, "{\"type\":\"user\",\"message\":{\"content\":\"b\"}}\n");
    tail.drain_new_lines();
    assert_eq!(drain_messages(&mut handle).len(), 1);
}

#[tokio::test]
async fn unindexed_lines_are_skipped_but_consumed() {
    let (mut tail, mut handle, _dir) = harness("");
    append(&tail, "not json\n{\"type\":\"summary\",\"summary\":\"x\"}\n");
    tail.drain_new_lines();
    assert!(drain_messages(&mut handle).is_empty());
    assert_eq!(tail.offset, tail.current_size(), "skipped lines still advance the offset");
}

#[tokio::test]
async fn spawn_and_stop_lifecycle() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.jsonl");
    std::fs::write(&path, "").unwrap();
    let hub = EventHub::default();
    let handle = spawn(
        hub,
        SessionId::new("s1"),
        path,
        CancellationToken::new(),
        Duration::from_millis(200),
    );
    assert_eq!(handle.session_id.as_str(), "s1");
    handle.stop();
}
