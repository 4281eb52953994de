// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn string_content_becomes_single_text_block() {
    let blocks = ContentBlock::parse_content(&json!("Hello"));
    assert_eq!(blocks, vec![ContentBlock::Text { text: "Hello".into() }]);
}

#[test]
fn array_content_parses_tagged_blocks() {
    let blocks = ContentBlock::parse_content(&json!([
        {"type": "text", "text": "hi"},
        {"type": "thinking", "thinking": "hmm"},
        {"type": "tool_use", "id": "t1", "name": "Write", "input": {"file_path": "a.txt"}},
        {"type": "tool_result", "tool_use_id": "t1", "content": "ok", "is_error": false},
    ]));
    assert_eq!(blocks.len(), 4);
    assert!(blocks[0].is_text());
    assert!(blocks[1].is_thinking());
    assert!(blocks[2].is_tool_use());
    match &blocks[2] {
        ContentBlock::ToolUse { id, name, input } => {
            assert_eq!(id, "t1");
            assert_eq!(name, "Write");
            assert_eq!(input["file_path"], "a.txt");
        }
        other => panic!("expected tool_use, got {:?}", other),
    }
}

#[test]
fn unknown_block_type_is_preserved_verbatim() {
    let raw = json!({"type": "server_tool_use", "id": "x", "payload": {"a": 1}});
    let blocks = ContentBlock::parse_content(&json!([raw.clone()]));
    assert_eq!(blocks, vec![ContentBlock::Other(raw.clone())]);
    // Round-trips back to the original JSON
    assert_eq!(serde_json::to_value(&blocks[0]).unwrap(), raw);
}

#[test]
fn non_array_non_string_content_yields_nothing() {
    assert!(ContentBlock::parse_content(&json!(null)).is_empty());
    assert!(ContentBlock::parse_content(&json!(42)).is_empty());
    assert!(ContentBlock::parse_content(&json!({"type": "text"})).is_empty());
}

#[test]
fn message_kind_from_wire() {
    assert_eq!(MessageKind::from_wire("user"), MessageKind::User);
    assert_eq!(MessageKind::from_wire("assistant"), MessageKind::Assistant);
    assert_eq!(MessageKind::from_wire("system"), MessageKind::System);
    assert_eq!(MessageKind::from_wire("result"), MessageKind::Result);
    assert_eq!(MessageKind::from_wire("summary"), MessageKind::Other);
    assert_eq!(MessageKind::from_wire("file-history-snapshot"), MessageKind::Other);
}

#[test]
fn tool_result_defaults() {
    let block: ContentBlock = serde_json::from_value(json!({"type": "tool_result"})).unwrap();
    match block {
        ContentBlock::ToolResult { tool_use_id, content, is_error } => {
            assert!(tool_use_id.is_none());
            assert!(content.is_null());
            assert!(!is_error);
        }
        other => panic!("expected tool_result, got {:?}", other),
    }
}
