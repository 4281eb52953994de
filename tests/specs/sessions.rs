// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session index counting against a real transcript directory.

use tempfile::TempDir;
use tether_core::SessionId;
use tether_hub::EventHub;
use tether_sessions::{IndexConfig, MessageOrder, SessionIndex};

const SID: &str = "cafe0001-1111-4111-8111-aaaaaaaaaaaa";

#[tokio::test]
async fn counting_rules_applied_over_a_real_file() {
    let dir = TempDir::new().unwrap();
    let transcripts = dir.path().join("transcripts");
    std::fs::create_dir_all(&transcripts).unwrap();

    // (a) counted, (b) Caveat excluded, (c) tool-use-only excluded, (d) counted.
    let body = r#"{"type":"user","message":{"role":"user","content":"Hello"}}
{"type":"user","message":{"role":"user","content":"Caveat: local command output follows"}}
{"type":"assistant","message":{"role":"assistant","content":[{"type":"tool_use","id":"t1","name":"Bash","input":{"command":"ls"}}]}}
{"type":"assistant","message":{"role":"assistant","content":[{"type":"text","text":"hi"}]}}
"#;
    std::fs::write(transcripts.join(format!("{SID}.jsonl")), body).unwrap();

    let index = SessionIndex::open(
        IndexConfig::new(transcripts.clone(), dir.path().join("index.db")),
        EventHub::default(),
    )
    .unwrap();
    index.full_sync().unwrap();

    let sessions = index.list_sessions().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].message_count, 2);
    assert_eq!(sessions[0].summary.as_deref(), Some("Hello"));

    let page = index
        .get_messages(&SessionId::new(SID), 10, 0, MessageOrder::Asc)
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.messages[0].line_num, 1);
    assert_eq!(page.messages[1].line_num, 4);
    assert!(!page.has_more);
}
