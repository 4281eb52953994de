// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipe-mode JSON classification, end to end through the hub.

use tether_core::{EventKind, EventPayload, PromptKind};
use tether_hub::{EventHub, Subscriber};
use tether_supervisor::classify::PipeClassifier;

#[test]
fn single_tool_use_line_fans_out_as_four_events() {
    let hub = EventHub::default();
    let mut sub = hub.subscribe(Subscriber::new("phone"));
    let mut classifier = PipeClassifier::new(hub, None, Some("claude".to_string()));

    classifier.handle_stdout_line(
        r#"{"type":"assistant","session_id":"S1","message":{"content":[{"type":"tool_use","id":"t1","name":"Write","input":{"file_path":"a.txt"}}],"stop_reason":"tool_use"}}"#,
    );

    let mut events = Vec::new();
    while let Ok(ev) = sub.events.try_recv() {
        events.push(ev);
    }
    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::AgentLog,
            EventKind::SessionInfo,
            EventKind::AgentMessage,
            EventKind::PermissionRequest,
        ]
    );

    // Sequences are strictly increasing across the fan-out.
    assert!(events.windows(2).all(|w| w[0].sequence < w[1].sequence));

    match &events[3].payload {
        EventPayload::PermissionRequest { prompt_kind, target, description, .. } => {
            assert_eq!(*prompt_kind, PromptKind::WriteFile);
            assert_eq!(target, "a.txt");
            assert_eq!(description.as_deref(), Some("Write to file: a.txt"));
        }
        other => panic!("expected permission_request, got {other:?}"),
    }
    match &events[1].payload {
        EventPayload::SessionInfo { session_id, .. } => assert_eq!(session_id.as_str(), "S1"),
        other => panic!("expected session_info, got {other:?}"),
    }
}
