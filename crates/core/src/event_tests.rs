// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use yare::parameterized;

fn event(payload: EventPayload, context: RouteContext) -> Event {
    Event {
        sequence: 7,
        timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single().unwrap(),
        context,
        payload,
    }
}

#[parameterized(
    agent_state = { EventPayload::AgentState { state: RunState::Idle, prompt: None, pid: None, exit_code: None, error_message: None }, "agent_state" },
    heartbeat = { EventPayload::Heartbeat {}, "heartbeat" },
    error = { EventPayload::Error { message: "boom".into(), source: None }, "error" },
    evicted = { EventPayload::SubscriberEvicted { subscriber_id: "s".into(), dropped: 2048 }, "subscriber_evicted" },
)]
fn payload_kind_matches_wire_tag(payload: EventPayload, expected: &str) {
    assert_eq!(payload.kind().as_str(), expected);
    let ev = event(payload, RouteContext::default());
    let v = serde_json::to_value(&ev).unwrap();
    assert_eq!(v["kind"], expected);
    assert_eq!(v["sequence"], 7);
}

#[test]
fn event_round_trips_through_json() {
    let ev = event(
        EventPayload::SessionInfo {
            session_id: SessionId::new("s1"),
            agent_type: Some("claude".into()),
        },
        RouteContext::for_session(SessionId::new("s1")),
    );
    let json = serde_json::to_string(&ev).unwrap();
    let back: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ev);
}

#[test]
fn permission_request_serializes_prompt_fields() {
    let ev = event(
        EventPayload::PermissionRequest {
            prompt_kind: crate::PromptKind::WriteFile,
            target: "a.txt".into(),
            preview: None,
            options: vec![],
            description: Some("Write to file: a.txt".into()),
            session_id: None,
            tool_use_id: Some("t1".into()),
            tool_name: Some("Write".into()),
        },
        RouteContext::default(),
    );
    let v = serde_json::to_value(&ev).unwrap();
    assert_eq!(v["kind"], "permission_request");
    assert_eq!(v["prompt_kind"], "write_file");
    assert_eq!(v["target"], "a.txt");
    assert_eq!(v["description"], "Write to file: a.txt");
}

#[test]
fn empty_filter_accepts_everything() {
    let filter = EventFilter::all();
    let ev = event(EventPayload::Heartbeat {}, RouteContext::default());
    assert!(filter.accepts(&ev));
}

#[test]
fn kind_filter_rejects_other_kinds() {
    let filter = EventFilter::all().kinds([EventKind::Spinner, EventKind::AgentState]);
    let spinner = event(
        EventPayload::Spinner {
            text: "✻ Thinking…".into(),
            symbol: "✻".into(),
            message: "Thinking…".into(),
            session_id: None,
        },
        RouteContext::default(),
    );
    let heartbeat = event(EventPayload::Heartbeat {}, RouteContext::default());
    assert!(filter.accepts(&spinner));
    assert!(!filter.accepts(&heartbeat));
}

#[test]
fn session_filter_requires_matching_context() {
    let filter = EventFilter::all().session("s1");
    let matching = event(
        EventPayload::Heartbeat {},
        RouteContext::for_session(SessionId::new("s1")),
    );
    let other = event(
        EventPayload::Heartbeat {},
        RouteContext::for_session(SessionId::new("s2")),
    );
    let missing = event(EventPayload::Heartbeat {}, RouteContext::default());
    assert!(filter.accepts(&matching));
    assert!(!filter.accepts(&other));
    assert!(!filter.accepts(&missing), "events without context never match a scoped filter");
}

#[test]
fn workspace_filter_composes_with_kind_filter() {
    let filter = EventFilter::all().kinds([EventKind::Heartbeat]).workspace("w1");
    let ok = event(
        EventPayload::Heartbeat {},
        RouteContext {
            workspace_id: Some(WorkspaceId::new("w1")),
            ..RouteContext::default()
        },
    );
    let wrong_kind = event(
        EventPayload::Error { message: "x".into(), source: None },
        RouteContext { workspace_id: Some(WorkspaceId::new("w1")), ..RouteContext::default() },
    );
    assert!(filter.accepts(&ok));
    assert!(!filter.accepts(&wrong_kind));
}
