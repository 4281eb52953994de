// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub events — the unit of broadcast.
//!
//! An event is immutable once published: the hub assigns the sequence
//! number and stamps the timestamp, after which subscribers only ever see
//! shared references. Payloads form a closed vocabulary; the `kind`
//! accessor is derived from the payload variant so the two can never
//! disagree.

use crate::block::{ContentBlock, MessageKind};
use crate::id::{SessionId, WorkspaceId};
use crate::prompt::{PromptKind, PromptOption};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Discriminator for the closed event vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AgentState,
    AgentLog,
    AgentMessage,
    PermissionRequest,
    PermissionResponse,
    Spinner,
    SessionInfo,
    SessionMessage,
    FileChanged,
    GitStatus,
    Error,
    Heartbeat,
    SubscriberEvicted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentState => "agent_state",
            Self::AgentLog => "agent_log",
            Self::AgentMessage => "agent_message",
            Self::PermissionRequest => "permission_request",
            Self::PermissionResponse => "permission_response",
            Self::Spinner => "spinner",
            Self::SessionInfo => "session_info",
            Self::SessionMessage => "session_message",
            Self::FileChanged => "file_changed",
            Self::GitStatus => "git_status",
            Self::Error => "error",
            Self::Heartbeat => "heartbeat",
            Self::SubscriberEvicted => "subscriber_evicted",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supervisor lifecycle state carried by `agent_state` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Stopped,
    Error,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which byte stream an `agent_log` line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
    Stdin,
}

/// Filesystem change classification for boundary `file_changed` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOp {
    Created,
    Modified,
    Removed,
    Renamed,
}

/// Normalized agent message, shared by `agent_message` and
/// `session_message` payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub is_context_compaction: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

/// Event payloads, keyed by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    AgentState {
        state: RunState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pid: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
    AgentLog {
        stream: LogStream,
        line: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parsed: Option<Value>,
    },
    AgentMessage(MessagePayload),
    PermissionRequest {
        // Named prompt_kind on the wire: `kind` is taken by the enum tag.
        prompt_kind: PromptKind,
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preview: Option<String>,
        options: Vec<PromptOption>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
    },
    PermissionResponse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
        response: String,
        #[serde(default)]
        is_error: bool,
    },
    Spinner {
        text: String,
        symbol: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
    },
    SessionInfo {
        session_id: SessionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_type: Option<String>,
    },
    SessionMessage(MessagePayload),
    FileChanged {
        path: String,
        op: FileOp,
    },
    GitStatus {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch: Option<String>,
        #[serde(default)]
        status: Value,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    Heartbeat {},
    SubscriberEvicted {
        subscriber_id: String,
        dropped: u64,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::AgentState { .. } => EventKind::AgentState,
            Self::AgentLog { .. } => EventKind::AgentLog,
            Self::AgentMessage(_) => EventKind::AgentMessage,
            Self::PermissionRequest { .. } => EventKind::PermissionRequest,
            Self::PermissionResponse { .. } => EventKind::PermissionResponse,
            Self::Spinner { .. } => EventKind::Spinner,
            Self::SessionInfo { .. } => EventKind::SessionInfo,
            Self::SessionMessage(_) => EventKind::SessionMessage,
            Self::FileChanged { .. } => EventKind::FileChanged,
            Self::GitStatus { .. } => EventKind::GitStatus,
            Self::Error { .. } => EventKind::Error,
            Self::Heartbeat {} => EventKind::Heartbeat,
            Self::SubscriberEvicted { .. } => EventKind::SubscriberEvicted,
        }
    }
}

/// Optional routing context attached to every event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<WorkspaceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
}

impl RouteContext {
    pub fn for_session(session_id: SessionId) -> Self {
        Self { session_id: Some(session_id), ..Self::default() }
    }
}

/// The unit of broadcast. Immutable after publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub context: RouteContext,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// Per-subscriber event filter, evaluated inside the hub before enqueue.
///
/// Empty sets accept everything for that dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub kinds: HashSet<EventKind>,
    pub workspace_ids: HashSet<WorkspaceId>,
    pub session_ids: HashSet<SessionId>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = EventKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    pub fn session(mut self, id: impl Into<SessionId>) -> Self {
        self.session_ids.insert(id.into());
        self
    }

    pub fn workspace(mut self, id: impl Into<WorkspaceId>) -> Self {
        self.workspace_ids.insert(id.into());
        self
    }

    pub fn accepts(&self, event: &Event) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind()) {
            return false;
        }
        if !self.workspace_ids.is_empty() {
            match &event.context.workspace_id {
                Some(id) if self.workspace_ids.contains(id) => {}
                _ => return false,
            }
        }
        if !self.session_ids.is_empty() {
            match &event.context.session_id {
                Some(id) if self.session_ids.contains(id) => {}
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
