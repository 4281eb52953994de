// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipe-mode stdout classification.
//!
//! Every stdout line is attempted as JSON in the agent's stream format.
//! Lines that parse produce an `agent_log` event with the parsed body,
//! then an `agent_message` for user/assistant/result messages, then
//! `permission_request` events for tool uses that need approval — in
//! that order, always. Lines that do not parse still produce the
//! `agent_log`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tether_core::{
    ContentBlock, EventPayload, LogStream, MessageKind, MessagePayload, PromptKind, RouteContext,
    SessionId, WorkspaceId, COMPACTION_PREFIX, COMPACT_BOUNDARY_SUBTYPE,
};
use tether_hub::EventHub;

/// Tools that pose an in-band question rather than request a permission.
const INTERACTIVE_QUESTION_TOOLS: &[&str] = &["AskUserQuestion", "ExitPlanMode"];

/// Tools whose use is announced as a permission request.
const PERMISSION_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit", "NotebookEdit", "Bash"];

/// State changes a classified line implies for the agent instance.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LineEffects {
    /// Session id captured from this line (first line that carries one).
    pub session_id: Option<SessionId>,
    /// `Some(true)` when the agent now waits for a tool response;
    /// `Some(false)` when a user message acknowledged one.
    pub waiting_for_input: Option<bool>,
    /// Tool-use id and name the agent is waiting on.
    pub pending_tool: Option<(String, String)>,
    /// The line carried thinking content.
    pub is_thinking: bool,
}

/// Per-run classifier for the agent's stream-json stdout.
pub struct PipeClassifier {
    hub: EventHub,
    workspace_id: Option<WorkspaceId>,
    agent_type: Option<String>,
    session_id: Option<SessionId>,
    announced_session: bool,
}

impl PipeClassifier {
    pub fn new(hub: EventHub, workspace_id: Option<WorkspaceId>, agent_type: Option<String>) -> Self {
        Self { hub, workspace_id, agent_type, session_id: None, announced_session: false }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    fn context(&self) -> RouteContext {
        RouteContext {
            workspace_id: self.workspace_id.clone(),
            session_id: self.session_id.clone(),
            agent_type: self.agent_type.clone(),
        }
    }

    /// Classify one stdout line, publishing derived events.
    pub fn handle_stdout_line(&mut self, line: &str) -> LineEffects {
        let mut effects = LineEffects::default();
        let parsed: Option<Value> = serde_json::from_str(line).ok();

        let Some(body) = parsed else {
            self.hub.publish(
                EventPayload::AgentLog {
                    stream: LogStream::Stdout,
                    line: line.to_string(),
                    parsed: None,
                },
                self.context(),
            );
            return effects;
        };

        // Capture the session id from the first message that carries one.
        if self.session_id.is_none() {
            if let Some(sid) = body.get("session_id").and_then(Value::as_str) {
                let sid = SessionId::new(sid);
                self.session_id = Some(sid.clone());
                effects.session_id = Some(sid);
            }
        }

        self.hub.publish(
            EventPayload::AgentLog {
                stream: LogStream::Stdout,
                line: line.to_string(),
                parsed: Some(body.clone()),
            },
            self.context(),
        );

        if !self.announced_session {
            if let Some(sid) = self.session_id.clone() {
                self.announced_session = true;
                self.hub.publish(
                    EventPayload::SessionInfo { session_id: sid, agent_type: self.agent_type.clone() },
                    self.context(),
                );
            }
        }

        let kind = body
            .get("type")
            .and_then(Value::as_str)
            .map(MessageKind::from_wire)
            .unwrap_or(MessageKind::Other);

        let message = body.get("message").unwrap_or(&Value::Null);
        let content = ContentBlock::parse_content(message.get("content").unwrap_or(&Value::Null));
        effects.is_thinking = is_thinking(&content);

        if matches!(kind, MessageKind::User | MessageKind::Assistant | MessageKind::Result) {
            let payload = MessagePayload {
                session_id: self.session_id.clone(),
                kind,
                role: message.get("role").and_then(Value::as_str).map(str::to_string),
                content: content.clone(),
                stop_reason: message
                    .get("stop_reason")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                is_context_compaction: is_context_compaction(&body, &content),
                model: message.get("model").and_then(Value::as_str).map(str::to_string),
                usage: body.get("usage").cloned().filter(|v| !v.is_null()),
                cost_usd: body.get("costUsd").and_then(Value::as_f64),
                duration_ms: body.get("duration_ms").and_then(Value::as_u64),
                timestamp: line_timestamp(&body),
            };
            self.hub.publish(EventPayload::AgentMessage(payload), self.context());
        }

        let stop_reason = message.get("stop_reason").and_then(Value::as_str);
        if kind == MessageKind::Assistant && stop_reason == Some("tool_use") {
            for block in &content {
                let ContentBlock::ToolUse { id, name, input } = block else {
                    continue;
                };
                if INTERACTIVE_QUESTION_TOOLS.contains(&name.as_str()) {
                    effects.waiting_for_input = Some(true);
                    effects.pending_tool = Some((id.clone(), name.clone()));
                    self.hub.publish(
                        EventPayload::PermissionRequest {
                            prompt_kind: PromptKind::Question,
                            target: question_target(name, input),
                            preview: None,
                            options: Vec::new(),
                            description: Some(format!("Agent question via {name}")),
                            session_id: self.session_id.clone(),
                            tool_use_id: Some(id.clone()),
                            tool_name: Some(name.clone()),
                        },
                        self.context(),
                    );
                } else if PERMISSION_TOOLS.contains(&name.as_str()) || name.starts_with("mcp__") {
                    let (prompt_kind, target, description) = describe_tool(name, input);
                    self.hub.publish(
                        EventPayload::PermissionRequest {
                            prompt_kind,
                            target,
                            preview: None,
                            options: Vec::new(),
                            description: Some(description),
                            session_id: self.session_id.clone(),
                            tool_use_id: Some(id.clone()),
                            tool_name: Some(name.clone()),
                        },
                        self.context(),
                    );
                }
            }
        }

        if kind == MessageKind::User {
            // The agent echoes the tool response as a user message.
            effects.waiting_for_input = Some(false);
        }

        effects
    }

    /// Stderr is never parsed as JSON.
    pub fn handle_stderr_line(&mut self, line: &str) {
        self.hub.publish(
            EventPayload::AgentLog {
                stream: LogStream::Stderr,
                line: line.to_string(),
                parsed: None,
            },
            self.context(),
        );
    }
}

fn line_timestamp(body: &Value) -> DateTime<Utc> {
    body.get("timestamp")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

fn is_thinking(content: &[ContentBlock]) -> bool {
    content.iter().any(|b| {
        b.is_thinking() || b.text().is_some_and(|t| t.contains("<thinking>"))
    })
}

/// Compaction is marked either by a `system/compact_boundary` message or
/// by the continuation `user` message carrying the fixed prefix.
fn is_context_compaction(body: &Value, content: &[ContentBlock]) -> bool {
    let kind = body.get("type").and_then(Value::as_str);
    if kind == Some("system") {
        return body.get("subtype").and_then(Value::as_str) == Some(COMPACT_BOUNDARY_SUBTYPE);
    }
    if kind == Some("user") && body.get("userType").and_then(Value::as_str) == Some("external") {
        return content
            .first()
            .and_then(ContentBlock::text)
            .is_some_and(|t| t.starts_with(COMPACTION_PREFIX));
    }
    false
}

fn question_target(name: &str, input: &Value) -> String {
    match name {
        "AskUserQuestion" => input
            .get("question")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// Human-readable classification of a permission-seeking tool use.
pub fn describe_tool(name: &str, input: &Value) -> (PromptKind, String, String) {
    let path = || {
        input
            .get("file_path")
            .or_else(|| input.get("notebook_path"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    match name {
        "Write" => {
            let p = path();
            (PromptKind::WriteFile, p.clone(), format!("Write to file: {p}"))
        }
        "Edit" | "MultiEdit" | "NotebookEdit" => {
            let p = path();
            (PromptKind::EditFile, p.clone(), format!("Edit file: {p}"))
        }
        "Bash" => {
            let cmd = input
                .get("command")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            (PromptKind::BashCommand, cmd.clone(), format!("Run command: {cmd}"))
        }
        mcp if mcp.starts_with("mcp__") => {
            (PromptKind::McpTool, mcp.to_string(), format!("Use MCP tool: {mcp}"))
        }
        other => (PromptKind::Unknown, String::new(), format!("Use tool: {other}")),
    }
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
