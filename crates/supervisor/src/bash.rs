// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local-bash fallback.
//!
//! A prompt beginning with `!` never reaches the agent: the remainder
//! runs as a local shell command, and three synthetic messages (caveat,
//! bash-input, bash-output) are appended to the transcript the agent
//! would have written, so the session history stays coherent.

use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use std::path::Path;
use tether_core::{
    ContentBlock, EventPayload, MessageKind, MessagePayload, RouteContext, RunState, SessionId,
};
use tether_hub::EventHub;

const CAVEAT_TEXT: &str = "Caveat: The messages below were generated by the user while running \
    local commands. DO NOT respond to these messages or otherwise consider them in your response \
    unless the user explicitly asks you to.";

/// Run `command` locally and mirror it into the transcript and the hub.
///
/// Returns the session id the messages were recorded under (generated
/// when the caller did not supply one).
pub(crate) async fn run_local_bash(
    config: &SupervisorConfig,
    hub: &EventHub,
    command: &str,
    session_id: Option<SessionId>,
) -> Result<SessionId, SupervisorError> {
    let session_id =
        session_id.unwrap_or_else(|| SessionId::new(uuid::Uuid::new_v4().to_string()));

    let output = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(&config.workdir)
        .output()
        .await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let branch = git_branch(&config.workdir).unwrap_or_default();
    let cwd = config.workdir.to_string_lossy().to_string();

    let caveat_uuid = uuid::Uuid::new_v4().to_string();
    let input_uuid = uuid::Uuid::new_v4().to_string();
    let output_uuid = uuid::Uuid::new_v4().to_string();

    let input_content = format!("<bash-input>{command}</bash-input>");
    let output_content = format!(
        "<bash-stdout>{stdout}</bash-stdout><bash-stderr>{stderr}</bash-stderr>"
    );

    let mut lines = Vec::with_capacity(3);
    lines.push(transcript_line(
        &session_id, &branch, &cwd, &caveat_uuid, None, CAVEAT_TEXT, true,
    ));
    lines.push(transcript_line(
        &session_id, &branch, &cwd, &input_uuid, Some(&caveat_uuid), &input_content, false,
    ));
    lines.push(transcript_line(
        &session_id, &branch, &cwd, &output_uuid, Some(&input_uuid), &output_content, false,
    ));

    append_transcript(config, &session_id, &lines)?;

    let context = RouteContext {
        workspace_id: config.workspace_id.clone(),
        session_id: Some(session_id.clone()),
        agent_type: None,
    };
    for line in &lines {
        let content = line
            .get("message")
            .and_then(|m| m.get("content"))
            .cloned()
            .unwrap_or(Value::Null);
        hub.publish(
            EventPayload::AgentMessage(MessagePayload {
                session_id: Some(session_id.clone()),
                kind: MessageKind::User,
                role: Some("user".to_string()),
                content: ContentBlock::parse_content(&content),
                stop_reason: None,
                is_context_compaction: false,
                model: None,
                usage: None,
                cost_usd: None,
                duration_ms: None,
                timestamp: Utc::now(),
            }),
            context.clone(),
        );
    }
    hub.publish(
        EventPayload::AgentState {
            state: RunState::Idle,
            prompt: None,
            pid: None,
            exit_code: output.status.code(),
            error_message: None,
        },
        context,
    );

    Ok(session_id)
}

fn transcript_line(
    session_id: &SessionId,
    branch: &str,
    cwd: &str,
    uuid: &str,
    parent: Option<&str>,
    content: &str,
    is_meta: bool,
) -> Value {
    let mut line = json!({
        "parentUuid": parent,
        "sessionId": session_id.as_str(),
        "gitBranch": branch,
        "cwd": cwd,
        "type": "user",
        "uuid": uuid,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
        "message": { "role": "user", "content": content },
    });
    if is_meta {
        line["isMeta"] = Value::Bool(true);
    }
    line
}

fn append_transcript(
    config: &SupervisorConfig,
    session_id: &SessionId,
    lines: &[Value],
) -> Result<(), SupervisorError> {
    use std::io::Write;
    let dir = config.transcript_dir();
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{}.jsonl", session_id.as_str()));
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
    for line in lines {
        writeln!(file, "{line}")?;
    }
    tracing::debug!(path = %path.display(), "local-bash messages recorded");
    Ok(())
}

/// Best-effort current branch from `.git/HEAD`; the full git wrapper is
/// someone else's job.
fn git_branch(workdir: &Path) -> Option<String> {
    let head = std::fs::read_to_string(workdir.join(".git").join("HEAD")).ok()?;
    head.trim().strip_prefix("ref: refs/heads/").map(str::to_string)
}

#[cfg(test)]
#[path = "bash_tests.rs"]
mod tests;
