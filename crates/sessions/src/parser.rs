// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transcript line parsing and the message counting rules.
//!
//! A transcript line is an independent JSON object or it is skipped.
//! Only three shapes make it into the index: user lines with real
//! content, assistant lines with text or thinking, and system lines
//! that mark a compaction boundary. Tool-result echoes, meta caveats,
//! command wrappers, summaries, and file-history snapshots are all
//! dropped from the count.

use serde_json::Value;
use tether_core::{ContentBlock, MessageKind, COMPACTION_PREFIX, COMPACT_BOUNDARY_SUBTYPE};

/// User content prefixes that are bookkeeping, not conversation.
const EXCLUDED_USER_PREFIXES: &[&str] = &[
    "Caveat:",
    "<command-name>",
    "<local-command-stdout>",
    "<local-command-stderr>",
];

/// Maximum summary length in characters.
const SUMMARY_MAX: usize = 100;

/// One indexed transcript line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedLine {
    pub line_num: i64,
    pub kind: MessageKind,
    pub uuid: Option<String>,
    pub timestamp: Option<String>,
    pub git_branch: Option<String>,
    /// The raw line, preserved verbatim.
    pub body: Value,
    pub is_context_compaction: bool,
    /// Whether this line increments the session's message count.
    pub counted: bool,
}

/// Everything the index needs from one full pass over a transcript.
#[derive(Debug, Default)]
pub(crate) struct ParsedTranscript {
    pub message_count: i64,
    pub summary: Option<String>,
    pub branch: Option<String>,
    pub messages: Vec<ParsedLine>,
}

/// Parse a whole transcript body.
pub(crate) fn parse_transcript(content: &str) -> ParsedTranscript {
    let mut out = ParsedTranscript::default();
    for (idx, line) in content.lines().enumerate() {
        let Some(parsed) = parse_line(idx as i64 + 1, line) else {
            continue;
        };
        if let Some(branch) = &parsed.git_branch {
            out.branch = Some(branch.clone());
        }
        if parsed.counted {
            out.message_count += 1;
            if out.summary.is_none() && parsed.kind == MessageKind::User {
                out.summary = user_text(&parsed.body).map(|t| summarize(&t));
            }
        }
        out.messages.push(parsed);
    }
    out
}

/// Parse one line. Returns `None` for unparseable lines (ParseSkip) and
/// for shapes the index drops entirely.
pub(crate) fn parse_line(line_num: i64, line: &str) -> Option<ParsedLine> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let body: Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(line_num, error = %e, "skipping unparseable transcript line");
            return None;
        }
    };
    let kind = body
        .get("type")
        .and_then(Value::as_str)
        .map(MessageKind::from_wire)
        .unwrap_or(MessageKind::Other);

    let (indexed, counted, compaction) = match kind {
        MessageKind::User => {
            let counted = user_counts(&body);
            let compaction = user_compaction(&body);
            (counted || compaction, counted, compaction)
        }
        MessageKind::Assistant => {
            let counted = assistant_counts(&body);
            (counted, counted, false)
        }
        MessageKind::System => {
            let compaction =
                body.get("subtype").and_then(Value::as_str) == Some(COMPACT_BOUNDARY_SUBTYPE);
            // Boundaries land in the message table but never in the
            // user-facing count.
            (compaction, false, compaction)
        }
        _ => (false, false, false),
    };
    if !indexed {
        return None;
    }

    Some(ParsedLine {
        line_num,
        kind,
        uuid: body.get("uuid").and_then(Value::as_str).map(str::to_string),
        timestamp: body.get("timestamp").and_then(Value::as_str).map(str::to_string),
        git_branch: body.get("gitBranch").and_then(Value::as_str).map(str::to_string),
        body,
        is_context_compaction: compaction,
        counted,
    })
}

fn message_content(body: &Value) -> &Value {
    body.get("message")
        .and_then(|m| m.get("content"))
        .unwrap_or(&Value::Null)
}

/// A user line counts iff its content is a non-empty string without a
/// bookkeeping prefix, or an array carrying at least one text block.
fn user_counts(body: &Value) -> bool {
    match message_content(body) {
        Value::String(s) => {
            !s.is_empty() && !EXCLUDED_USER_PREFIXES.iter().any(|p| s.starts_with(p))
        }
        content @ Value::Array(_) => ContentBlock::parse_content(content)
            .iter()
            .any(ContentBlock::is_text),
        _ => false,
    }
}

/// An assistant line counts iff it carries text or thinking
/// (tool-use-only messages do not count).
fn assistant_counts(body: &Value) -> bool {
    match message_content(body) {
        content @ Value::Array(_) => ContentBlock::parse_content(content)
            .iter()
            .any(|b| b.is_text() || b.is_thinking()),
        _ => false,
    }
}

fn user_compaction(body: &Value) -> bool {
    if body.get("userType").and_then(Value::as_str) != Some("external") {
        return false;
    }
    user_text(body).is_some_and(|t| t.starts_with(COMPACTION_PREFIX))
}

fn user_text(body: &Value) -> Option<String> {
    match message_content(body) {
        Value::String(s) => Some(s.clone()),
        content @ Value::Array(_) => ContentBlock::parse_content(content)
            .iter()
            .find_map(|b| b.text().map(str::to_string)),
        _ => None,
    }
}

/// Build the hub payload for an indexed line (used by the live tail).
pub(crate) fn to_payload(
    parsed: &ParsedLine,
    session_id: &tether_core::SessionId,
) -> tether_core::MessagePayload {
    let message = parsed.body.get("message").unwrap_or(&Value::Null);
    tether_core::MessagePayload {
        session_id: Some(session_id.clone()),
        kind: parsed.kind,
        role: message.get("role").and_then(Value::as_str).map(str::to_string),
        content: ContentBlock::parse_content(message_content(&parsed.body)),
        stop_reason: message
            .get("stop_reason")
            .and_then(Value::as_str)
            .map(str::to_string),
        is_context_compaction: parsed.is_context_compaction,
        model: message.get("model").and_then(Value::as_str).map(str::to_string),
        usage: None,
        cost_usd: None,
        duration_ms: None,
        timestamp: parsed
            .timestamp
            .as_deref()
            .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&chrono::Utc))
            .unwrap_or_else(chrono::Utc::now),
    }
}

/// First-user-message summary: whitespace flattened, capped length.
fn summarize(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SUMMARY_MAX {
        return flat;
    }
    let mut out: String = flat.chars().take(SUMMARY_MAX).collect();
    out.push('…');
    out
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
