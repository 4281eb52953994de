// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content blocks — the polymorphic sub-elements of an agent message.
//!
//! The agent's wire format tags each block with a `type` discriminator.
//! Unknown block types are preserved verbatim as raw JSON so new agent
//! versions do not force parser churn here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed prefix the agent writes on the continuation `user` message after a
/// context compaction. Both the pipe classifier and the transcript index
/// key off this single constant.
pub const COMPACTION_PREFIX: &str =
    "This session is being continued from a previous conversation";

/// Subtype carried by `system` messages that mark a compaction boundary.
pub const COMPACT_BOUNDARY_SUBTYPE: &str = "compact_boundary";

/// Top-level message classification used across the supervisor and index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Assistant,
    System,
    Result,
    Other,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Result => "result",
            Self::Other => "other",
        }
    }

    /// Classify a wire `type` tag. Anything unrecognized is `Other`.
    pub fn from_wire(tag: &str) -> Self {
        match tag {
            "user" => Self::User,
            "assistant" => Self::Assistant,
            "system" => Self::System,
            "result" => Self::Result,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One block of an agent message's `content` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: Option<String>,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: bool,
    },
    /// Unknown block type, preserved verbatim.
    #[serde(untagged)]
    Other(Value),
}

impl ContentBlock {
    /// Parse a `content` field into blocks.
    ///
    /// The wire allows either a plain string (shorthand for one text
    /// block) or an array of tagged blocks. Anything else yields an
    /// empty list.
    pub fn parse_content(content: &Value) -> Vec<ContentBlock> {
        match content {
            Value::String(s) => vec![ContentBlock::Text { text: s.clone() }],
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    serde_json::from_value(item.clone())
                        .unwrap_or_else(|_| ContentBlock::Other(item.clone()))
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ContentBlock::Text { .. })
    }

    pub fn is_thinking(&self) -> bool {
        matches!(self, ContentBlock::Thinking { .. })
    }

    pub fn is_tool_use(&self) -> bool {
        matches!(self, ContentBlock::ToolUse { .. })
    }

    /// Text carried by this block, if it is a text block.
    pub fn text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "block_tests.rs"]
mod tests;
