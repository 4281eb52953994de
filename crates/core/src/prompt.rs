// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt descriptors — the parsed form of an interactive permission
//! dialog printed by the agent to its terminal.

use serde::{Deserialize, Serialize};

/// What kind of side effect the agent is asking approval for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    WriteFile,
    EditFile,
    DeleteFile,
    BashCommand,
    McpTool,
    TrustFolder,
    Question,
    Unknown,
}

impl PromptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WriteFile => "write_file",
            Self::EditFile => "edit_file",
            Self::DeleteFile => "delete_file",
            Self::BashCommand => "bash_command",
            Self::McpTool => "mcp_tool",
            Self::TrustFolder => "trust_folder",
            Self::Question => "question",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PromptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single selectable option within a prompt dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOption {
    /// Key the client sends back to select this option ("1", "2", "y", "n").
    pub key: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Set on the single option the terminal cursor currently points at.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selected: bool,
}

impl PromptOption {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self { key: key.into(), label: label.into(), description: None, selected: false }
    }

    pub fn selected(mut self) -> Self {
        self.selected = true;
        self
    }
}

/// A fully parsed permission prompt, ready to bridge to a remote client.
///
/// At most one descriptor is pending at a time; a newly detected prompt
/// replaces it, and a submitted response or idle transition clears it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDescriptor {
    pub kind: PromptKind,
    /// File path, command text, or folder path — empty when inapplicable.
    pub target: String,
    /// Multi-line content excerpt shown between the header and the question.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    pub options: Vec<PromptOption>,
}

impl PromptDescriptor {
    pub fn new(kind: PromptKind, target: impl Into<String>) -> Self {
        Self { kind, target: target.into(), preview: None, options: Vec::new() }
    }

    /// The option currently under the cursor, if any.
    pub fn selected_option(&self) -> Option<&PromptOption> {
        self.options.iter().find(|o| o.selected)
    }
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
