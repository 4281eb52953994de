// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission policy and session mode for an agent run.

use serde::{Deserialize, Serialize};

/// How the agent is allowed to take side-effecting actions.
///
/// `Interactive` is the only policy that runs the agent under a PTY so
/// its permission dialogs can be parsed and bridged; every other policy
/// runs the agent in pipe mode with the matching CLI flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionPolicy {
    Skip,
    Interactive,
    AcceptEdits,
    Plan,
}

impl PermissionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Interactive => "interactive",
            Self::AcceptEdits => "accept-edits",
            Self::Plan => "plan",
        }
    }

    /// Parse the wire/CLI spelling. Returns `None` for unknown policies;
    /// the supervisor maps that to an InvalidArgument error.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "skip" => Some(Self::Skip),
            "interactive" => Some(Self::Interactive),
            "accept-edits" | "acceptEdits" => Some(Self::AcceptEdits),
            "plan" => Some(Self::Plan),
            _ => None,
        }
    }

    /// Extra argv entries this policy adds to the agent command line.
    pub fn agent_args(&self) -> Vec<String> {
        match self {
            Self::Skip => vec!["--dangerously-skip-permissions".to_string()],
            Self::AcceptEdits => {
                vec!["--permission-mode".to_string(), "acceptEdits".to_string()]
            }
            Self::Plan => vec!["--permission-mode".to_string(), "plan".to_string()],
            // Interactive runs under a PTY; the agent shows its own dialogs.
            Self::Interactive => Vec::new(),
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Interactive)
    }
}

impl std::fmt::Display for PermissionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a start opens a fresh conversation or resumes an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    New,
    Continue,
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
