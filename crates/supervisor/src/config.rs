// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor configuration.

use std::path::PathBuf;
use std::time::Duration;
use tether_core::WorkspaceId;

/// Rotation policy for the per-run JSON-lines log sink.
#[derive(Debug, Clone)]
pub struct LogRotation {
    /// Rotate when the active file grows past this size.
    pub max_bytes: u64,
    /// Rotated backups retained (`file.jsonl.1` … `file.jsonl.N`).
    pub backups: usize,
}

impl Default for LogRotation {
    fn default() -> Self {
        Self { max_bytes: 50 * 1024 * 1024, backups: 3 }
    }
}

/// Static configuration for a supervisor instance.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Agent executable, resolved via PATH.
    pub agent_cmd: String,
    /// Fixed base arguments prepended to every pipe-mode invocation.
    pub base_args: Vec<String>,
    /// Working directory the agent runs in (also the workspace root).
    pub workdir: PathBuf,
    pub workspace_id: Option<WorkspaceId>,
    /// Hard deadline for a single run.
    pub run_timeout: Duration,
    /// Directory for raw line logs; `None` disables the sink.
    pub log_dir: Option<PathBuf>,
    pub rotation: LogRotation,
    /// Override for the transcript root (tests); defaults to
    /// `~/.claude/projects`.
    pub transcript_root: Option<PathBuf>,
    /// Keep stdin open and add `--input-format stream-json` so tool
    /// responses can be written back mid-run. When off, stdin is closed
    /// right after spawn — EOF is how the agent knows to start.
    pub stream_input: bool,
    /// Minimum interval between spinner events.
    pub spinner_debounce: Duration,
    /// How long the agent's TUI gets to draw before the prompt is typed.
    pub pty_init_delay: Duration,
    pub pty_cols: u16,
    pub pty_rows: u16,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            agent_cmd: "claude".to_string(),
            base_args: vec![
                "--output-format".to_string(),
                "stream-json".to_string(),
                "--verbose".to_string(),
                "--print".to_string(),
            ],
            workdir: PathBuf::from("."),
            workspace_id: None,
            run_timeout: Duration::from_secs(30 * 60),
            log_dir: None,
            rotation: LogRotation::default(),
            transcript_root: None,
            stream_input: false,
            spinner_debounce: Duration::from_millis(150),
            pty_init_delay: Duration::from_secs(4),
            pty_cols: 120,
            pty_rows: 40,
        }
    }
}

impl SupervisorConfig {
    /// Transcript directory for this workspace:
    /// `<root>/<abs-path-with-slashes-dashed>`.
    pub fn transcript_dir(&self) -> PathBuf {
        let root = self
            .transcript_root
            .clone()
            .or_else(|| dirs::home_dir().map(|h| h.join(".claude").join("projects")))
            .unwrap_or_else(|| PathBuf::from(".claude/projects"));
        let encoded = self.workdir.to_string_lossy().replace('/', "-");
        root.join(encoded)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
