// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-driven daemon configuration.
//!
//! The HTTP surface, pairing flow, and CLI parsing live outside this
//! crate; the daemon itself only needs a handful of paths and the agent
//! command, all overridable through `TETHER_*` variables.

use std::path::PathBuf;
use std::time::Duration;

/// Interval between heartbeat events keeping idle transports warm.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Root for daemon state (index database, line logs).
    pub state_dir: PathBuf,
    /// Agent executable.
    pub agent_cmd: String,
    /// Workspace the supervisor serves.
    pub workdir: PathBuf,
    /// Override for the transcript root (defaults to `~/.claude/projects`).
    pub transcript_root: Option<PathBuf>,
}

impl DaemonConfig {
    /// Resolve configuration from the environment with sane defaults.
    pub fn from_env() -> Self {
        let state_dir = std::env::var_os("TETHER_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_state_dir);
        let agent_cmd = std::env::var("TETHER_AGENT_CMD").unwrap_or_else(|_| "claude".to_string());
        let workdir = std::env::var_os("TETHER_WORKDIR")
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let transcript_root = std::env::var_os("TETHER_TRANSCRIPT_ROOT").map(PathBuf::from);
        Self { state_dir, agent_cmd, workdir, transcript_root }
    }

    pub fn index_db_path(&self) -> PathBuf {
        self.state_dir.join("index.db")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }
}

fn default_state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/state")))
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("tether")
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
