// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    /// `start` while a run is in progress.
    #[error("agent already running")]
    AlreadyRunning,

    /// `stop` or an input operation while no run is in progress.
    #[error("agent not running")]
    NotRunning,

    /// Bad caller input: empty prompt, missing session id in continue
    /// mode, unknown permission policy.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation's mode/state preconditions do not hold (wrong mode,
    /// not waiting for input, stdin closed).
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The agent process could not be spawned.
    #[error("failed to spawn agent: {0}")]
    Spawn(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
