// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipe mode: spawn the agent with piped stdio and classify its
//! stream-json stdout.
//!
//! The child runs in its own process group so the whole tree can be
//! signalled. Stdout lines can reach multiple megabytes (base64 image
//! payloads), so the reader buffer starts large.

use crate::classify::PipeClassifier;
use crate::error::SupervisorError;
use crate::logsink::LogSink;
use crate::supervisor::Inner;
use parking_lot::Mutex;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Initial reader capacity; stream-json lines may carry base64 images.
const PIPE_BUFFER: usize = 10 * 1024 * 1024;

/// Grace period between group-terminate and hard kill.
const KILL_GRACE: Duration = Duration::from_secs(2);

pub(crate) struct PipeSpawn {
    pub child: Child,
    pub pid: Option<u32>,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
    pub stdin_tx: Option<mpsc::Sender<String>>,
}

/// Spawn the agent with piped stdio in its own process group.
///
/// When `stream_input` is off, stdin is closed right away — EOF on stdin
/// is the agent's cue to start processing. When on, a writer task owns
/// stdin and `stdin_tx` accepts JSON lines to feed back.
pub(crate) fn spawn_pipe(
    inner: &Arc<Inner>,
    args: &[String],
) -> Result<PipeSpawn, SupervisorError> {
    let config = &inner.config;
    let mut cmd = Command::new(&config.agent_cmd);
    cmd.args(args)
        .current_dir(&config.workdir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd
        .spawn()
        .map_err(|e| SupervisorError::Spawn(format!("spawn {}: {e}", config.agent_cmd)))?;
    let pid = child.id();

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| SupervisorError::Spawn("no stdout pipe".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| SupervisorError::Spawn("no stderr pipe".to_string()))?;

    let stdin = child.stdin.take();
    let stdin_tx = if config.stream_input {
        stdin.map(|mut stdin| {
            let (tx, mut rx) = mpsc::channel::<String>(16);
            tokio::spawn(async move {
                while let Some(line) = rx.recv().await {
                    if let Err(e) = stdin.write_all(line.as_bytes()).await {
                        tracing::warn!(error = %e, "stdin write failed");
                        break;
                    }
                    if let Err(e) = stdin.write_all(b"\n").await {
                        tracing::warn!(error = %e, "stdin write failed");
                        break;
                    }
                    let _ = stdin.flush().await;
                }
                // Dropping stdin here delivers EOF.
            });
            tx
        })
    } else {
        drop(stdin);
        None
    };

    Ok(PipeSpawn { child, pid, stdout, stderr, stdin_tx })
}

/// Read stdout lines, classify, log, and apply instance effects.
pub(crate) async fn read_stdout(
    inner: Arc<Inner>,
    stdout: ChildStdout,
    sink: Option<Arc<Mutex<LogSink>>>,
) {
    let mut classifier = PipeClassifier::new(
        inner.hub.clone(),
        inner.config.workspace_id.clone(),
        Some("claude".to_string()),
    );
    let mut reader = BufReader::with_capacity(PIPE_BUFFER, stdout);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']);
                if let Some(sink) = &sink {
                    sink.lock().append_line(trimmed);
                }
                let effects = classifier.handle_stdout_line(trimmed);
                inner.apply_effects(effects);
            }
            Err(e) => {
                tracing::warn!(error = %e, "stdout read failed");
                break;
            }
        }
    }
}

/// Read stderr lines; they are logged but never parsed.
pub(crate) async fn read_stderr(
    inner: Arc<Inner>,
    stderr: ChildStderr,
    sink: Option<Arc<Mutex<LogSink>>>,
) {
    let mut classifier = PipeClassifier::new(
        inner.hub.clone(),
        inner.config.workspace_id.clone(),
        Some("claude".to_string()),
    );
    let mut reader = BufReader::new(stderr);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']);
                if let Some(sink) = &sink {
                    sink.lock().append_stderr(trimmed);
                }
                classifier.handle_stderr_line(trimmed);
            }
            Err(e) => {
                tracing::warn!(error = %e, "stderr read failed");
                break;
            }
        }
    }
}

/// How a pipe-mode run ended.
pub(crate) enum WaitOutcome {
    Exited(Option<i32>),
    Cancelled,
    TimedOut,
}

/// Await process exit, reacting to cancellation and the run deadline
/// with a graceful-then-hard kill of the process group.
pub(crate) async fn wait_for_exit(
    mut child: Child,
    pid: Option<u32>,
    cancel: CancellationToken,
    timeout: Duration,
) -> WaitOutcome {
    let outcome = tokio::select! {
        status = child.wait() => {
            return WaitOutcome::Exited(status.ok().and_then(|s| s.code()));
        }
        _ = cancel.cancelled() => WaitOutcome::Cancelled,
        _ = tokio::time::sleep(timeout) => WaitOutcome::TimedOut,
    };

    terminate_group(pid, &mut child).await;
    outcome
}

/// SIGTERM the group, wait out the grace period, then SIGKILL.
pub(crate) async fn terminate_group(pid: Option<u32>, child: &mut Child) {
    signal_group(pid, false);
    let graceful = tokio::time::timeout(KILL_GRACE, child.wait()).await;
    if graceful.is_err() {
        signal_group(pid, true);
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

#[cfg(unix)]
pub(crate) fn signal_group(pid: Option<u32>, hard: bool) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    let Some(pid) = pid else {
        return;
    };
    let signal = if hard { Signal::SIGKILL } else { Signal::SIGTERM };
    if let Err(e) = killpg(Pid::from_raw(pid as i32), signal) {
        tracing::debug!(pid, %signal, error = %e, "killpg failed");
    }
}

#[cfg(not(unix))]
pub(crate) fn signal_group(_pid: Option<u32>, _hard: bool) {
    // Non-Unix platforms rely on the child handle's process-tree kill.
}
