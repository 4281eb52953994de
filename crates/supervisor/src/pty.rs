// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY mode: spawn the agent under a pseudo-terminal and process its
//! terminal stream.
//!
//! The agent's TUI needs a real terminal to render its permission
//! dialogs, so interactive runs go through `portable-pty`. Every line
//! read from the master side flows through the decoder and the prompt
//! bridge; completed prompts are either cached for a remote approval or
//! auto-denied when nobody is listening.

use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::logsink::LogSink;
use crate::spinner::SpinnerTracker;
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, PtySize};
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tether_core::{
    EventPayload, PromptDescriptor, RouteContext, RunState, SessionId, WorkspaceId,
};
use tether_hub::EventHub;
use tether_term::{bridge::LineClass, parse_line, spinner_parts, PromptParser};

/// Delay before the ESC auto-deny lands on the PTY.
const AUTO_DENY_DELAY: Duration = Duration::from_millis(100);

/// Shared handle to the PTY master's write side.
pub type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// A spawned PTY child plus its I/O handles.
///
/// `master` must outlive the run; dropping it closes the terminal.
pub(crate) struct PtySpawn {
    pub child: Box<dyn portable_pty::Child + Send + Sync>,
    pub killer: Box<dyn ChildKiller + Send + Sync>,
    pub writer: SharedWriter,
    pub reader: Box<dyn std::io::Read + Send>,
    pub master: Box<dyn portable_pty::MasterPty + Send>,
    pub pid: Option<u32>,
}

/// Spawn the agent under a PTY sized and env'd for deterministic TUI
/// rendering.
pub(crate) fn spawn_pty(
    config: &SupervisorConfig,
    args: &[String],
) -> Result<PtySpawn, SupervisorError> {
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows: config.pty_rows,
            cols: config.pty_cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| SupervisorError::Spawn(format!("openpty: {e}")))?;

    let mut cmd = CommandBuilder::new(&config.agent_cmd);
    cmd.args(args);
    cmd.cwd(config.workdir.clone());
    cmd.env("TERM", "xterm-256color");
    cmd.env("COLORTERM", "truecolor");
    cmd.env("COLUMNS", config.pty_cols.to_string());
    cmd.env("LINES", config.pty_rows.to_string());

    let child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| SupervisorError::Spawn(format!("spawn {}: {e}", config.agent_cmd)))?;
    let killer = child.clone_killer();
    let pid = child.process_id();

    let writer = pair
        .master
        .take_writer()
        .map_err(|e| SupervisorError::Spawn(format!("pty writer: {e}")))?;
    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| SupervisorError::Spawn(format!("pty reader: {e}")))?;

    Ok(PtySpawn {
        child,
        killer,
        writer: Arc::new(Mutex::new(writer)),
        reader,
        master: pair.master,
        pid,
    })
}

/// Type the prompt into the agent's composer after its TUI settles.
pub(crate) async fn type_prompt(writer: SharedWriter, prompt: String, init_delay: Duration) {
    tokio::time::sleep(init_delay).await;
    {
        let mut w = writer.lock();
        if let Err(e) = w.write_all(prompt.as_bytes()).and_then(|()| w.flush()) {
            tracing::warn!(error = %e, "failed to type prompt into pty");
            return;
        }
    }
    // Brief pause so the composer has consumed the text before submit.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let mut w = writer.lock();
    if let Err(e) = w.write_all(b"\r").and_then(|()| w.flush()) {
        tracing::warn!(error = %e, "failed to submit prompt into pty");
    }
}

/// Per-run processor for cleaned PTY lines.
///
/// Owned by the single PTY reader loop; the only shared pieces are the
/// writer (for auto-deny) and the pending-prompt slot the supervisor
/// consults when routing input.
pub struct PtyProcessor {
    hub: EventHub,
    workspace_id: Option<WorkspaceId>,
    session_id: Option<SessionId>,
    writer: SharedWriter,
    pending: Arc<Mutex<Option<PromptDescriptor>>>,
    bridge: PromptParser,
    spinner: SpinnerTracker,
    class: Option<LineClass>,
    sink: Option<Arc<Mutex<LogSink>>>,
}

impl PtyProcessor {
    pub fn new(
        hub: EventHub,
        writer: SharedWriter,
        pending: Arc<Mutex<Option<PromptDescriptor>>>,
        workspace_id: Option<WorkspaceId>,
        session_id: Option<SessionId>,
        spinner_debounce: Duration,
    ) -> Self {
        Self {
            hub,
            workspace_id,
            session_id,
            writer,
            pending,
            bridge: PromptParser::new(),
            spinner: SpinnerTracker::new(spinner_debounce),
            class: None,
            sink: None,
        }
    }

    pub(crate) fn with_sink(mut self, sink: Arc<Mutex<LogSink>>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn context(&self) -> RouteContext {
        RouteContext {
            workspace_id: self.workspace_id.clone(),
            session_id: self.session_id.clone(),
            agent_type: None,
        }
    }

    /// Current line classification, if any line implied one yet.
    pub fn class(&self) -> Option<LineClass> {
        self.class
    }

    /// Process one raw PTY line.
    pub fn handle_line(&mut self, raw: &str) {
        let decoded = parse_line(raw);
        if let Some(sink) = &self.sink {
            let envelope = serde_json::json!({
                "_type": "pty",
                "_raw": decoded.raw,
                "_clean": decoded.clean,
                "_timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            });
            sink.lock().append_line(&envelope.to_string());
        }

        let result = self.bridge.push_line(&decoded.clean);

        if let Some(class) = result.class {
            let was = self.class;
            self.class = Some(class);
            // Only the idle transition is worth announcing; the rest is
            // churn between spinner frames.
            if class == LineClass::Idle && was != Some(LineClass::Idle) {
                self.pending.lock().take();
                self.spinner.reset();
                self.hub.publish(
                    EventPayload::AgentState {
                        state: RunState::Idle,
                        prompt: None,
                        pid: None,
                        exit_code: None,
                        error_message: None,
                    },
                    self.context(),
                );
            }
        }

        if let Some(parts) = spinner_parts(&decoded.clean) {
            if let Some(update) = self.spinner.observe(parts, Instant::now()) {
                self.hub.publish(
                    EventPayload::Spinner {
                        text: update.text(),
                        symbol: update.symbol,
                        message: update.message,
                        session_id: self.session_id.clone(),
                    },
                    self.context(),
                );
            }
        }

        if let Some(descriptor) = result.descriptor {
            self.handle_prompt(descriptor);
        }
    }

    /// Route a completed prompt: cache-and-publish when someone is
    /// listening, auto-deny otherwise.
    fn handle_prompt(&mut self, descriptor: PromptDescriptor) {
        if self.hub.external_subscriber_count() == 0 {
            tracing::info!(kind = %descriptor.kind, "no external subscribers; auto-denying prompt");
            let writer = Arc::clone(&self.writer);
            tokio::spawn(async move {
                tokio::time::sleep(AUTO_DENY_DELAY).await;
                let mut w = writer.lock();
                if let Err(e) = w.write_all(&[0x1b]).and_then(|()| w.flush()) {
                    tracing::warn!(error = %e, "auto-deny write failed");
                }
            });
            return;
        }

        *self.pending.lock() = Some(descriptor.clone());
        self.hub.publish(
            EventPayload::PermissionRequest {
                prompt_kind: descriptor.kind,
                target: descriptor.target,
                preview: descriptor.preview,
                options: descriptor.options,
                description: None,
                session_id: self.session_id.clone(),
                tool_use_id: None,
                tool_name: None,
            },
            self.context(),
        );
    }

    /// PTY EOF: the reader loop is done; publish the final idle state.
    pub fn finish(&mut self) {
        self.pending.lock().take();
        self.hub.publish(
            EventPayload::AgentState {
                state: RunState::Idle,
                prompt: None,
                pid: None,
                exit_code: None,
                error_message: None,
            },
            self.context(),
        );
    }
}

#[cfg(test)]
#[path = "pty_tests.rs"]
mod tests;
