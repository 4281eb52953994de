// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervisor proper: lifecycle state machine, mode dispatch, and
//! input routing.
//!
//! At most one agent process exists per supervisor. A single mutex
//! guards every state read and write; long-running work (readers, the
//! waiter, the prompt typist) happens in tasks that only take the lock
//! briefly.

use crate::bash;
use crate::classify::LineEffects;
use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::logsink::LogSink;
use crate::pipe;
use crate::pty::{self, PtyProcessor, SharedWriter};
use parking_lot::Mutex;
use portable_pty::ChildKiller;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tether_core::{
    EventPayload, LogStream, PermissionPolicy, PromptDescriptor, RouteContext, RunState,
    SessionId, SessionMode,
};
use tether_hub::EventHub;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Inputs to a run.
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub prompt: String,
    pub mode: SessionMode,
    pub session_id: Option<SessionId>,
    pub policy: PermissionPolicy,
}

impl StartOptions {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            mode: SessionMode::New,
            session_id: None,
            policy: PermissionPolicy::Skip,
        }
    }

    pub fn resume(mut self, session_id: SessionId) -> Self {
        self.mode = SessionMode::Continue;
        self.session_id = Some(session_id);
        self
    }

    pub fn policy(mut self, policy: PermissionPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Per-run mutable state. Everything here resets when the run ends.
pub(crate) struct Instance {
    pub state: RunState,
    pub prompt: String,
    pub pid: Option<u32>,
    pub session_id: Option<SessionId>,
    pub waiting_for_input: bool,
    pub pending_tool: Option<(String, String)>,
    pub pending_prompt: Arc<Mutex<Option<PromptDescriptor>>>,
    pub stdin_tx: Option<mpsc::Sender<String>>,
    pub pty_writer: Option<SharedWriter>,
    pub pty_killer: Option<Box<dyn ChildKiller + Send + Sync>>,
    pub cancel: Option<CancellationToken>,
    pub stop_requested: bool,
    pub pty_mode: bool,
}

impl Instance {
    fn new() -> Self {
        Self {
            state: RunState::Idle,
            prompt: String::new(),
            pid: None,
            session_id: None,
            waiting_for_input: false,
            pending_tool: None,
            pending_prompt: Arc::new(Mutex::new(None)),
            stdin_tx: None,
            pty_writer: None,
            pty_killer: None,
            cancel: None,
            stop_requested: false,
            pty_mode: false,
        }
    }

    /// Clear per-run fields, leaving the terminal state behind.
    fn reset(&mut self, terminal: RunState) {
        self.state = terminal;
        self.prompt.clear();
        self.pid = None;
        self.session_id = None;
        self.waiting_for_input = false;
        self.pending_tool = None;
        self.pending_prompt.lock().take();
        self.stdin_tx = None;
        self.pty_writer = None;
        self.pty_killer = None;
        self.cancel = None;
        self.stop_requested = false;
        self.pty_mode = false;
    }
}

pub(crate) struct Inner {
    pub(crate) config: SupervisorConfig,
    pub(crate) hub: EventHub,
    pub(crate) instance: Mutex<Instance>,
    pub(crate) pty_complete: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
}

impl Inner {
    fn context(&self) -> RouteContext {
        let inst = self.instance.lock();
        RouteContext {
            workspace_id: self.config.workspace_id.clone(),
            session_id: inst.session_id.clone(),
            agent_type: None,
        }
    }

    /// Apply classifier effects to the instance.
    pub(crate) fn apply_effects(&self, effects: LineEffects) {
        let mut inst = self.instance.lock();
        if let Some(sid) = effects.session_id {
            inst.session_id = Some(sid);
        }
        if let Some((id, name)) = effects.pending_tool {
            inst.pending_tool = Some((id, name));
        }
        match effects.waiting_for_input {
            Some(true) => inst.waiting_for_input = true,
            Some(false) => {
                inst.waiting_for_input = false;
                inst.pending_tool = None;
            }
            None => {}
        }
    }

    /// Publish the terminal event and reset the instance.
    fn finish_run(
        self: &Arc<Self>,
        terminal: RunState,
        exit_code: Option<i32>,
        error_message: Option<String>,
        publish: bool,
    ) {
        let context = self.context();
        {
            let mut inst = self.instance.lock();
            inst.reset(terminal);
        }
        if publish {
            self.hub.publish(
                EventPayload::AgentState {
                    state: terminal,
                    prompt: None,
                    pid: None,
                    exit_code,
                    error_message,
                },
                context,
            );
        }
        tracing::info!(state = %terminal, ?exit_code, "run finished");
    }
}

/// Supervises one agent process and bridges it to the event hub.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, hub: EventHub) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                hub,
                instance: Mutex::new(Instance::new()),
                pty_complete: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> RunState {
        self.inner.instance.lock().state
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.instance.lock().session_id.clone()
    }

    pub fn waiting_for_input(&self) -> bool {
        self.inner.instance.lock().waiting_for_input
    }

    /// The prompt descriptor awaiting a remote decision, if any.
    pub fn pending_prompt(&self) -> Option<PromptDescriptor> {
        self.inner.instance.lock().pending_prompt.lock().clone()
    }

    /// Register a callback invoked when a pty run's stream ends.
    pub fn set_pty_complete(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.inner.pty_complete.lock() = Some(Arc::new(callback));
    }

    /// Start a run. Fails with `AlreadyRunning` when one is in flight.
    pub async fn start(&self, opts: StartOptions) -> Result<(), SupervisorError> {
        if opts.prompt.trim().is_empty() {
            return Err(SupervisorError::InvalidArgument("empty prompt".to_string()));
        }
        if opts.mode == SessionMode::Continue && opts.session_id.is_none() {
            return Err(SupervisorError::InvalidArgument(
                "continue mode requires a session id".to_string(),
            ));
        }

        // `!cmd` runs locally and never touches the agent process.
        if let Some(command) = opts.prompt.strip_prefix('!') {
            if self.state() == RunState::Running {
                return Err(SupervisorError::AlreadyRunning);
            }
            let span = tracing::info_span!("local_bash", command);
            return bash::run_local_bash(
                &self.inner.config,
                &self.inner.hub,
                command,
                opts.session_id,
            )
            .instrument(span)
            .await
            .map(|_| ());
        }

        let cancel = CancellationToken::new();
        {
            let mut inst = self.inner.instance.lock();
            if inst.state == RunState::Running {
                return Err(SupervisorError::AlreadyRunning);
            }
            inst.state = RunState::Running;
            inst.prompt = opts.prompt.clone();
            inst.session_id = opts.session_id.clone();
            inst.stop_requested = false;
            inst.cancel = Some(cancel.clone());
            inst.pty_mode = opts.policy.is_interactive();
        }

        let result = if opts.policy.is_interactive() {
            self.start_pty(&opts, cancel)
        } else {
            self.start_pipe(&opts, cancel)
        };
        if let Err(e) = &result {
            let message = e.to_string();
            self.inner.finish_run(RunState::Error, None, Some(message), true);
        }
        result
    }

    /// Build the pipe-mode argument vector.
    fn pipe_args(&self, opts: &StartOptions) -> Vec<String> {
        let mut args = self.inner.config.base_args.clone();
        if opts.mode == SessionMode::Continue {
            if let Some(sid) = &opts.session_id {
                args.push("--resume".to_string());
                args.push(sid.to_string());
            }
        }
        args.extend(opts.policy.agent_args());
        if self.inner.config.stream_input {
            args.push("--input-format".to_string());
            args.push("stream-json".to_string());
        }
        args.push(opts.prompt.clone());
        args
    }

    fn start_pipe(&self, opts: &StartOptions, cancel: CancellationToken) -> Result<(), SupervisorError> {
        let inner = Arc::clone(&self.inner);
        let args = self.pipe_args(opts);
        let spawned = pipe::spawn_pipe(&inner, &args)?;
        let pid = spawned.pid;

        let sink = inner.config.log_dir.as_ref().map(|dir| {
            Arc::new(Mutex::new(LogSink::open(dir, pid.unwrap_or(0), inner.config.rotation.clone())))
        });

        {
            let mut inst = inner.instance.lock();
            inst.pid = pid;
            inst.stdin_tx = spawned.stdin_tx;
        }

        inner.hub.publish(
            EventPayload::AgentState {
                state: RunState::Running,
                prompt: Some(opts.prompt.clone()),
                pid,
                exit_code: None,
                error_message: None,
            },
            inner.context(),
        );

        let stdout_task = tokio::spawn(pipe::read_stdout(
            Arc::clone(&inner),
            spawned.stdout,
            sink.clone(),
        ));
        let stderr_task = tokio::spawn(pipe::read_stderr(
            Arc::clone(&inner),
            spawned.stderr,
            sink,
        ));

        let timeout = inner.config.run_timeout;
        let span = tracing::info_span!("pipe_run", pid);
        tokio::spawn(
            async move {
                let outcome = pipe::wait_for_exit(spawned.child, pid, cancel, timeout).await;
                // Let the readers drain EOF so agent_log events precede
                // the terminal state event.
                let _ = stdout_task.await;
                let _ = stderr_task.await;

                let stop_requested = inner.instance.lock().stop_requested;
                let (state, exit_code, error) = match outcome {
                    pipe::WaitOutcome::Cancelled => (RunState::Stopped, None, None),
                    pipe::WaitOutcome::TimedOut => (
                        RunState::Error,
                        None,
                        Some("deadline exceeded".to_string()),
                    ),
                    pipe::WaitOutcome::Exited(code) if stop_requested => {
                        (RunState::Stopped, code, None)
                    }
                    pipe::WaitOutcome::Exited(Some(0)) => (RunState::Idle, Some(0), None),
                    pipe::WaitOutcome::Exited(code) => (
                        RunState::Error,
                        code,
                        Some(match code {
                            Some(c) => format!("agent exited with code {c}"),
                            None => "agent terminated by signal".to_string(),
                        }),
                    ),
                };
                inner.finish_run(state, exit_code, error, true);
            }
            .instrument(span),
        );

        Ok(())
    }

    fn start_pty(&self, opts: &StartOptions, cancel: CancellationToken) -> Result<(), SupervisorError> {
        let inner = Arc::clone(&self.inner);
        let mut args = Vec::new();
        if opts.mode == SessionMode::Continue {
            if let Some(sid) = &opts.session_id {
                args.push("--resume".to_string());
                args.push(sid.to_string());
            }
        }
        let spawned = pty::spawn_pty(&inner.config, &args)?;
        let pid = spawned.pid;

        let sink = inner.config.log_dir.as_ref().map(|dir| {
            Arc::new(Mutex::new(LogSink::open(dir, pid.unwrap_or(0), inner.config.rotation.clone())))
        });

        let pending = {
            let mut inst = inner.instance.lock();
            inst.pid = pid;
            inst.pty_writer = Some(Arc::clone(&spawned.writer));
            inst.pty_killer = Some(spawned.killer);
            Arc::clone(&inst.pending_prompt)
        };

        inner.hub.publish(
            EventPayload::AgentState {
                state: RunState::Running,
                prompt: Some(opts.prompt.clone()),
                pid,
                exit_code: None,
                error_message: None,
            },
            inner.context(),
        );

        // The prompt is typed, not passed on the command line.
        tokio::spawn(pty::type_prompt(
            Arc::clone(&spawned.writer),
            opts.prompt.clone(),
            inner.config.pty_init_delay,
        ));

        let mut processor = PtyProcessor::new(
            inner.hub.clone(),
            Arc::clone(&spawned.writer),
            pending,
            inner.config.workspace_id.clone(),
            opts.session_id.clone(),
            inner.config.spinner_debounce,
        );
        if let Some(sink) = sink {
            processor = processor.with_sink(sink);
        }

        let (line_tx, mut line_rx) = mpsc::channel::<String>(256);
        let mut reader = spawned.reader;
        let read_task = tokio::task::spawn_blocking(move || {
            let mut reader = std::io::BufReader::new(&mut reader);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        let trimmed = line.trim_end_matches(['\n', '\r']).to_string();
                        if line_tx.blocking_send(trimmed).is_err() {
                            break;
                        }
                    }
                    // The master side reports EIO once the child is gone.
                    Err(_) => break,
                }
            }
        });

        let pump_cancel = cancel.clone();
        let pump_task = tokio::spawn(async move {
            while let Some(line) = line_rx.recv().await {
                processor.handle_line(&line);
            }
            if !pump_cancel.is_cancelled() {
                processor.finish();
            }
        });

        let mut child = spawned.child;
        let mut killer = child.clone_killer();
        // The master must live as long as the run; dropping it closes
        // the terminal out from under the child.
        let master = spawned.master;
        let timeout = inner.config.run_timeout;
        let span = tracing::info_span!("pty_run", pid);
        tokio::spawn(
            async move {
                let mut wait_task = tokio::task::spawn_blocking(move || child.wait());
                let outcome = tokio::select! {
                    res = &mut wait_task => {
                        let code = res
                            .ok()
                            .and_then(|r| r.ok())
                            .map(|status| status.exit_code() as i32);
                        pipe::WaitOutcome::Exited(code)
                    }
                    _ = cancel.cancelled() => {
                        if let Err(e) = killer.kill() {
                            tracing::debug!(error = %e, "pty kill failed");
                        }
                        let _ = wait_task.await;
                        pipe::WaitOutcome::Cancelled
                    }
                    _ = tokio::time::sleep(timeout) => {
                        if let Err(e) = killer.kill() {
                            tracing::debug!(error = %e, "pty kill failed");
                        }
                        let _ = wait_task.await;
                        pipe::WaitOutcome::TimedOut
                    }
                };
                let _ = read_task.await;
                let _ = pump_task.await;
                drop(master);

                let callback = inner.pty_complete.lock().clone();
                if let Some(callback) = callback {
                    callback();
                }

                let stop_requested = inner.instance.lock().stop_requested;
                let (state, exit_code, error) = match outcome {
                    pipe::WaitOutcome::Cancelled => (RunState::Stopped, None, None),
                    pipe::WaitOutcome::TimedOut => (
                        RunState::Error,
                        None,
                        Some("deadline exceeded".to_string()),
                    ),
                    pipe::WaitOutcome::Exited(code) if stop_requested => {
                        (RunState::Stopped, code, None)
                    }
                    pipe::WaitOutcome::Exited(Some(0)) => (RunState::Idle, Some(0), None),
                    pipe::WaitOutcome::Exited(code) => (
                        RunState::Error,
                        code,
                        Some("agent exited abnormally".to_string()),
                    ),
                };
                // A clean pty exit already produced the reader's final
                // idle event; only abnormal ends are announced here.
                let publish = state != RunState::Idle;
                inner.finish_run(state, exit_code, error, publish);
            }
            .instrument(span),
        );

        Ok(())
    }

    /// Graceful stop: cancel the run and terminate the process group.
    pub fn stop(&self) -> Result<(), SupervisorError> {
        let (cancel, pid, pty_mode) = {
            let mut inst = self.inner.instance.lock();
            if inst.state != RunState::Running {
                return Err(SupervisorError::NotRunning);
            }
            inst.stop_requested = true;
            (inst.cancel.clone(), inst.pid, inst.pty_mode)
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        pipe::signal_group(pid, false);
        if pty_mode {
            // Backup idle event in case the reader loop never emits one.
            self.inner.hub.publish(
                EventPayload::AgentState {
                    state: RunState::Idle,
                    prompt: None,
                    pid: None,
                    exit_code: None,
                    error_message: None,
                },
                self.inner.context(),
            );
        }
        Ok(())
    }

    /// Hard kill of the whole process group.
    pub fn kill(&self) -> Result<(), SupervisorError> {
        let (cancel, pid) = {
            let mut inst = self.inner.instance.lock();
            if inst.state != RunState::Running {
                return Err(SupervisorError::NotRunning);
            }
            inst.stop_requested = true;
            if let Some(killer) = inst.pty_killer.as_mut() {
                if let Err(e) = killer.kill() {
                    tracing::debug!(error = %e, "pty kill failed");
                }
            }
            (inst.cancel.clone(), inst.pid)
        };
        pipe::signal_group(pid, true);
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        Ok(())
    }

    /// Write a tool response back to the agent's stdin (pipe mode only).
    pub fn send_response(
        &self,
        tool_use_id: &str,
        response: &str,
        is_error: bool,
    ) -> Result<(), SupervisorError> {
        let (stdin_tx, context) = {
            let mut inst = self.inner.instance.lock();
            if inst.state != RunState::Running {
                return Err(SupervisorError::NotRunning);
            }
            if inst.pty_mode {
                return Err(SupervisorError::PreconditionFailed(
                    "tool responses require pipe mode".to_string(),
                ));
            }
            if !inst.waiting_for_input {
                return Err(SupervisorError::PreconditionFailed(
                    "agent is not waiting for input".to_string(),
                ));
            }
            let Some(tx) = inst.stdin_tx.clone() else {
                return Err(SupervisorError::PreconditionFailed("stdin closed".to_string()));
            };
            inst.waiting_for_input = false;
            inst.pending_tool = None;
            (
                tx,
                RouteContext {
                    workspace_id: self.inner.config.workspace_id.clone(),
                    session_id: inst.session_id.clone(),
                    agent_type: None,
                },
            )
        };

        let message = serde_json::json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": tool_use_id,
                    "content": response,
                    "is_error": is_error,
                }],
            },
        });
        stdin_tx
            .try_send(message.to_string())
            .map_err(|_| SupervisorError::PreconditionFailed("stdin closed".to_string()))?;

        self.inner.hub.publish(
            EventPayload::PermissionResponse {
                tool_use_id: Some(tool_use_id.to_string()),
                response: response.to_string(),
                is_error,
            },
            context,
        );
        Ok(())
    }

    /// Write input to the PTY master (pty mode only). Symbolic key names
    /// map to their escape sequences; control bytes pass through raw;
    /// plain text gets a trailing carriage return.
    pub fn send_pty_input(&self, input: &str) -> Result<(), SupervisorError> {
        let (writer, context) = {
            let inst = self.inner.instance.lock();
            if inst.state != RunState::Running {
                return Err(SupervisorError::NotRunning);
            }
            if !inst.pty_mode {
                return Err(SupervisorError::PreconditionFailed(
                    "pty input requires pty mode".to_string(),
                ));
            }
            let Some(writer) = inst.pty_writer.clone() else {
                return Err(SupervisorError::PreconditionFailed("pty closed".to_string()));
            };
            (
                writer,
                RouteContext {
                    workspace_id: self.inner.config.workspace_id.clone(),
                    session_id: inst.session_id.clone(),
                    agent_type: None,
                },
            )
        };

        let bytes = encode_pty_input(input);
        {
            let mut w = writer.lock();
            w.write_all(&bytes)?;
            w.flush()?;
        }
        self.inner.instance.lock().pending_prompt.lock().take();

        self.inner.hub.publish(
            EventPayload::AgentLog {
                stream: LogStream::Stdin,
                line: input.to_string(),
                parsed: None,
            },
            context,
        );
        Ok(())
    }
}

/// Map symbolic key names and raw input to PTY byte sequences.
fn encode_pty_input(input: &str) -> Vec<u8> {
    match input {
        "enter" => b"\r".to_vec(),
        "escape" => b"\x1b".to_vec(),
        "up" => b"\x1b[A".to_vec(),
        "down" => b"\x1b[B".to_vec(),
        "right" => b"\x1b[C".to_vec(),
        "left" => b"\x1b[D".to_vec(),
        "tab" => b"\t".to_vec(),
        "backspace" => b"\x7f".to_vec(),
        "space" => b" ".to_vec(),
        other => {
            let bytes = other.as_bytes();
            match bytes.first() {
                // Raw control sequence: send exactly as given.
                Some(&b) if b < 0x20 || b == 0x7f => bytes.to_vec(),
                _ if other.ends_with('\r') => bytes.to_vec(),
                _ => {
                    let mut out = bytes.to_vec();
                    out.push(b'\r');
                    out
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
