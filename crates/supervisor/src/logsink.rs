// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rotating JSON-lines sink for raw agent output.
//!
//! One file per run, keyed by pid: `<log_dir>/agent-<pid>.jsonl`. Stdout
//! lines are appended verbatim; stderr lines are wrapped in a synthetic
//! envelope so the file stays one-JSON-object-per-line. Logging failures
//! disable the sink for the rest of the run — they must never break the
//! supervisor.

use crate::config::LogRotation;
use chrono::{SecondsFormat, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

pub(crate) struct LogSink {
    path: PathBuf,
    rotation: LogRotation,
    file: Option<File>,
    written: u64,
    disabled: bool,
}

impl LogSink {
    /// Open (or create) the sink for a run. Returns a disabled sink on
    /// any I/O failure.
    pub(crate) fn open(log_dir: &std::path::Path, pid: u32, rotation: LogRotation) -> Self {
        let path = log_dir.join(format!("agent-{pid}.jsonl"));
        match Self::open_file(log_dir, &path) {
            Ok((file, written)) => {
                Self { path, rotation, file: Some(file), written, disabled: false }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "log sink disabled");
                Self { path, rotation, file: None, written: 0, disabled: true }
            }
        }
    }

    fn open_file(dir: &std::path::Path, path: &std::path::Path) -> std::io::Result<(File, u64)> {
        fs::create_dir_all(dir)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok((file, written))
    }

    /// Append one raw stdout line verbatim.
    pub(crate) fn append_line(&mut self, line: &str) {
        self.write(line);
    }

    /// Append a stderr line wrapped in the synthetic envelope.
    pub(crate) fn append_stderr(&mut self, line: &str) {
        let envelope = serde_json::json!({
            "_type": "stderr",
            "_content": line,
            "_timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        self.write(&envelope.to_string());
    }

    fn write(&mut self, line: &str) {
        if self.disabled {
            return;
        }
        if self.written + line.len() as u64 + 1 > self.rotation.max_bytes {
            self.rotate();
        }
        let Some(file) = self.file.as_mut() else {
            return;
        };
        if let Err(e) = writeln!(file, "{line}") {
            tracing::warn!(path = %self.path.display(), error = %e, "log write failed; disabling sink");
            self.disabled = true;
            self.file = None;
            return;
        }
        self.written += line.len() as u64 + 1;
    }

    /// Shift backups up (`.1` → `.2` …), move the active file to `.1`,
    /// and start a fresh file. Rotation failure disables the sink.
    fn rotate(&mut self) {
        self.file = None;
        if self.rotation.backups > 0 {
            let backup = |n: usize| PathBuf::from(format!("{}.{n}", self.path.display()));
            let _ = fs::remove_file(backup(self.rotation.backups));
            for n in (1..self.rotation.backups).rev() {
                let _ = fs::rename(backup(n), backup(n + 1));
            }
            if let Err(e) = fs::rename(&self.path, backup(1)) {
                tracing::warn!(path = %self.path.display(), error = %e, "log rotation failed; disabling sink");
                self.disabled = true;
                return;
            }
        } else if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "log truncation failed; disabling sink");
            self.disabled = true;
            return;
        }
        match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(file) => {
                self.file = Some(file);
                self.written = 0;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "log reopen failed; disabling sink");
                self.disabled = true;
            }
        }
    }
}

#[cfg(test)]
#[path = "logsink_tests.rs"]
mod tests;
