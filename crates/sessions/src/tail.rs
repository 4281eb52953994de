// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live tail of one transcript.
//!
//! Starts at the file's current size and publishes every newly appended,
//! fully terminated line as a `session_message` event. Two triggers run
//! concurrently: the file watcher (debounced past the last write) and a
//! one-second polling ticker as a backup for missed events.

use crate::parser;
use notify::{RecursiveMode, Watcher};
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tether_core::{EventPayload, RouteContext, SessionId};
use tether_hub::EventHub;
use tokio_util::sync::CancellationToken;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub(crate) struct TailHandle {
    pub(crate) session_id: SessionId,
    cancel: CancellationToken,
}

impl TailHandle {
    pub(crate) fn stop(&self) {
        self.cancel.cancel();
    }
}

/// Start tailing `path`, publishing to the hub until cancelled.
pub(crate) fn spawn(
    hub: EventHub,
    session_id: SessionId,
    path: PathBuf,
    cancel: CancellationToken,
    debounce: Duration,
) -> TailHandle {
    let handle = TailHandle { session_id: session_id.clone(), cancel: cancel.clone() };
    tokio::spawn(async move {
        let mut tail = Tail {
            hub,
            session_id,
            path,
            offset: 0,
        };
        tail.offset = tail.current_size();
        tail.run(cancel, debounce).await;
    });
    handle
}

struct Tail {
    hub: EventHub,
    session_id: SessionId,
    path: PathBuf,
    offset: u64,
}

impl Tail {
    fn current_size(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    async fn run(&mut self, cancel: CancellationToken, debounce: Duration) {
        let (fs_tx, mut fs_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
        let mut watcher = match notify::recommended_watcher(
            move |res: Result<notify::Event, notify::Error>| {
                if matches!(res, Ok(ref event) if event.kind.is_modify() || event.kind.is_create())
                {
                    let _ = fs_tx.send(());
                }
            },
        ) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "tail watch unavailable; polling only");
                None
            }
        };
        if let Some(w) = watcher.as_mut() {
            if let Err(e) = w.watch(&self.path, RecursiveMode::NonRecursive) {
                tracing::warn!(error = %e, "tail watch failed; polling only");
                watcher = None;
            }
        }
        let _watcher = watcher;

        let mut last_write: Option<Instant> = None;
        let mut flush = tokio::time::interval(debounce);
        let mut poll = tokio::time::interval(POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                Some(()) = fs_rx.recv() => {
                    last_write = Some(Instant::now());
                }
                _ = flush.tick() => {
                    if last_write.is_some_and(|t| t.elapsed() >= debounce) {
                        last_write = None;
                        self.drain_new_lines();
                    }
                }
                _ = poll.tick() => {
                    self.drain_new_lines();
                }
            }
        }
        tracing::debug!(session_id = %self.session_id, "tail stopped");
    }

    /// Read any newly appended whole lines and publish them.
    fn drain_new_lines(&mut self) {
        let size = self.current_size();
        if size <= self.offset {
            return;
        }
        let chunk = match self.read_from_offset() {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, "tail read failed");
                return;
            }
        };
        // Only consume fully terminated lines; a partial trailing line
        // waits for its newline.
        let Some(terminated_len) = chunk.rfind('\n').map(|i| i + 1) else {
            return;
        };
        let complete = &chunk[..terminated_len];

        for line in complete.lines() {
            let Some(parsed) = parser::parse_line(0, line) else {
                continue;
            };
            let payload = parser::to_payload(&parsed, &self.session_id);
            self.hub.publish(
                EventPayload::SessionMessage(payload),
                RouteContext::for_session(self.session_id.clone()),
            );
        }
        self.offset += terminated_len as u64;
    }

    fn read_from_offset(&self) -> std::io::Result<String> {
        let mut file = std::fs::File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.offset))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
#[path = "tail_tests.rs"]
mod tests;
