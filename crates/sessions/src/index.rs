// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session index: directory scanning, incremental maintenance, and
//! the read APIs.
//!
//! Ownership: this component owns the on-disk cache database and the
//! directory watch. It observes the supervisor only indirectly, by
//! watching the same transcripts the agent writes.

use crate::error::IndexError;
use crate::parser;
use crate::store::{MessageOrder, MessagePage, SessionEntry, Store};
use crate::tail;
use notify::{RecursiveMode, Watcher};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tether_core::SessionId;
use tether_hub::EventHub;
use tokio_util::sync::CancellationToken;

// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static UUID_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\.jsonl$")
        .expect("constant regex pattern is valid")
});

#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Directory holding `<session-uuid>.jsonl` transcripts.
    pub transcript_dir: PathBuf,
    /// Location of the index database.
    pub db_path: PathBuf,
    /// Settle time after a filesystem event before re-parsing.
    pub debounce: Duration,
    /// Full-scan backstop against missed events.
    pub reconcile_interval: Duration,
}

impl IndexConfig {
    pub fn new(transcript_dir: impl Into<PathBuf>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            transcript_dir: transcript_dir.into(),
            db_path: db_path.into(),
            debounce: Duration::from_millis(200),
            reconcile_interval: Duration::from_secs(300),
        }
    }
}

pub(crate) struct IndexInner {
    pub(crate) store: Store,
    pub(crate) config: IndexConfig,
    pub(crate) hub: EventHub,
    pub(crate) tail: Mutex<Option<tail::TailHandle>>,
    pub(crate) cancel: CancellationToken,
}

/// Queryable, incrementally refreshed index over session transcripts.
#[derive(Clone)]
pub struct SessionIndex {
    inner: Arc<IndexInner>,
}

impl SessionIndex {
    /// Open the index database. This is the one startup step that is
    /// allowed to be fatal; everything after degrades gracefully.
    pub fn open(config: IndexConfig, hub: EventHub) -> Result<Self, IndexError> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Store::open(&config.db_path)?;
        Ok(Self {
            inner: Arc::new(IndexInner {
                store,
                config,
                hub,
                tail: Mutex::new(None),
                cancel: CancellationToken::new(),
            }),
        })
    }

    /// Scan the transcript directory, re-parsing changed files and
    /// dropping sessions that no longer exist on disk.
    pub fn full_sync(&self) -> Result<(), IndexError> {
        self.inner.full_sync()
    }

    /// Sessions with at least one counted message, newest first.
    pub fn list_sessions(&self) -> Result<Vec<SessionEntry>, IndexError> {
        self.inner.store.list_sessions()
    }

    /// One page of a session's indexed messages.
    pub fn get_messages(
        &self,
        session_id: &SessionId,
        limit: i64,
        offset: i64,
        order: MessageOrder,
    ) -> Result<MessagePage, IndexError> {
        if self.inner.store.session_file(session_id.as_str())?.is_none() {
            return Err(IndexError::UnknownSession(session_id.to_string()));
        }
        self.inner
            .store
            .get_messages(session_id.as_str(), limit, offset, order)
    }

    /// Begin tailing a session: new transcript lines are published as
    /// `session_message` events until unwatched.
    pub fn watch_session(&self, session_id: &SessionId) -> Result<(), IndexError> {
        let Some((file_path, _)) = self.inner.store.session_file(session_id.as_str())? else {
            return Err(IndexError::UnknownSession(session_id.to_string()));
        };
        let mut slot = self.inner.tail.lock();
        if let Some(existing) = slot.as_ref() {
            if existing.session_id == *session_id {
                return Ok(());
            }
            return Err(IndexError::AlreadyWatching(existing.session_id.to_string()));
        }
        let handle = tail::spawn(
            self.inner.hub.clone(),
            session_id.clone(),
            PathBuf::from(file_path),
            self.inner.cancel.child_token(),
            self.inner.config.debounce,
        );
        *slot = Some(handle);
        Ok(())
    }

    /// Stop the live tail, if one is running.
    pub fn unwatch_session(&self) {
        if let Some(handle) = self.inner.tail.lock().take() {
            handle.stop();
        }
    }

    /// The session currently being tailed.
    pub fn watched_session(&self) -> Option<SessionId> {
        self.inner.tail.lock().as_ref().map(|h| h.session_id.clone())
    }

    /// Spawn the maintenance loop: a directory watch feeding a
    /// debounced pending-set, plus the reconciliation timer.
    pub fn start(&self) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.maintenance_loop().await });
    }

    /// Stop all background work, including any live tail.
    pub fn shutdown(&self) {
        self.unwatch_session();
        self.inner.cancel.cancel();
    }
}

impl IndexInner {
    fn full_sync(&self) -> Result<(), IndexError> {
        let mut live = Vec::new();
        let entries = match std::fs::read_dir(&self.config.transcript_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // No transcripts yet; nothing to drop either.
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let Some(session_id) = session_id_for(&path) else {
                continue;
            };
            live.push(session_id.clone());
            if let Err(e) = self.refresh_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to index transcript");
            }
        }
        self.store.retain_sessions(&live)?;
        Ok(())
    }

    /// Re-parse one transcript if its mtime moved since the last index.
    fn refresh_file(&self, path: &Path) -> Result<(), IndexError> {
        let Some(session_id) = session_id_for(path) else {
            return Ok(());
        };
        let mtime = file_mtime_millis(path)?;
        if self.store.cached_mtime(&session_id)? == Some(mtime) {
            return Ok(());
        }
        let content = std::fs::read_to_string(path)?;
        let parsed = parser::parse_transcript(&content);
        self.store
            .replace_session(&session_id, &path.to_string_lossy(), mtime, &parsed)?;
        tracing::debug!(
            session_id,
            messages = parsed.message_count,
            "transcript indexed"
        );
        Ok(())
    }

    async fn maintenance_loop(self: Arc<Self>) {
        let (fs_tx, mut fs_rx) = tokio::sync::mpsc::unbounded_channel::<PathBuf>();
        let mut watcher = match notify::recommended_watcher(
            move |res: Result<notify::Event, notify::Error>| {
                if let Ok(event) = res {
                    for path in event.paths {
                        let _ = fs_tx.send(path);
                    }
                }
            },
        ) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "transcript watch unavailable; relying on reconciliation");
                None
            }
        };
        if let Some(w) = watcher.as_mut() {
            if let Err(e) = w.watch(&self.config.transcript_dir, RecursiveMode::NonRecursive) {
                tracing::warn!(error = %e, "transcript watch failed; relying on reconciliation");
                watcher = None;
            }
        }
        // Keep the watcher alive for the duration of the loop.
        let _watcher = watcher;

        let mut pending: HashMap<PathBuf, Instant> = HashMap::new();
        let mut flush = tokio::time::interval(self.config.debounce);
        let mut reconcile = tokio::time::interval(self.config.reconcile_interval);
        reconcile.tick().await; // swallow the immediate first tick

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                Some(path) = fs_rx.recv() => {
                    if session_id_for(&path).is_some() {
                        pending.insert(path, Instant::now());
                    }
                }
                _ = flush.tick() => {
                    let now = Instant::now();
                    let ready: Vec<PathBuf> = pending
                        .iter()
                        .filter(|(_, seen)| now.duration_since(**seen) >= self.config.debounce)
                        .map(|(path, _)| path.clone())
                        .collect();
                    for path in ready {
                        pending.remove(&path);
                        if path.exists() {
                            if let Err(e) = self.refresh_file(&path) {
                                tracing::warn!(path = %path.display(), error = %e, "incremental index failed");
                            }
                        } else if let Err(e) = self.full_sync() {
                            tracing::warn!(error = %e, "sync after delete failed");
                        }
                    }
                }
                _ = reconcile.tick() => {
                    if let Err(e) = self.full_sync() {
                        tracing::warn!(error = %e, "reconciliation scan failed");
                    }
                }
            }
        }
        tracing::debug!("index maintenance stopped");
    }
}

fn session_id_for(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    if !UUID_FILE.is_match(name) {
        return None;
    }
    Some(name.trim_end_matches(".jsonl").to_string())
}

fn file_mtime_millis(path: &Path) -> Result<i64, IndexError> {
    let modified = std::fs::metadata(path)?.modified()?;
    let millis = modified
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    Ok(millis)
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod tests;
