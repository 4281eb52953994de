// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedded storage for the session index.
//!
//! Two tables (`sessions`, `messages`) plus a `meta` row carrying the
//! schema version. When the stored version differs from
//! [`SCHEMA_VERSION`], both tables are dropped and rebuilt — that is the
//! upgrade path whenever the counting or classification rules change.
//!
//! Single-writer discipline: every access goes through the connection
//! mutex; the index funnels all writes through its sync routine.

use crate::error::IndexError;
use crate::parser::ParsedTranscript;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use tether_core::{MessageKind, SessionId};

/// Bump when counting or classification rules change.
const SCHEMA_VERSION: i64 = 3;

/// One listed session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEntry {
    pub session_id: SessionId,
    pub summary: Option<String>,
    pub message_count: i64,
    pub last_updated: DateTime<Utc>,
    pub branch: Option<String>,
}

/// One stored transcript message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub line_num: i64,
    pub kind: MessageKind,
    pub uuid: Option<String>,
    pub timestamp: Option<String>,
    pub git_branch: Option<String>,
    /// Raw JSON body, verbatim from the transcript.
    pub body: Value,
    pub is_context_compaction: bool,
}

/// Page direction for [`Store::get_messages`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageOrder {
    #[default]
    Asc,
    Desc,
}

/// One page of messages plus pagination state.
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePage {
    pub messages: Vec<MessageRow>,
    pub total: i64,
    pub has_more: bool,
}

pub(crate) struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database, rebuilding on schema mismatch.
    pub(crate) fn open(path: &Path) -> Result<Self, IndexError> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), IndexError> {
        let conn = self.conn.lock();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )?;
        let stored: Option<i64> = conn
            .query_row("SELECT value FROM meta WHERE key = 'schema_version'", [], |row| {
                row.get::<_, String>(0)
            })
            .optional()?
            .and_then(|v| v.parse().ok());

        if stored != Some(SCHEMA_VERSION) {
            if let Some(version) = stored {
                tracing::info!(from = version, to = SCHEMA_VERSION, "index schema changed; rebuilding");
            }
            conn.execute("DROP TABLE IF EXISTS sessions", [])?;
            conn.execute("DROP TABLE IF EXISTS messages", [])?;
            conn.execute(
                "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?1)",
                params![SCHEMA_VERSION.to_string()],
            )?;
        }

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                summary TEXT,
                message_count INTEGER NOT NULL,
                last_updated INTEGER NOT NULL,
                branch TEXT,
                file_path TEXT NOT NULL,
                file_mtime INTEGER NOT NULL,
                indexed_at INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                session_id TEXT NOT NULL,
                line_num INTEGER NOT NULL,
                kind TEXT NOT NULL,
                uuid TEXT,
                timestamp TEXT,
                git_branch TEXT,
                body_json TEXT NOT NULL,
                is_context_compaction INTEGER NOT NULL DEFAULT 0,
                UNIQUE (session_id, line_num)
            )",
            [],
        )?;
        Ok(())
    }

    /// Cached file mtime for staleness checks.
    pub(crate) fn cached_mtime(&self, session_id: &str) -> Result<Option<i64>, IndexError> {
        let conn = self.conn.lock();
        let mtime = conn
            .query_row(
                "SELECT file_mtime FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(mtime)
    }

    /// Replace a session's row and messages in one transaction.
    pub(crate) fn replace_session(
        &self,
        session_id: &str,
        file_path: &str,
        file_mtime: i64,
        parsed: &ParsedTranscript,
    ) -> Result<(), IndexError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM messages WHERE session_id = ?1", params![session_id])?;
        tx.execute(
            "INSERT OR REPLACE INTO sessions
                (session_id, summary, message_count, last_updated, branch,
                 file_path, file_mtime, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session_id,
                parsed.summary,
                parsed.message_count,
                file_mtime,
                parsed.branch,
                file_path,
                file_mtime,
                Utc::now().timestamp_millis(),
            ],
        )?;
        for message in &parsed.messages {
            tx.execute(
                "INSERT OR REPLACE INTO messages
                    (session_id, line_num, kind, uuid, timestamp, git_branch,
                     body_json, is_context_compaction)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    session_id,
                    message.line_num,
                    message.kind.as_str(),
                    message.uuid,
                    message.timestamp,
                    message.git_branch,
                    message.body.to_string(),
                    message.is_context_compaction,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Drop rows whose session id is no longer present on disk.
    pub(crate) fn retain_sessions(&self, live: &[String]) -> Result<(), IndexError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let stored: Vec<String> = {
            let mut stmt = tx.prepare("SELECT session_id FROM sessions")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };
        for session_id in stored {
            if !live.contains(&session_id) {
                tx.execute("DELETE FROM sessions WHERE session_id = ?1", params![session_id])?;
                tx.execute("DELETE FROM messages WHERE session_id = ?1", params![session_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Sessions with at least one counted message, newest first.
    pub(crate) fn list_sessions(&self) -> Result<Vec<SessionEntry>, IndexError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT session_id, summary, message_count, last_updated, branch
             FROM sessions
             WHERE message_count > 0
             ORDER BY last_updated DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            let millis: i64 = row.get(3)?;
            Ok(SessionEntry {
                session_id: SessionId::new(row.get::<_, String>(0)?),
                summary: row.get(1)?,
                message_count: row.get(2)?,
                last_updated: Utc
                    .timestamp_millis_opt(millis)
                    .single()
                    .unwrap_or_else(Utc::now),
                branch: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// File path and cached mtime for a session, if indexed.
    pub(crate) fn session_file(&self, session_id: &str) -> Result<Option<(String, i64)>, IndexError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT file_path, file_mtime FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row)
    }

    /// One page of a session's messages plus the total row count,
    /// computed inside a single transaction so `has_more` stays
    /// consistent under concurrent appends.
    pub(crate) fn get_messages(
        &self,
        session_id: &str,
        limit: i64,
        offset: i64,
        order: MessageOrder,
    ) -> Result<MessagePage, IndexError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let total: i64 = tx.query_row(
            "SELECT COUNT(*) FROM messages WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        let sql = match order {
            MessageOrder::Asc => {
                "SELECT line_num, kind, uuid, timestamp, git_branch, body_json,
                        is_context_compaction
                 FROM messages WHERE session_id = ?1
                 ORDER BY line_num ASC LIMIT ?2 OFFSET ?3"
            }
            MessageOrder::Desc => {
                "SELECT line_num, kind, uuid, timestamp, git_branch, body_json,
                        is_context_compaction
                 FROM messages WHERE session_id = ?1
                 ORDER BY line_num DESC LIMIT ?2 OFFSET ?3"
            }
        };
        let messages = {
            let mut stmt = tx.prepare(sql)?;
            let rows = stmt.query_map(params![session_id, limit, offset], |row| {
                let kind: String = row.get(1)?;
                let body: String = row.get(5)?;
                Ok(MessageRow {
                    line_num: row.get(0)?,
                    kind: MessageKind::from_wire(&kind),
                    uuid: row.get(2)?,
                    timestamp: row.get(3)?,
                    git_branch: row.get(4)?,
                    body: serde_json::from_str(&body).unwrap_or(Value::Null),
                    is_context_compaction: row.get(6)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        tx.commit()?;
        let has_more = offset.saturating_add(limit) < total;
        Ok(MessagePage { messages, total, has_more })
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
