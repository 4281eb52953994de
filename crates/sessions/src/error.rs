// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Index error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    /// The requested session is not in the index.
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// A tail is already running for another session.
    #[error("already watching session {0}")]
    AlreadyWatching(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
