// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spinner event coalescing.
//!
//! The terminal redraws spinner frames many times a second. Events are
//! intentionally lossy: a frame is published only when the symbol or
//! message actually changed and the debounce interval has elapsed.
//! Symbol-only frames are held back until a message is known; a message
//! frame with no symbol reuses the last seen symbol.

use std::time::{Duration, Instant};
use tether_term::SpinnerParts;

/// A spinner frame that passed debounce and change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinnerUpdate {
    pub symbol: String,
    pub message: String,
}

impl SpinnerUpdate {
    /// Rendered form, as shown on the terminal.
    pub fn text(&self) -> String {
        format!("{} {}", self.symbol, self.message)
    }
}

pub struct SpinnerTracker {
    debounce: Duration,
    last_emit: Option<Instant>,
    symbol: Option<String>,
    message: Option<String>,
}

impl SpinnerTracker {
    pub fn new(debounce: Duration) -> Self {
        Self { debounce, last_emit: None, symbol: None, message: None }
    }

    /// Feed one observed frame; returns an update when it should be
    /// published.
    pub fn observe(&mut self, parts: SpinnerParts, now: Instant) -> Option<SpinnerUpdate> {
        let symbol_changed = parts.symbol.is_some() && parts.symbol != self.symbol;
        let message_changed = parts.message.is_some() && parts.message != self.message;

        if let Some(symbol) = parts.symbol {
            self.symbol = Some(symbol);
        }
        if let Some(message) = parts.message {
            self.message = Some(message);
        }

        // Nothing to say until a message is known.
        let message = self.message.clone()?;
        if !symbol_changed && !message_changed {
            return None;
        }
        if self.last_emit.is_some_and(|t| now.duration_since(t) < self.debounce) {
            return None;
        }
        self.last_emit = Some(now);
        Some(SpinnerUpdate { symbol: self.symbol.clone().unwrap_or_default(), message })
    }

    /// Forget frame state between runs (or across idle transitions).
    pub fn reset(&mut self) {
        self.last_emit = None;
        self.symbol = None;
        self.message = None;
    }
}

#[cfg(test)]
#[path = "spinner_tests.rs"]
mod tests;
