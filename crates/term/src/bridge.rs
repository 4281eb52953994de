// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission prompt bridge.
//!
//! A stateful, line-oriented parser over cleaned terminal lines. It keeps
//! a bounded rolling buffer, watches for the agent's permission dialogs
//! (header, preview, affirmative question, options, end marker), and
//! emits at most one [`PromptDescriptor`] per detected prompt. The
//! bridge never writes to the PTY; routing a response back is the
//! supervisor's job.

use crate::decode::{is_error, is_question, spinner_parts};
use regex::Regex;
use std::collections::VecDeque;
use std::sync::LazyLock;
use tether_core::{PromptDescriptor, PromptKind, PromptOption};

/// Rolling buffer cap. A permission dialog fits comfortably; anything
/// that scrolls past this without completing is stale.
const BUFFER_CAP: usize = 30;

/// Coarse classification of a single terminal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    Idle,
    Thinking,
    Permission,
    Question,
    Error,
}

/// Result of feeding one line to the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeResult {
    /// Classification derived from this line, if it implied one.
    pub class: Option<LineClass>,
    /// A completed prompt, emitted at most once per dialog.
    pub descriptor: Option<PromptDescriptor>,
}

// Allow expect here as the regexes are compile-time verified to be valid
#[allow(clippy::expect_used)]
mod patterns {
    use super::*;

    pub static WRITE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*[⏺●]?\s*(?:Write\((.+?)\)|Write file\b\s*(\S*))")
            .expect("constant regex pattern is valid")
    });
    pub static EDIT: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*[⏺●]?\s*(?:Edit\((.+?)\)|Edit file\b\s*(\S*))")
            .expect("constant regex pattern is valid")
    });
    pub static DELETE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*[⏺●]?\s*Delete\s+(?:file\b\s*)?(\S+)?")
            .expect("constant regex pattern is valid")
    });
    pub static BASH: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*[⏺●]?\s*(?:Bash\((.+?)\)|Bash command\b\s*(.*)|Run command:\s*(.+))")
            .expect("constant regex pattern is valid")
    });
    pub static MCP: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(mcp__[A-Za-z0-9_-]+__[A-Za-z0-9_-]+)")
            .expect("constant regex pattern is valid")
    });
    pub static NUMBERED_OPTION: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*(❯\s*)?(\d+)\.\s*(.+)$").expect("constant regex pattern is valid")
    });
    pub static YESNO_OPTION: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*(❯\s*)?((Yes|No)[, ].*)$").expect("constant regex pattern is valid")
    });
}

fn trust_folder_line(line: &str) -> bool {
    line.contains("trust the files in this folder") || line.contains("work in this folder")
}

fn affirmative_question(line: &str) -> bool {
    let t = line.trim();
    (t.starts_with("Do you want to") && t.ends_with('?'))
        || t == "Allow?"
        || t.starts_with("Do you want to proceed")
}

fn end_marker(line: &str) -> bool {
    let t = line.trim();
    t.contains("Esc to cancel") || t.contains("Enter to confirm")
}

fn divider(line: &str) -> bool {
    let t = line.trim();
    t.len() >= 3 && t.chars().all(|c| matches!(c, '─' | '━' | '═' | '╌' | '╍' | '-'))
}

/// A path-looking line used as the trust-folder target.
fn bare_path(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty()
        && (t.starts_with('/') || t.starts_with('~'))
        && !t.contains(char::is_whitespace)
}

/// Detect the candidate prompt kind and target on one line, in priority
/// order.
fn detect_header(line: &str) -> Option<(PromptKind, String)> {
    if let Some(caps) = patterns::WRITE.captures(line) {
        let target = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or("");
        return Some((PromptKind::WriteFile, target.to_string()));
    }
    if let Some(caps) = patterns::EDIT.captures(line) {
        let target = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or("");
        return Some((PromptKind::EditFile, target.to_string()));
    }
    if let Some(caps) = patterns::DELETE.captures(line) {
        let target = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        return Some((PromptKind::DeleteFile, target.to_string()));
    }
    if let Some(caps) = patterns::BASH.captures(line) {
        let target = caps
            .get(1)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or("");
        return Some((PromptKind::BashCommand, target.trim().to_string()));
    }
    if let Some(caps) = patterns::MCP.captures(line) {
        let target = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        return Some((PromptKind::McpTool, target.to_string()));
    }
    if trust_folder_line(line) {
        return Some((PromptKind::TrustFolder, String::new()));
    }
    None
}

/// Stateful permission-prompt parser over cleaned terminal lines.
///
/// Confined to the supervisor's single PTY reader loop; not shared.
pub struct PromptParser {
    buffer: VecDeque<String>,
    candidate: Option<(PromptKind, String)>,
}

impl Default for PromptParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptParser {
    pub fn new() -> Self {
        Self { buffer: VecDeque::with_capacity(BUFFER_CAP), candidate: None }
    }

    /// Number of buffered lines (never exceeds the cap).
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Called when the supervisor transitions to idle: any half-seen
    /// dialog is stale.
    pub fn set_idle(&mut self) {
        self.buffer.clear();
        self.candidate = None;
    }

    /// Feed one cleaned line; returns the line's classification and a
    /// completed descriptor when a full dialog has been seen.
    pub fn push_line(&mut self, clean: &str) -> BridgeResult {
        let spinner = spinner_parts(clean);
        let class = if spinner.as_ref().is_some_and(|s| s.message.is_some()) {
            Some(LineClass::Thinking)
        } else if is_error(clean) {
            Some(LineClass::Error)
        } else if idle_composer_line(clean) {
            Some(LineClass::Idle)
        } else if spinner.is_none() && is_question(clean) {
            Some(LineClass::Question)
        } else {
            None
        };

        if let Some((kind, target)) = detect_header(clean) {
            // Keep a non-empty target over a later empty re-match.
            match &self.candidate {
                Some((existing, t)) if *existing == kind && !t.is_empty() && target.is_empty() => {}
                _ => self.candidate = Some((kind, target)),
            }
        } else if self.pending_trust_target_missing() && bare_path(clean) {
            if let Some((_, target)) = self.candidate.as_mut() {
                *target = clean.trim().to_string();
            }
        }

        self.buffer.push_back(clean.to_string());
        if self.buffer.len() > BUFFER_CAP {
            // Stale detection: the dialog never completed.
            while self.buffer.len() > BUFFER_CAP {
                self.buffer.pop_front();
            }
            self.candidate = None;
        }

        if class == Some(LineClass::Idle) {
            self.set_idle();
            return BridgeResult { class, descriptor: None };
        }

        match self.try_complete() {
            Some(descriptor) => {
                self.buffer.clear();
                self.candidate = None;
                BridgeResult { class: Some(LineClass::Permission), descriptor: Some(descriptor) }
            }
            None => BridgeResult { class, descriptor: None },
        }
    }

    fn pending_trust_target_missing(&self) -> bool {
        matches!(&self.candidate, Some((PromptKind::TrustFolder, t)) if t.is_empty())
    }

    /// Check the buffer for a completed dialog and extract it.
    fn try_complete(&self) -> Option<PromptDescriptor> {
        let lines: Vec<&str> = self.buffer.iter().map(String::as_str).collect();
        let question_idx = lines.iter().position(|l| affirmative_question(l))?;

        let options = extract_options(&lines[question_idx + 1..]);
        if options.is_empty() {
            return None;
        }

        // End of prompt: an explicit marker after the question, or an
        // empty line after the last option, or (Yes/No layout) a "No"
        // option closing the pair.
        let after_question = &lines[question_idx + 1..];
        let last_option_offset = after_question
            .iter()
            .rposition(|l| {
                patterns::NUMBERED_OPTION.is_match(l) || patterns::YESNO_OPTION.is_match(l)
            })?;
        let ended = after_question.iter().any(|l| end_marker(l))
            || after_question
                .get(last_option_offset + 1..)
                .is_some_and(|rest| rest.iter().any(|l| l.trim().is_empty()))
            || options.iter().any(|o| o.key == "n");
        if !ended {
            return None;
        }

        let (kind, target) = self
            .candidate
            .clone()
            .unwrap_or((PromptKind::Unknown, String::new()));

        let mut descriptor = PromptDescriptor::new(kind, target);
        descriptor.preview = extract_preview(&lines[..question_idx]);
        descriptor.options = options;
        Some(descriptor)
    }
}

/// The composer line the agent draws when idle and ready for input.
fn idle_composer_line(clean: &str) -> bool {
    let t = clean.trim();
    if !t.starts_with('❯') {
        return false;
    }
    // Option lines also carry the cursor glyph; they are not the composer.
    !patterns::NUMBERED_OPTION.is_match(t) && !patterns::YESNO_OPTION.is_match(t)
}

/// Scan forward from the affirmative question and collect option lines.
///
/// Two layouts: numbered (`❯ 1. Yes`) and Yes/No text (`❯ Yes, proceed`).
/// Options come back in source order with the cursor line flagged.
fn extract_options(lines: &[&str]) -> Vec<PromptOption> {
    let mut numbered = Vec::new();
    let mut yesno = Vec::new();
    for line in lines {
        if end_marker(line) {
            break;
        }
        if let Some(caps) = patterns::NUMBERED_OPTION.captures(line) {
            let selected = caps.get(1).is_some();
            let key = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let label = caps.get(3).map(|m| m.as_str().trim()).unwrap_or_default();
            let mut option = PromptOption::new(key, label);
            option.selected = selected;
            numbered.push(option);
            continue;
        }
        if let Some(caps) = patterns::YESNO_OPTION.captures(line) {
            let selected = caps.get(1).is_some();
            let label = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
            let key = if caps.get(3).map(|m| m.as_str()) == Some("Yes") { "y" } else { "n" };
            let mut option = PromptOption::new(key, label);
            option.selected = selected;
            yesno.push(option);
        }
    }
    if numbered.is_empty() {
        yesno
    } else {
        numbered
    }
}

/// Preview is the non-blank content between the first and last divider
/// glyphs ahead of the question.
fn extract_preview(lines: &[&str]) -> Option<String> {
    let first = lines.iter().position(|l| divider(l))?;
    let last = lines.iter().rposition(|l| divider(l))?;
    if last <= first {
        return None;
    }
    let body: Vec<&str> = lines[first + 1..last]
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !divider(l))
        .collect();
    if body.is_empty() {
        return None;
    }
    Some(body.join("\n"))
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
