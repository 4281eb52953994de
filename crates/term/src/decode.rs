// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ANSI terminal stream decoding.
//!
//! The agent's TUI writes CSI/OSC/DCS escape sequences, redraws spinner
//! frames with bare carriage returns, and pads layouts with
//! cursor-forward moves. Everything here is a stateless transformation
//! from one raw line to clean text plus derived classifications.

use regex::Regex;
use std::sync::LazyLock;

/// Glyphs the agent uses as spinner frames.
const SPINNER_GLYPHS: &[char] = &[
    '✢', '✳', '✶', '✻', '✽', '·', '*', '⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏',
];

/// Cursor-forward expansions are clamped to this many spaces so a
/// hostile `CSI 2147483647 C` cannot balloon the output.
const MAX_CURSOR_FORWARD: usize = 200;

/// Spinner lines longer than this many visible characters are assumed to
/// be ordinary output that merely contains an ellipsis.
const MAX_SPINNER_WIDTH: usize = 80;

/// A raw terminal line paired with its cleaned form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLine {
    pub raw: String,
    pub clean: String,
}

/// Spinner frame pieces extracted from a cleaned line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpinnerParts {
    pub symbol: Option<String>,
    pub message: Option<String>,
}

/// Remove CSI/OSC/DCS sequences, charset designations, and non-printable
/// control characters (keeping `\n`, `\r`, `\t`).
///
/// Cursor-forward sequences (`CSI n C`) become `n` spaces, clamped to
/// [`MAX_CURSOR_FORWARD`]. Idempotent: a stripped string passes through
/// unchanged.
pub fn strip_escapes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\u{1b}' {
            if c == '\n' || c == '\r' || c == '\t' || !c.is_control() {
                out.push(c);
            }
            continue;
        }
        match chars.peek().copied() {
            Some('[') => {
                chars.next();
                consume_csi(&mut chars, &mut out);
            }
            Some(']') => {
                chars.next();
                consume_until_st(&mut chars, true);
            }
            Some('P') => {
                chars.next();
                consume_until_st(&mut chars, false);
            }
            // Character-set designation: ESC ( B and friends.
            Some('(') | Some(')') | Some('*') | Some('+') => {
                chars.next();
                chars.next();
            }
            Some(_) => {
                chars.next();
            }
            None => {}
        }
    }
    out
}

/// Consume a CSI sequence past its final byte, expanding cursor-forward.
fn consume_csi(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, out: &mut String) {
    let mut params = String::new();
    for c in chars.by_ref() {
        match c {
            // Parameter and intermediate bytes.
            '\u{20}'..='\u{3f}' => params.push(c),
            // Final byte terminates the sequence.
            '\u{40}'..='\u{7e}' => {
                if c == 'C' {
                    let n: usize = params
                        .split(';')
                        .next()
                        .and_then(|p| p.parse().ok())
                        .unwrap_or(1);
                    for _ in 0..n.clamp(1, MAX_CURSOR_FORWARD) {
                        out.push(' ');
                    }
                }
                return;
            }
            // Malformed sequence; stop consuming.
            _ => return,
        }
    }
}

/// Consume an OSC (`bel_terminates`) or DCS sequence through its
/// BEL / ST terminator.
fn consume_until_st(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, bel_terminates: bool) {
    while let Some(c) = chars.next() {
        if bel_terminates && c == '\u{07}' {
            return;
        }
        if c == '\u{1b}' {
            if chars.peek() == Some(&'\\') {
                chars.next();
            }
            return;
        }
    }
}

/// Decode one raw terminal line: the raw text verbatim plus a cleaned
/// form with escapes stripped and trailing whitespace trimmed (leading
/// indentation is meaningful in prompt layouts and is preserved).
pub fn parse_line(raw: &str) -> DecodedLine {
    let clean = strip_escapes(raw).trim_end().to_string();
    DecodedLine { raw: raw.to_string(), clean }
}

fn ends_with_spinner_token(s: &str) -> bool {
    s.ends_with("(esc to interrupt)")
        || s.ends_with("(ctrl+c to interrupt)")
        || s.ends_with('…')
        || s.ends_with("...")
}

fn contains_ellipsis(s: &str) -> bool {
    s.contains('…') || s.contains("...")
}

fn strip_spinner_suffix(s: &str) -> &str {
    let s = s.strip_suffix("(esc to interrupt)").unwrap_or(s);
    let s = s.strip_suffix("(ctrl+c to interrupt)").unwrap_or(s);
    s.trim_end()
}

/// Classify a cleaned line as a spinner frame.
///
/// The terminal redraws spinner frames in place with carriage returns, so
/// the line is split on CR and the last frame wins. Lines showing the
/// prompt cursor, result indicators, or more than [`MAX_SPINNER_WIDTH`]
/// visible characters are never spinners.
pub fn spinner_parts(clean: &str) -> Option<SpinnerParts> {
    if clean.contains('❯') {
        return None;
    }
    let trimmed = clean.trim_start();
    if trimmed.starts_with('⎿') || trimmed.starts_with('⏺') {
        return None;
    }
    if clean.chars().count() > MAX_SPINNER_WIDTH {
        return None;
    }

    let mut found = None;
    for segment in clean.split('\r') {
        let s = segment.trim();
        if s.is_empty() {
            continue;
        }
        let (symbol, rest) = match s.chars().next() {
            Some(first) if SPINNER_GLYPHS.contains(&first) => {
                (Some(first.to_string()), s[first.len_utf8()..].trim_start())
            }
            _ => (None, s),
        };

        // A bare glyph is a frame advance with no message yet.
        if symbol.is_some() && rest.is_empty() {
            found = Some(SpinnerParts { symbol, message: None });
            continue;
        }
        if symbol.is_none() && !contains_ellipsis(s) {
            continue;
        }
        if !ends_with_spinner_token(s) {
            continue;
        }
        let message = strip_spinner_suffix(rest);
        found = Some(SpinnerParts {
            symbol,
            message: (!message.is_empty()).then(|| message.to_string()),
        });
    }
    found
}

/// True for lines that read as a question to the user.
pub fn is_question(clean: &str) -> bool {
    let trimmed = clean.trim();
    !trimmed.starts_with("Tip:") && trimmed.ends_with('?')
}

// Anchored at line start so quoted/grep-embedded matches never fire.
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static ERROR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[A-Za-z_][A-Za-z0-9_]*Error|Error|Failed|Exception):")
        .expect("constant regex pattern is valid")
});

/// True for lines that begin with an error token (`Error:`, `Failed:`,
/// `Exception:`, or a `FooError:` class name).
pub fn is_error(clean: &str) -> bool {
    ERROR_RE.is_match(clean)
}

#[cfg(test)]
#[path = "decode_tests.rs"]
mod tests;
