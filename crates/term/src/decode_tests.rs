// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    sgr_color = { "\u{1b}[31mred\u{1b}[0m", "red" },
    cursor_home = { "\u{1b}[2J\u{1b}[Htop", "top" },
    osc_title_bel = { "\u{1b}]0;window title\u{7}body", "body" },
    osc_title_st = { "\u{1b}]8;;http://x\u{1b}\\link", "link" },
    dcs = { "\u{1b}Pq#0;2;0;0;0\u{1b}\\after", "after" },
    charset = { "\u{1b}(Btext", "text" },
    bare_escape_pair = { "\u{1b}=x", "x" },
    plain = { "no escapes here", "no escapes here" },
)]
fn strip_escapes_removes_sequences(input: &str, expected: &str) {
    assert_eq!(strip_escapes(input), expected);
}

#[test]
fn strip_escapes_expands_cursor_forward() {
    assert_eq!(strip_escapes("a\u{1b}[3Cb"), "a   b");
    assert_eq!(strip_escapes("a\u{1b}[Cb"), "a b");
}

#[test]
fn strip_escapes_clamps_cursor_forward() {
    let out = strip_escapes("\u{1b}[99999Cx");
    assert_eq!(out.chars().count(), 201);
    assert!(out.ends_with('x'));
}

#[test]
fn strip_escapes_keeps_newline_cr_tab() {
    assert_eq!(strip_escapes("a\tb\rc\nd"), "a\tb\rc\nd");
}

#[test]
fn strip_escapes_drops_other_controls() {
    assert_eq!(strip_escapes("a\u{0}b\u{8}c\u{7f}d"), "abcd");
}

#[test]
fn strip_escapes_is_idempotent() {
    let once = strip_escapes("\u{1b}[1;32m✻\u{1b}[0m Thinking…\u{1b}[K");
    assert_eq!(strip_escapes(&once), once);
}

#[test]
fn parse_line_trims_trailing_but_keeps_indent() {
    let decoded = parse_line("  \u{1b}[2m❯ 1. Yes\u{1b}[0m   ");
    assert_eq!(decoded.clean, "  ❯ 1. Yes");
    assert_eq!(decoded.raw, "  \u{1b}[2m❯ 1. Yes\u{1b}[0m   ");
}

#[test]
fn spinner_with_glyph_and_message() {
    let parts = spinner_parts("✻ Thinking… (esc to interrupt)").unwrap();
    assert_eq!(parts.symbol.as_deref(), Some("✻"));
    assert_eq!(parts.message.as_deref(), Some("Thinking…"));
}

#[test]
fn spinner_last_cr_frame_wins() {
    let parts = spinner_parts("✢ Brewing… (esc to interrupt)\r✻ Percolating… (esc to interrupt)")
        .unwrap();
    assert_eq!(parts.symbol.as_deref(), Some("✻"));
    assert_eq!(parts.message.as_deref(), Some("Percolating…"));
}

#[test]
fn spinner_bare_glyph_is_symbol_only() {
    let parts = spinner_parts("✽").unwrap();
    assert_eq!(parts.symbol.as_deref(), Some("✽"));
    assert!(parts.message.is_none());
}

#[test]
fn spinner_message_without_glyph_needs_ellipsis() {
    let parts = spinner_parts("Compacting conversation… (ctrl+c to interrupt)").unwrap();
    assert!(parts.symbol.is_none());
    assert_eq!(parts.message.as_deref(), Some("Compacting conversation…"));
}

#[parameterized(
    prompt_cursor = { "❯ Try \"fix the failing test\"" },
    result_glyph = { "⏺ Ran: cargo check…" },
    result_tail = { "  ⎿ Read 42 lines…" },
    plain_text = { "just some ordinary output" },
    no_token = { "✻ Thinking about it" },
)]
fn non_spinner_lines(line: &str) {
    assert!(spinner_parts(line).is_none(), "{line:?} should not be a spinner");
}

#[test]
fn overlong_lines_are_not_spinners() {
    let long = format!("✻ {}… (esc to interrupt)", "x".repeat(90));
    assert!(spinner_parts(&long).is_none());
}

#[parameterized(
    question = { "Do you want to proceed?", true },
    indented = { "  Continue anyway?", true },
    tip = { "Tip: want to see this file? Press o", false },
    statement = { "All tests passed.", false },
)]
fn question_detection(line: &str, expected: bool) {
    assert_eq!(is_question(line), expected);
}

#[parameterized(
    plain_error = { "Error: connection refused", true },
    failed = { "Failed: could not resolve host", true },
    exception = { "Exception: oops", true },
    class_name = { "TypeError: cannot read property", true },
    indented = { "   ValueError: bad input", true },
    quoted = { "echo \"Error: not a real one\"", false },
    grep_pattern = { "grep -n 'Error:' src/main.rs", false },
    mid_sentence = { "the last Error: was transient", false },
)]
fn error_detection(line: &str, expected: bool) {
    assert_eq!(is_error(line), expected);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // No control bytes survive except \n, \r, \t; no escape introducers.
        #[test]
        fn stripped_output_has_no_control_bytes(input in "\\PC*") {
            let out = strip_escapes(&input);
            for c in out.chars() {
                prop_assert!(
                    c == '\n' || c == '\r' || c == '\t' || !c.is_control(),
                    "control char {c:?} survived"
                );
            }
            prop_assert!(!out.contains('\u{1b}'), "escape introducer survived");
        }

        #[test]
        fn strip_is_idempotent(input in "\\PC*") {
            let once = strip_escapes(&input);
            prop_assert_eq!(strip_escapes(&once), once);
        }
    }
}
