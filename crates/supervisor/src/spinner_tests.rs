// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn parts(symbol: Option<&str>, message: Option<&str>) -> SpinnerParts {
    SpinnerParts {
        symbol: symbol.map(str::to_string),
        message: message.map(str::to_string),
    }
}

fn tracker() -> SpinnerTracker {
    SpinnerTracker::new(Duration::from_millis(150))
}

#[test]
fn identical_frames_within_window_emit_once() {
    let mut t = tracker();
    let start = Instant::now();
    let first = t.observe(parts(Some("✻"), Some("Thinking…")), start);
    assert!(first.is_some());
    // Two identical redraws inside 300 ms: change detection silences both.
    assert!(t.observe(parts(Some("✻"), Some("Thinking…")), start + Duration::from_millis(100)).is_none());
    assert!(t.observe(parts(Some("✻"), Some("Thinking…")), start + Duration::from_millis(250)).is_none());
}

#[test]
fn changed_message_after_debounce_emits_again() {
    let mut t = tracker();
    let start = Instant::now();
    assert!(t.observe(parts(Some("✻"), Some("Thinking…")), start).is_some());
    let second = t
        .observe(parts(Some("✻"), Some("Compacting…")), start + Duration::from_millis(200))
        .unwrap();
    assert_eq!(second.message, "Compacting…");
    assert_eq!(second.symbol, "✻");
}

#[test]
fn changed_message_inside_debounce_is_suppressed() {
    let mut t = tracker();
    let start = Instant::now();
    assert!(t.observe(parts(Some("✻"), Some("Thinking…")), start).is_some());
    // Changed but too soon — spinner events are intentionally lossy.
    assert!(t.observe(parts(Some("✻"), Some("Compacting…")), start + Duration::from_millis(50)).is_none());
}

#[test]
fn symbol_only_frames_wait_for_a_message() {
    let mut t = tracker();
    let start = Instant::now();
    assert!(t.observe(parts(Some("✢"), None), start).is_none());
    assert!(t.observe(parts(Some("✳"), None), start + Duration::from_millis(200)).is_none());
    let update = t
        .observe(parts(None, Some("Brewing…")), start + Duration::from_millis(400))
        .unwrap();
    assert_eq!(update.symbol, "✳", "latest symbol is reused");
    assert_eq!(update.message, "Brewing…");
    assert_eq!(update.text(), "✳ Brewing…");
}

#[test]
fn message_without_symbol_reuses_last_symbol() {
    let mut t = tracker();
    let start = Instant::now();
    assert!(t.observe(parts(Some("✻"), Some("Thinking…")), start).is_some());
    let update = t
        .observe(parts(None, Some("Writing…")), start + Duration::from_millis(200))
        .unwrap();
    assert_eq!(update.symbol, "✻");
}

#[test]
fn reset_forgets_everything() {
    let mut t = tracker();
    let start = Instant::now();
    assert!(t.observe(parts(Some("✻"), Some("Thinking…")), start).is_some());
    t.reset();
    // Same frame is new again after a reset.
    assert!(t.observe(parts(Some("✻"), Some("Thinking…")), start + Duration::from_millis(1)).is_some());
}
