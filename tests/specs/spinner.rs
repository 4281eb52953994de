// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spinner debounce and coalescing.

use std::time::{Duration, Instant};
use tether_supervisor::SpinnerTracker;
use tether_term::spinner_parts;

#[test]
fn identical_frames_in_a_window_coalesce_to_one_event() {
    let mut tracker = SpinnerTracker::new(Duration::from_millis(150));
    let start = Instant::now();

    let frame = spinner_parts("✻ Thinking… (esc to interrupt)").expect("spinner frame");
    let mut emitted = 0;
    for offset in [0u64, 100, 250] {
        if tracker
            .observe(frame.clone(), start + Duration::from_millis(offset))
            .is_some()
        {
            emitted += 1;
        }
    }
    assert_eq!(emitted, 1, "three identical frames within 300ms emit once");

    // A changed message after the debounce interval emits again.
    let changed = spinner_parts("✻ Compacting… (esc to interrupt)").expect("spinner frame");
    let update = tracker
        .observe(changed, start + Duration::from_millis(450))
        .expect("changed frame emits");
    assert_eq!(update.message, "Compacting…");
}
