// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission prompt parsing and the auto-deny path.

use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{PromptDescriptor, PromptKind, SessionId};
use tether_hub::{EventHub, Subscriber};
use tether_supervisor::{PtyProcessor, SharedWriter};
use tether_term::PromptParser;

#[test]
fn write_permission_panel_parses_completely() {
    let mut parser = PromptParser::new();
    let lines = [
        "Write(hello.txt)",
        "",
        "Create file hello.txt",
        "─────────────────────",
        " Hello World",
        "",
        "─────────────────────",
        " Do you want to create hello.txt?",
        " ❯ 1. Yes",
        "   2. Yes, allow all edits during this session (shift+tab)",
        "   3. Type here to tell Claude what to do differently",
        "",
        " Esc to cancel",
    ];
    let mut descriptors = Vec::new();
    for line in lines {
        if let Some(d) = parser.push_line(line).descriptor {
            descriptors.push(d);
        }
    }
    assert_eq!(descriptors.len(), 1);
    let d = &descriptors[0];
    assert_eq!(d.kind, PromptKind::WriteFile);
    assert_eq!(d.target, "hello.txt");
    assert!(d.options.len() >= 3);
    assert_eq!(d.options[0].key, "1");
    assert!(d.options[0].selected);
    assert_eq!(d.options[1].key, "2");
    assert_eq!(d.options[2].key, "3");
}

#[test]
fn trust_folder_prompt_parses_to_yes_no() {
    let mut parser = PromptParser::new();
    let lines = [
        "Do you want to trust the files in this folder and allow Claude to proceed?",
        "",
        "/private/tmp/pty-test",
        "",
        "❯ Yes, proceed",
        "  No, exit",
    ];
    let mut descriptors = Vec::new();
    for line in lines {
        if let Some(d) = parser.push_line(line).descriptor {
            descriptors.push(d);
        }
    }
    assert_eq!(descriptors.len(), 1);
    let d = &descriptors[0];
    assert_eq!(d.kind, PromptKind::TrustFolder);
    assert_eq!(d.target, "/private/tmp/pty-test");
    assert_eq!(d.options.len(), 2);
    assert_eq!((d.options[0].key.as_str(), d.options[0].label.as_str()), ("y", "Yes, proceed"));
    assert_eq!((d.options[1].key.as_str(), d.options[1].label.as_str()), ("n", "No, exit"));
}

#[derive(Clone, Default)]
struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn prompt_with_no_subscribers_is_auto_denied_with_esc() {
    let hub = EventHub::default();
    // Internal-only subscribers: the logger and the index.
    let mut internal = hub.subscribe(Subscriber::new("logger").internal());

    let capture = CaptureWriter::default();
    let written = Arc::clone(&capture.0);
    let writer: SharedWriter = Arc::new(Mutex::new(Box::new(capture)));
    let pending: Arc<Mutex<Option<PromptDescriptor>>> = Arc::new(Mutex::new(None));

    let mut processor = PtyProcessor::new(
        hub,
        writer,
        Arc::clone(&pending),
        None,
        Some(SessionId::new("s1")),
        Duration::from_millis(150),
    );
    for line in [
        "Write(hello.txt)",
        "Do you want to create hello.txt?",
        "❯ 1. Yes",
        "  2. No, and tell Claude what to do differently",
        "",
    ] {
        processor.handle_line(line);
    }

    assert!(pending.lock().is_none(), "denied prompt is not cached");
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(written.lock().as_slice(), &[0x1b], "ESC lands after ~100ms");

    // No permission_request ever reached the internal subscriber either.
    while let Ok(ev) = internal.events.try_recv() {
        assert_ne!(ev.kind(), tether_core::EventKind::PermissionRequest);
    }
}
