// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal stream handling for the supervisor's PTY mode
//!
//! Two layers: `decode` turns raw ANSI terminal output into clean text
//! plus spinner/question/error classifications, and `bridge` accumulates
//! cleaned lines into parsed permission-prompt descriptors.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod bridge;
pub mod decode;

pub use bridge::{BridgeResult, LineClass, PromptParser};
pub use decode::{is_error, is_question, parse_line, spinner_parts, strip_escapes, DecodedLine, SpinnerParts};
