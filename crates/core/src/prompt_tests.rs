// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    write_file = { PromptKind::WriteFile, "write_file" },
    edit_file = { PromptKind::EditFile, "edit_file" },
    delete_file = { PromptKind::DeleteFile, "delete_file" },
    bash_command = { PromptKind::BashCommand, "bash_command" },
    mcp_tool = { PromptKind::McpTool, "mcp_tool" },
    trust_folder = { PromptKind::TrustFolder, "trust_folder" },
    question = { PromptKind::Question, "question" },
    unknown = { PromptKind::Unknown, "unknown" },
)]
fn prompt_kind_wire_names(kind: PromptKind, expected: &str) {
    assert_eq!(kind.as_str(), expected);
    assert_eq!(serde_json::to_value(kind).unwrap(), expected);
}

#[test]
fn selected_option_finds_cursor_line() {
    let mut desc = PromptDescriptor::new(PromptKind::WriteFile, "a.txt");
    desc.options = vec![
        PromptOption::new("1", "Yes").selected(),
        PromptOption::new("2", "Yes, allow all edits during this session"),
        PromptOption::new("3", "No"),
    ];
    assert_eq!(desc.selected_option().map(|o| o.key.as_str()), Some("1"));
}

#[test]
fn unselected_options_omit_flag_in_json() {
    let opt = PromptOption::new("n", "No, exit");
    let v = serde_json::to_value(&opt).unwrap();
    assert!(v.get("selected").is_none());
    assert!(v.get("description").is_none());
}
