// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn transcript_dir_encodes_workdir_path() {
    let config = SupervisorConfig {
        workdir: PathBuf::from("/home/dev/project"),
        transcript_root: Some(PathBuf::from("/tmp/claude-projects")),
        ..SupervisorConfig::default()
    };
    assert_eq!(
        config.transcript_dir(),
        PathBuf::from("/tmp/claude-projects/-home-dev-project")
    );
}

#[test]
fn default_base_args_request_stream_json() {
    let config = SupervisorConfig::default();
    assert!(config.base_args.contains(&"stream-json".to_string()));
    assert_eq!(config.pty_cols, 120);
    assert_eq!(config.pty_rows, 40);
    assert_eq!(config.spinner_debounce, Duration::from_millis(150));
}
