// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use tempfile::TempDir;
use tether_core::EventKind;
use tether_hub::Subscriber;

fn daemon(dir: &TempDir) -> Daemon {
    let config = DaemonConfig {
        state_dir: dir.path().join("state"),
        agent_cmd: "claude".to_string(),
        workdir: dir.path().join("work"),
        transcript_root: Some(dir.path().join("projects")),
    };
    std::fs::create_dir_all(&config.workdir).unwrap();
    Daemon::new(config).unwrap()
}

#[tokio::test]
async fn new_creates_the_state_directory_and_index() {
    let dir = TempDir::new().unwrap();
    let d = daemon(&dir);
    assert!(dir.path().join("state").join("index.db").exists());
    assert!(d.index().list_sessions().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn heartbeat_ticks_on_the_interval() {
    let dir = TempDir::new().unwrap();
    let d = daemon(&dir);
    let mut sub = d.hub().subscribe(Subscriber::new("transport"));
    d.start();

    tokio::time::sleep(HEARTBEAT_INTERVAL + Duration::from_secs(1)).await;

    let mut heartbeats = 0;
    while let Ok(ev) = sub.events.try_recv() {
        if ev.kind() == EventKind::Heartbeat {
            heartbeats += 1;
        }
    }
    assert!(heartbeats >= 1);
    d.shutdown();
}

#[tokio::test]
async fn shutdown_stops_the_hub() {
    let dir = TempDir::new().unwrap();
    let d = daemon(&dir);
    d.start();
    d.shutdown();
    assert!(!d.hub().is_running());
}
