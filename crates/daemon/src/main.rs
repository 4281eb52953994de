// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tetherd` — the supervisor daemon binary.

use tether_daemon::{Daemon, DaemonConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = DaemonConfig::from_env();
    tracing::info!(
        state_dir = %config.state_dir.display(),
        workdir = %config.workdir.display(),
        agent = %config.agent_cmd,
        "starting tetherd"
    );

    let daemon = match Daemon::new(config) {
        Ok(daemon) => daemon,
        Err(e) => {
            tracing::error!(error = %e, "failed to open index database");
            std::process::exit(1);
        }
    };
    daemon.start();
    daemon.run_until_shutdown().await;
}
