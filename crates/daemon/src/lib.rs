// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tether daemon library
//!
//! Composition root for the supervisor core: builds the event hub, the
//! session index, and the agent supervisor, and owns their lifetimes.
//! The WebSocket/HTTP transport, pairing, git wrapper, and file watcher
//! are external collaborators that attach through the hub's subscriber
//! boundary.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod env;

pub use env::{DaemonConfig, HEARTBEAT_INTERVAL};

use tether_core::{EventPayload, RouteContext, WorkspaceId};
use tether_hub::{EventHub, HubConfig};
use tether_sessions::{IndexConfig, IndexError, SessionIndex};
use tether_supervisor::{Supervisor, SupervisorConfig};
use tokio_util::sync::CancellationToken;

/// The assembled supervisor core.
pub struct Daemon {
    hub: EventHub,
    supervisor: Supervisor,
    index: SessionIndex,
    cancel: CancellationToken,
}

impl Daemon {
    /// Build all components. Failure to open the index database is the
    /// one fatal startup error.
    pub fn new(config: DaemonConfig) -> Result<Self, IndexError> {
        let hub = EventHub::new(HubConfig::default());

        let workspace_id = Some(WorkspaceId::new(config.workdir.to_string_lossy().to_string()));
        let supervisor_config = SupervisorConfig {
            agent_cmd: config.agent_cmd.clone(),
            workdir: config.workdir.clone(),
            workspace_id,
            log_dir: Some(config.log_dir()),
            transcript_root: config.transcript_root.clone(),
            ..SupervisorConfig::default()
        };
        let supervisor = Supervisor::new(supervisor_config.clone(), hub.clone());

        let index_config =
            IndexConfig::new(supervisor_config.transcript_dir(), config.index_db_path());
        let index = SessionIndex::open(index_config, hub.clone())?;

        Ok(Self { hub, supervisor, index, cancel: CancellationToken::new() })
    }

    /// Start background work: the index maintenance loop, an initial
    /// scan, and the heartbeat ticker.
    pub fn start(&self) {
        self.index.start();
        {
            let index = self.index.clone();
            tokio::task::spawn_blocking(move || {
                if let Err(e) = index.full_sync() {
                    tracing::warn!(error = %e, "initial transcript scan failed");
                }
            });
        }

        let hub = self.hub.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(HEARTBEAT_INTERVAL);
            tick.tick().await; // skip the immediate first tick
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        hub.publish(EventPayload::Heartbeat {}, RouteContext::default());
                    }
                }
            }
        });
        tracing::info!("daemon started");
    }

    /// Block until SIGINT, then tear everything down.
    pub async fn run_until_shutdown(&self) {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("ctrl-c handler unavailable; running until killed");
            self.cancel.cancelled().await;
        }
        self.shutdown();
    }

    /// Tear down in dependency order: supervisor first, then the index,
    /// then the hub.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        if self.supervisor.state() == tether_core::RunState::Running {
            if let Err(e) = self.supervisor.stop() {
                tracing::warn!(error = %e, "supervisor stop on shutdown failed");
            }
        }
        self.index.shutdown();
        self.hub.stop();
        tracing::info!("daemon stopped");
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn index(&self) -> &SessionIndex {
        &self.index
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
