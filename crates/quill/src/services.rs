// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-scoped service wiring shared by the subcommands.
//!
//! One storage handle, one broadcaster, one recorder, and one agent loop per
//! process. Every component receives them explicitly.

use std::sync::Arc;
use std::time::Instant;

use quill_agent::{AgentLoop, AgentSettings};
use quill_bus::{ChangeBroadcaster, ChangeRecorder};
use quill_config::QuillConfig;
use quill_core::{ProviderAdapter, QuillError};
use quill_gateway::GatewayState;
use quill_storage::SqliteStorage;
use quill_tools::ToolDispatcher;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct Services {
    pub storage: Arc<SqliteStorage>,
    pub recorder: ChangeRecorder,
    pub agent: Arc<AgentLoop>,
}

impl Services {
    /// Opens the configured database and wires everything around it.
    pub async fn open(
        config: &QuillConfig,
        provider: Arc<dyn ProviderAdapter>,
    ) -> Result<Self, QuillError> {
        let storage = Arc::new(SqliteStorage::open(&config.storage).await?);
        Ok(Self::with_storage(config, storage, provider))
    }

    pub fn with_storage(
        config: &QuillConfig,
        storage: Arc<SqliteStorage>,
        provider: Arc<dyn ProviderAdapter>,
    ) -> Self {
        let recorder = ChangeRecorder::new(
            storage.clone(),
            ChangeBroadcaster::new(),
            config.changelog.retain,
        );
        let dispatcher = ToolDispatcher::with_persona_tools(
            storage.clone(),
            recorder.clone(),
            config.concurrency.write_policy,
        );
        info!(tools = dispatcher.registry().len(), "tool dispatcher ready");

        let agent = AgentLoop::new(
            provider,
            storage.clone(),
            storage.clone(),
            storage.clone(),
            Arc::new(dispatcher),
            AgentSettings::from_config(config),
        );
        Self {
            storage,
            recorder,
            agent: Arc::new(agent),
        }
    }

    pub fn gateway_state(&self, config: &QuillConfig, shutdown: CancellationToken) -> GatewayState {
        GatewayState {
            agent: self.agent.clone(),
            personas: self.storage.clone(),
            changelog: self.storage.clone(),
            recorder: self.recorder.clone(),
            write_policy: config.concurrency.write_policy,
            shutdown,
            start_time: Instant::now(),
        }
    }
}
