// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `quill serve` command implementation.
//!
//! Opens storage, connects the Anthropic provider, and serves the HTTP
//! gateway until SIGINT or SIGTERM. In-flight agent runs are interrupted on
//! shutdown; everything they persisted so far is kept.

use std::sync::Arc;

use quill_agent::shutdown;
use quill_anthropic::AnthropicProvider;
use quill_config::QuillConfig;
use quill_core::{PluginAdapter, QuillError};
use quill_gateway::{ServerConfig, start_server};
use tracing::{info, warn};

use crate::services::Services;

/// Runs the `quill serve` command.
pub async fn run_serve(config: QuillConfig) -> Result<(), QuillError> {
    info!(agent = %config.agent.name, "starting quill serve");

    if !config.gateway.enabled {
        return Err(QuillError::Config(
            "gateway.enabled is false; `quill serve` has nothing to serve".into(),
        ));
    }

    let provider = Arc::new(AnthropicProvider::new(&config.anthropic)?);
    info!(
        provider = provider.name(),
        model = %config.anthropic.default_model,
        "provider initialized"
    );

    let services = Services::open(&config, provider.clone()).await?;
    let cancel = shutdown::install_signal_handler();
    let state = services.gateway_state(&config, cancel.clone());

    let result = start_server(&ServerConfig::from(&config.gateway), state).await;

    // Make sure spawned runs see the shutdown even if the server failed on its own.
    cancel.cancel();
    if let Err(e) = provider.shutdown().await {
        warn!(error = %e, "provider shutdown failed");
    }
    result?;

    info!("quill serve shutdown complete");
    Ok(())
}
