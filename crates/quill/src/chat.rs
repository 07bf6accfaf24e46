// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `quill chat` command: one agent run, records printed as NDJSON on stdout.

use std::io::Write;
use std::sync::Arc;

use quill_agent::{ChatEvent, LoopState, shutdown};
use quill_anthropic::AnthropicProvider;
use quill_config::QuillConfig;
use quill_core::QuillError;
use tokio::sync::mpsc;
use tracing::debug;

use crate::services::Services;

/// Runs one message through the agent. Returns the final loop state.
pub async fn run_chat(
    config: QuillConfig,
    persona_id: String,
    message: String,
) -> Result<LoopState, QuillError> {
    let provider = Arc::new(AnthropicProvider::new(&config.anthropic)?);
    let services = Services::open(&config, provider).await?;
    let cancel = shutdown::install_signal_handler();

    let (rx, handle) = services.agent.spawn(persona_id, message, cancel);
    let mut stdout = std::io::stdout();
    print_events(rx, &mut stdout).await?;

    handle
        .await
        .map_err(|e| QuillError::Internal(format!("agent task failed: {e}")))
}

/// Writes every record as one JSON line until the run closes the channel.
pub async fn print_events<W: Write>(
    mut rx: mpsc::UnboundedReceiver<ChatEvent>,
    out: &mut W,
) -> Result<(), QuillError> {
    while let Some(event) = rx.recv().await {
        debug!(kind = event.kind(), "chat record");
        let line = serde_json::to_string(&event)?;
        writeln!(out, "{line}")
            .and_then(|()| out.flush())
            .map_err(|e| QuillError::Internal(format!("failed to write to stdout: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_test_utils::{TestHarness, text_response};
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn prints_one_json_line_per_record() {
        let harness = TestHarness::builder()
            .with_scripts(vec![text_response("Hi there.")])
            .build()
            .await
            .unwrap();
        let persona = harness.seed_persona("Ada", "Be precise.").await.unwrap();
        let services = Services::with_storage(
            &harness.config,
            harness.storage.clone(),
            harness.provider.clone(),
        );

        let (rx, handle) =
            services
                .agent
                .spawn(persona.id.clone(), "hello".into(), CancellationToken::new());
        let mut out = Vec::new();
        print_events(rx, &mut out).await.unwrap();
        assert_eq!(handle.await.unwrap(), LoopState::Done);

        let text = String::from_utf8(out).unwrap();
        let records: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.last().unwrap()["type"], "done");
        assert!(records.iter().any(|r| r["type"] == "text_complete"));
    }

    #[tokio::test]
    async fn unknown_persona_prints_a_single_error() {
        let harness = TestHarness::builder().build().await.unwrap();
        let services = Services::with_storage(
            &harness.config,
            harness.storage.clone(),
            harness.provider.clone(),
        );
        let (rx, handle) =
            services
                .agent
                .spawn("missing".into(), "hello".into(), CancellationToken::new());
        let mut out = Vec::new();
        print_events(rx, &mut out).await.unwrap();

        assert_eq!(handle.await.unwrap(), LoopState::Failed);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("\"type\":\"error\""));
    }
}
