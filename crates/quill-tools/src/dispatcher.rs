// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Executes tools by name without ever failing outward.

use std::sync::Arc;

use quill_bus::ChangeRecorder;
use quill_core::{PersonaStore, ToolSchema, WritePolicy};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::persona::register_persona_tools;
use crate::tool::{ToolContext, ToolOutput, ToolRegistry};

/// Runs tools against a subject persona.
///
/// Every failure (unknown tool, bad input, missing subject, storage error)
/// comes back as a [`ToolOutput`] with `is_error` set, so the model can
/// read it and self-correct.
pub struct ToolDispatcher {
    registry: ToolRegistry,
    store: Arc<dyn PersonaStore>,
    recorder: ChangeRecorder,
    policy: WritePolicy,
}

impl ToolDispatcher {
    pub fn new(
        registry: ToolRegistry,
        store: Arc<dyn PersonaStore>,
        recorder: ChangeRecorder,
        policy: WritePolicy,
    ) -> Self {
        Self {
            registry,
            store,
            recorder,
            policy,
        }
    }

    /// A dispatcher with every persona editing tool registered.
    pub fn with_persona_tools(
        store: Arc<dyn PersonaStore>,
        recorder: ChangeRecorder,
        policy: WritePolicy,
    ) -> Self {
        let mut registry = ToolRegistry::new();
        register_persona_tools(&mut registry);
        Self::new(registry, store, recorder, policy)
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.registry.schemas()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Executes `tool_name` against the persona `subject_id`.
    ///
    /// `session_id` is stamped on the persona as its last editing agent session.
    pub async fn execute(
        &self,
        tool_name: &str,
        input: &Map<String, Value>,
        subject_id: &str,
        session_id: Option<&str>,
    ) -> ToolOutput {
        let Some(tool) = self.registry.get(tool_name) else {
            warn!(tool = %tool_name, "model requested unknown tool");
            return ToolOutput::error(format!(
                "Unknown tool `{tool_name}`. Available tools: {}",
                self.registry.names().join(", ")
            ));
        };

        let ctx = ToolContext {
            store: Arc::clone(&self.store),
            recorder: self.recorder.clone(),
            policy: self.policy,
            subject_id: subject_id.to_string(),
            session_id: session_id.map(str::to_string),
        };

        match tool.invoke(input, &ctx).await {
            Ok(output) => {
                info!(persona_id = %subject_id, tool = %tool_name, "tool executed");
                ToolOutput::success(output)
            }
            Err(e) => {
                warn!(persona_id = %subject_id, tool = %tool_name, error = %e, "tool failed");
                ToolOutput::error(format!("Error: {e}"))
            }
        }
    }
}
