// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool trait and registry.
//!
//! A [`Tool`] is a small read-mutate-persist transformation over the persona
//! named by the [`ToolContext`]. Tools hold no state between calls.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use quill_bus::ChangeRecorder;
use quill_core::{Persona, PersonaStore, QuillError, ToolSchema, WritePolicy};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result of one tool execution as fed back to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub output: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    pub fn error(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: true,
        }
    }
}

/// Everything a tool may touch during one invocation.
pub struct ToolContext {
    pub(crate) store: Arc<dyn PersonaStore>,
    pub(crate) recorder: ChangeRecorder,
    pub(crate) policy: WritePolicy,
    pub(crate) subject_id: String,
    pub(crate) session_id: Option<String>,
}

impl ToolContext {
    pub fn store(&self) -> &Arc<dyn PersonaStore> {
        &self.store
    }

    pub fn recorder(&self) -> &ChangeRecorder {
        &self.recorder
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Loads the current persisted state of the subject persona.
    pub async fn persona(&self) -> Result<Persona, QuillError> {
        self.store
            .get_persona(&self.subject_id)
            .await?
            .ok_or_else(|| QuillError::not_found("persona", &self.subject_id))
    }

    /// Persists an edited persona, stamping the editing agent session.
    pub async fn save(&self, mut persona: Persona) -> Result<Persona, QuillError> {
        if self.session_id.is_some() {
            persona.agent_session_id = self.session_id.clone();
        }
        self.store.update_persona(&persona, self.policy).await
    }
}

/// A named operation the model can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the tool's input object.
    fn input_schema(&self) -> Value;

    /// Runs the tool. Errors are converted to error results by the dispatcher.
    async fn invoke(&self, input: &Map<String, Value>, ctx: &ToolContext)
    -> Result<String, QuillError>;
}

/// Registry of available tools, indexed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registers a tool under its `name()`, replacing any previous one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Schemas for every registered tool, sorted by name so requests are stable.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads a required non-empty string field.
pub fn required_str<'a>(input: &'a Map<String, Value>, key: &str) -> Result<&'a str, QuillError> {
    match input.get(key).and_then(Value::as_str) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        Some(_) => Err(QuillError::InvalidInput(format!("`{key}` must not be empty"))),
        None => Err(QuillError::InvalidInput(format!(
            "missing required string field `{key}`"
        ))),
    }
}

/// Reads an optional string field; a present non-string value is an error.
pub fn optional_str<'a>(
    input: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a str>, QuillError> {
    match input.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(QuillError::InvalidInput(format!("`{key}` must be a string"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the input back"
        }

        fn input_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "message": { "type": "string" } },
                "required": ["message"]
            })
        }

        async fn invoke(
            &self,
            input: &Map<String, Value>,
            _ctx: &ToolContext,
        ) -> Result<String, QuillError> {
            Ok(required_str(input, "message")?.to_string())
        }
    }

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "noop"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn invoke(
            &self,
            _input: &Map<String, Value>,
            _ctx: &ToolContext,
        ) -> Result<String, QuillError> {
            Ok(String::new())
        }
    }

    #[test]
    fn schemas_are_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(NamedTool("zeta")));
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(NamedTool("alpha")));

        let names: Vec<String> = registry.schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "echo", "zeta"]);
        assert_eq!(registry.names(), vec!["alpha", "echo", "zeta"]);
    }

    #[test]
    fn register_replaces_same_name() {
        let mut registry = ToolRegistry::default();
        assert!(registry.is_empty());
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(EchoTool));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn string_field_helpers() {
        let input = json!({"name": "Ada", "blank": "  ", "count": 3})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(required_str(&input, "name").unwrap(), "Ada");
        assert!(required_str(&input, "blank").is_err());
        assert!(required_str(&input, "missing").is_err());
        assert_eq!(optional_str(&input, "missing").unwrap(), None);
        assert!(optional_str(&input, "count").is_err());
    }
}
