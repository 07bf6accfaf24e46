// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation turns and sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Speaker role of a projected model message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One atomic conversation event. Immutable once appended to a log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    User {
        id: String,
        content: String,
        created_at: DateTime<Utc>,
    },
    AssistantText {
        id: String,
        content: String,
        created_at: DateTime<Utc>,
    },
    ToolCall {
        id: String,
        tool_invocation_id: String,
        tool_name: String,
        input: Map<String, Value>,
        created_at: DateTime<Utc>,
    },
    ToolResult {
        id: String,
        tool_invocation_id: String,
        output: String,
        is_error: bool,
        created_at: DateTime<Utc>,
    },
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            id: new_id(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::AssistantText {
            id: new_id(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn tool_call(
        tool_invocation_id: impl Into<String>,
        tool_name: impl Into<String>,
        input: Map<String, Value>,
    ) -> Self {
        Self::ToolCall {
            id: new_id(),
            tool_invocation_id: tool_invocation_id.into(),
            tool_name: tool_name.into(),
            input,
            created_at: Utc::now(),
        }
    }

    pub fn tool_result(
        tool_invocation_id: impl Into<String>,
        output: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::ToolResult {
            id: new_id(),
            tool_invocation_id: tool_invocation_id.into(),
            output: output.into(),
            is_error,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::User { id, .. }
            | Self::AssistantText { id, .. }
            | Self::ToolCall { id, .. }
            | Self::ToolResult { id, .. } => id,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::User { created_at, .. }
            | Self::AssistantText { created_at, .. }
            | Self::ToolCall { created_at, .. }
            | Self::ToolResult { created_at, .. } => *created_at,
        }
    }

    /// Short discriminator used for storage columns and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::AssistantText { .. } => "assistant_text",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
        }
    }

    /// The role this turn is sent under once projected.
    ///
    /// Tool results travel in user-role messages.
    pub fn role(&self) -> Role {
        match self {
            Self::User { .. } | Self::ToolResult { .. } => Role::User,
            Self::AssistantText { .. } | Self::ToolCall { .. } => Role::Assistant,
        }
    }
}

/// The current conversation between a persona and its user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub persona_id: String,
    /// Last changelog entry the agent has been told about.
    #[serde(default)]
    pub last_changelog_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(persona_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            persona_id: persona_id.into(),
            last_changelog_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}
