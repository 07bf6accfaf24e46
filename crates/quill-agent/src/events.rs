// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Records streamed to the observer of one agent run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One chat-loop record. `done` and `error` are terminal; exactly one of
/// them ends every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Incremental assistant text.
    TextDelta { text: String },
    /// A finished assistant text block, now persisted as a turn.
    TextComplete { turn_id: String, text: String },
    ToolCall {
        turn_id: String,
        tool_invocation_id: String,
        tool_name: String,
        input: Map<String, Value>,
    },
    ToolResult {
        turn_id: String,
        tool_invocation_id: String,
        output: String,
        is_error: bool,
    },
    Done { session_id: String, rounds: u32 },
    Error { message: String },
}

impl ChatEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text_delta",
            Self::TextComplete { .. } => "text_complete",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}
