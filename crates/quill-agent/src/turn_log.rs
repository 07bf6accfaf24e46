// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only, invariant-checked turn log.

use std::collections::HashSet;

use quill_core::{QuillError, Turn};

/// An ordered conversation log.
///
/// Every tool result must answer exactly one earlier tool call, and no two
/// tool calls share an invocation id. Violations are rejected on push.
#[derive(Debug, Clone, Default)]
pub struct TurnLog {
    turns: Vec<Turn>,
    calls: HashSet<String>,
    answered: HashSet<String>,
}

impl TurnLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a log from persisted turns, re-checking every invariant.
    pub fn from_turns(turns: impl IntoIterator<Item = Turn>) -> Result<Self, QuillError> {
        let mut log = Self::new();
        for turn in turns {
            log.push(turn)?;
        }
        Ok(log)
    }

    /// Appends a turn if it keeps the log well formed.
    pub fn push(&mut self, turn: Turn) -> Result<(), QuillError> {
        self.check(&turn)?;
        match &turn {
            Turn::ToolCall {
                tool_invocation_id, ..
            } => {
                self.calls.insert(tool_invocation_id.clone());
            }
            Turn::ToolResult {
                tool_invocation_id, ..
            } => {
                self.answered.insert(tool_invocation_id.clone());
            }
            Turn::User { .. } | Turn::AssistantText { .. } => {}
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Validates `turn` against the current log without appending it.
    pub fn check(&self, turn: &Turn) -> Result<(), QuillError> {
        match turn {
            Turn::ToolCall {
                tool_invocation_id, ..
            } if self.calls.contains(tool_invocation_id) => Err(QuillError::InvalidInput(
                format!("duplicate tool invocation id {tool_invocation_id}"),
            )),
            Turn::ToolResult {
                tool_invocation_id, ..
            } => {
                if !self.calls.contains(tool_invocation_id) {
                    Err(QuillError::InvalidInput(format!(
                        "tool result for unknown invocation {tool_invocation_id}"
                    )))
                } else if self.answered.contains(tool_invocation_id) {
                    Err(QuillError::InvalidInput(format!(
                        "invocation {tool_invocation_id} already has a result"
                    )))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Invocation ids called but not yet answered, in call order.
    pub fn unanswered(&self) -> Vec<&str> {
        self.turns
            .iter()
            .filter_map(|turn| match turn {
                Turn::ToolCall {
                    tool_invocation_id, ..
                } if !self.answered.contains(tool_invocation_id) => {
                    Some(tool_invocation_id.as_str())
                }
                _ => None,
            })
            .collect()
    }
}
