// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tools the agent uses to edit personas and their test cases.

pub mod dispatcher;
pub mod persona;
pub mod tool;

pub use dispatcher::ToolDispatcher;
pub use persona::register_persona_tools;
pub use tool::{Tool, ToolContext, ToolOutput, ToolRegistry};
