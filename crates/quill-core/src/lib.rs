// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Quill.
//!
//! Foundational trait definitions, error types, and domain types shared by
//! every crate in the workspace.

pub mod error;
pub mod event;
pub mod stream;
pub mod traits;
pub mod turn;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::QuillError;
pub use event::{ChangeAction, ChangeSource, ChangelogEntry, StateEvent};
pub use stream::{
    BlockDelta, BlockStart, ContentBlock, ModelRequest, ModelStreamEvent, ProviderMessage,
    StopReason, ToolSchema,
};
pub use traits::{
    Changelog, ModelEventStream, PersonaStore, PluginAdapter, ProviderAdapter, SessionStore,
};
pub use turn::{Role, Session, Turn};
pub use types::{AdapterType, HealthStatus, Persona, TestCase, TestResult, WritePolicy};
