// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod changelog;
pub mod provider;
pub mod storage;

pub use adapter::PluginAdapter;
pub use changelog::Changelog;
pub use provider::{ModelEventStream, ProviderAdapter};
pub use storage::{PersonaStore, SessionStore};
