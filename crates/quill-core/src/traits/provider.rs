// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generative model provider adapter trait.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::QuillError;
use crate::stream::{ModelRequest, ModelStreamEvent};
use crate::traits::adapter::PluginAdapter;

/// A lazy, finite, non-restartable sequence of model stream events.
pub type ModelEventStream = Pin<Box<dyn Stream<Item = Result<ModelStreamEvent, QuillError>> + Send>>;

/// Adapter for a streaming generative model.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Starts one streaming invocation.
    ///
    /// Errors returned here happen before the first event; errors inside the
    /// stream surface as `Err` items.
    async fn stream(&self, request: ModelRequest) -> Result<ModelEventStream, QuillError>;
}
