// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock model provider for deterministic testing.
//!
//! `MockProvider` replays scripted stream-event sequences, one script per
//! model invocation, and records every request it receives.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use tokio::sync::Mutex;

use quill_core::{
    AdapterType, BlockDelta, BlockStart, HealthStatus, ModelEventStream, ModelRequest,
    ModelStreamEvent, PluginAdapter, ProviderAdapter, QuillError, StopReason,
};

/// Events replayed for one model invocation.
pub type Script = Vec<Result<ModelStreamEvent, QuillError>>;

/// A mock provider that pops one [`Script`] per `stream` call.
///
/// When the queue is empty, a plain "mock response" text turn is replayed.
#[derive(Clone, Default)]
pub struct MockProvider {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
    refuse: Arc<Mutex<Option<String>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scripts(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(VecDeque::from(scripts))),
            ..Self::default()
        }
    }

    pub async fn push_script(&self, script: Script) {
        self.scripts.lock().await.push_back(script);
    }

    /// Makes every following `stream` call fail before producing events.
    pub async fn refuse_with(&self, message: impl Into<String>) {
        *self.refuse.lock().await = Some(message.into());
    }

    /// Requests received so far, in call order.
    pub async fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, QuillError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), QuillError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn stream(&self, request: ModelRequest) -> Result<ModelEventStream, QuillError> {
        self.requests.lock().await.push(request);
        if let Some(message) = self.refuse.lock().await.clone() {
            return Err(QuillError::provider(message));
        }
        let script = self
            .scripts
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| text_response("mock response"));
        Ok(Box::pin(stream::iter(script)))
    }
}

/// A complete text reply, streamed a word at a time.
pub fn text_response(text: &str) -> Script {
    let mut events = vec![
        Ok(ModelStreamEvent::MessageStart),
        Ok(ModelStreamEvent::ContentBlockStart {
            index: 0,
            block: BlockStart::Text,
        }),
    ];
    events.extend(text.split_inclusive(' ').map(|chunk| {
        Ok(ModelStreamEvent::ContentBlockDelta {
            index: 0,
            delta: BlockDelta::Text(chunk.to_string()),
        })
    }));
    events.extend([
        Ok(ModelStreamEvent::ContentBlockStop { index: 0 }),
        Ok(ModelStreamEvent::MessageDelta {
            stop_reason: Some(StopReason::EndTurn),
        }),
        Ok(ModelStreamEvent::MessageStop),
    ]);
    events
}

/// A reply that optionally says something, then calls each tool in order.
///
/// Each call is `(invocation_id, tool_name, raw_json_input)`. The raw input
/// is split into two deltas to exercise partial-JSON buffering.
pub fn tool_use_response(preamble: Option<&str>, calls: &[(&str, &str, &str)]) -> Script {
    let mut events = vec![Ok(ModelStreamEvent::MessageStart)];
    let mut index = 0;
    if let Some(text) = preamble {
        events.extend([
            Ok(ModelStreamEvent::ContentBlockStart {
                index,
                block: BlockStart::Text,
            }),
            Ok(ModelStreamEvent::ContentBlockDelta {
                index,
                delta: BlockDelta::Text(text.to_string()),
            }),
            Ok(ModelStreamEvent::ContentBlockStop { index }),
        ]);
        index += 1;
    }
    for (id, name, input) in calls {
        let split = (0..=input.len() / 2)
            .rev()
            .find(|i| input.is_char_boundary(*i))
            .unwrap_or(0);
        let (head, tail) = input.split_at(split);
        events.push(Ok(ModelStreamEvent::ContentBlockStart {
            index,
            block: BlockStart::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
            },
        }));
        for part in [head, tail] {
            if !part.is_empty() {
                events.push(Ok(ModelStreamEvent::ContentBlockDelta {
                    index,
                    delta: BlockDelta::InputJson(part.to_string()),
                }));
            }
        }
        events.push(Ok(ModelStreamEvent::ContentBlockStop { index }));
        index += 1;
    }
    events.extend([
        Ok(ModelStreamEvent::MessageDelta {
            stop_reason: Some(StopReason::ToolUse),
        }),
        Ok(ModelStreamEvent::MessageStop),
    ]);
    events
}

/// Streams `partial` text and then fails mid-stream.
pub fn failing_response(partial: &str, message: &str) -> Script {
    vec![
        Ok(ModelStreamEvent::MessageStart),
        Ok(ModelStreamEvent::ContentBlockStart {
            index: 0,
            block: BlockStart::Text,
        }),
        Ok(ModelStreamEvent::ContentBlockDelta {
            index: 0,
            delta: BlockDelta::Text(partial.to_string()),
        }),
        Err(QuillError::provider(message)),
    ]
}
