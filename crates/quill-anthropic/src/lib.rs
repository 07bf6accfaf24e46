// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude provider adapter for Quill.
//!
//! Implements [`ProviderAdapter`] on top of the streaming Messages API and
//! translates wire events into the provider-neutral [`ModelStreamEvent`]s
//! the agent loop consumes.

pub mod client;
pub mod sse;
pub mod types;

use async_trait::async_trait;
use futures::stream::StreamExt;
use quill_config::model::AnthropicConfig;
use quill_core::{
    AdapterType, BlockDelta, BlockStart, ContentBlock, HealthStatus, ModelEventStream,
    ModelRequest, ModelStreamEvent, PluginAdapter, ProviderAdapter, ProviderMessage, QuillError,
    StopReason,
};
use tracing::{debug, info};

use crate::client::AnthropicClient;
use crate::sse::StreamEvent;
use crate::types::{
    ApiContentBlock, ApiMessage, MessageRequest, ResponseContentBlock, SseDelta, ToolDefinition,
};

/// Anthropic Claude provider implementing [`ProviderAdapter`].
///
/// API key resolution order: config, then `ANTHROPIC_API_KEY`, then error.
pub struct AnthropicProvider {
    client: AnthropicClient,
    default_model: String,
}

impl AnthropicProvider {
    pub fn new(config: &AnthropicConfig) -> Result<Self, QuillError> {
        let api_key = resolve_api_key(config.api_key.as_deref())?;
        let client = AnthropicClient::new(
            &api_key,
            &config.api_version,
            &config.base_url,
            config.max_retries,
        )?;

        info!(
            model = config.default_model,
            base_url = config.base_url,
            "Anthropic provider initialized"
        );

        Ok(Self {
            client,
            default_model: config.default_model.clone(),
        })
    }

    fn to_message_request(&self, request: ModelRequest) -> MessageRequest {
        let system = if request.system.is_empty() {
            None
        } else {
            Some(request.system)
        };

        MessageRequest {
            model: request.model.unwrap_or_else(|| self.default_model.clone()),
            messages: request.messages.into_iter().map(convert_message).collect(),
            system,
            max_tokens: request.max_tokens,
            stream: true,
            tools: request
                .tools
                .into_iter()
                .map(|t| ToolDefinition {
                    name: t.name,
                    description: t.description,
                    input_schema: t.input_schema,
                })
                .collect(),
        }
    }
}

fn convert_message(message: ProviderMessage) -> ApiMessage {
    ApiMessage {
        role: message.role.to_string(),
        content: message
            .content
            .into_iter()
            .map(|block| match block {
                ContentBlock::Text { text } => ApiContentBlock::Text { text },
                ContentBlock::ToolUse { id, name, input } => {
                    ApiContentBlock::ToolUse { id, name, input }
                }
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => ApiContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error: is_error.then_some(true),
                },
            })
            .collect(),
    }
}

/// Translates one wire event. `None` means the event has no neutral counterpart.
fn convert_event(event: StreamEvent) -> Option<Result<ModelStreamEvent, QuillError>> {
    let converted = match event {
        StreamEvent::MessageStart => ModelStreamEvent::MessageStart,
        StreamEvent::ContentBlockStart(start) => {
            let block = match start.content_block {
                ResponseContentBlock::Text { .. } => BlockStart::Text,
                ResponseContentBlock::ToolUse { id, name, .. } => BlockStart::ToolUse { id, name },
                ResponseContentBlock::Unsupported => {
                    debug!(index = start.index, "skipping unsupported content block");
                    return None;
                }
            };
            ModelStreamEvent::ContentBlockStart {
                index: start.index,
                block,
            }
        }
        StreamEvent::ContentBlockDelta(delta) => {
            let payload = match delta.delta {
                SseDelta::TextDelta { text } => BlockDelta::Text(text),
                SseDelta::InputJsonDelta { partial_json } => BlockDelta::InputJson(partial_json),
                SseDelta::Unsupported => return None,
            };
            ModelStreamEvent::ContentBlockDelta {
                index: delta.index,
                delta: payload,
            }
        }
        StreamEvent::ContentBlockStop(stop) => ModelStreamEvent::ContentBlockStop { index: stop.index },
        StreamEvent::MessageDelta(delta) => ModelStreamEvent::MessageDelta {
            stop_reason: delta.delta.stop_reason.as_deref().map(StopReason::parse),
        },
        StreamEvent::MessageStop => ModelStreamEvent::MessageStop,
        StreamEvent::Ping => ModelStreamEvent::Ping,
        StreamEvent::Error(err) => {
            return Some(Err(QuillError::provider(format!(
                "stream error ({}): {}",
                err.error.type_, err.error.message
            ))));
        }
    };
    Some(Ok(converted))
}

#[async_trait]
impl PluginAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
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
impl ProviderAdapter for AnthropicProvider {
    async fn stream(&self, request: ModelRequest) -> Result<ModelEventStream, QuillError> {
        let request = self.to_message_request(request);
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "starting model stream"
        );
        let events = self.client.stream_message(&request).await?;
        Ok(Box::pin(events.filter_map(|item| async move {
            match item {
                Ok(event) => convert_event(event),
                Err(e) => Some(Err(e)),
            }
        })))
    }
}

fn resolve_api_key(config_key: Option<&str>) -> Result<String, QuillError> {
    match config_key {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            QuillError::Config(
                "Anthropic API key not found. Set anthropic.api_key in config or ANTHROPIC_API_KEY environment variable.".into(),
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{Role, ToolSchema};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> AnthropicConfig {
        AnthropicConfig {
            api_key: Some("sk-test".into()),
            base_url: base_url.to_string(),
            max_retries: 0,
            ..AnthropicConfig::default()
        }
    }

    fn request() -> ModelRequest {
        ModelRequest {
            model: None,
            system: "You edit personas.".into(),
            messages: vec![
                ProviderMessage {
                    role: Role::User,
                    content: vec![ContentBlock::Text {
                        text: "rename her".into(),
                    }],
                },
                ProviderMessage {
                    role: Role::Assistant,
                    content: vec![ContentBlock::ToolUse {
                        id: "t1".into(),
                        name: "update_name".into(),
                        input: json!({"name": "Ada"}),
                    }],
                },
                ProviderMessage {
                    role: Role::User,
                    content: vec![ContentBlock::ToolResult {
                        tool_use_id: "t1".into(),
                        content: "Renamed".into(),
                        is_error: false,
                    }],
                },
            ],
            tools: vec![ToolSchema {
                name: "update_name".into(),
                description: "Rename the persona".into(),
                input_schema: json!({"type": "object"}),
            }],
            max_tokens: 256,
        }
    }

    #[test]
    fn config_key_wins_over_env() {
        assert_eq!(resolve_api_key(Some("sk-config")).unwrap(), "sk-config");
    }

    #[test]
    fn message_request_uses_default_model_and_converts_blocks() {
        let provider = AnthropicProvider::new(&config("http://localhost:1")).unwrap();
        let wire = provider.to_message_request(request());
        assert_eq!(wire.model, AnthropicConfig::default().default_model);
        assert_eq!(wire.system.as_deref(), Some("You edit personas."));
        assert_eq!(wire.messages[1].role, "assistant");
        assert_eq!(
            wire.messages[2].content[0],
            ApiContentBlock::ToolResult {
                tool_use_id: "t1".into(),
                content: "Renamed".into(),
                is_error: None,
            }
        );
        assert_eq!(wire.tools[0].name, "update_name");
    }

    #[test]
    fn model_override_is_respected() {
        let provider = AnthropicProvider::new(&config("http://localhost:1")).unwrap();
        let mut req = request();
        req.model = Some("claude-opus-4-20250514".into());
        req.system.clear();
        let wire = provider.to_message_request(req);
        assert_eq!(wire.model, "claude-opus-4-20250514");
        assert!(wire.system.is_none());
    }

    #[tokio::test]
    async fn stream_translates_wire_events() {
        let sse = concat!(
            "event: message_start\ndata: {}\n\n",
            "event: content_block_start\ndata: {\"index\":0,\"content_block\":{\"type\":\"thinking\",\"thinking\":\"\"}}\n\n",
            "event: content_block_start\ndata: {\"index\":1,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
            "event: content_block_delta\ndata: {\"index\":1,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n\n",
            "event: content_block_stop\ndata: {\"index\":1}\n\n",
            "event: message_delta\ndata: {\"delta\":{\"stop_reason\":\"end_turn\"}}\n\n",
            "event: message_stop\ndata: {}\n\n",
        );
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new(&config(&server.uri())).unwrap();
        let events: Vec<_> = provider
            .stream(request())
            .await
            .unwrap()
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                ModelStreamEvent::MessageStart,
                ModelStreamEvent::ContentBlockStart {
                    index: 1,
                    block: BlockStart::Text
                },
                ModelStreamEvent::ContentBlockDelta {
                    index: 1,
                    delta: BlockDelta::Text("Hello".into())
                },
                ModelStreamEvent::ContentBlockStop { index: 1 },
                ModelStreamEvent::MessageDelta {
                    stop_reason: Some(StopReason::EndTurn)
                },
                ModelStreamEvent::MessageStop,
            ]
        );
    }

    #[tokio::test]
    async fn in_stream_error_becomes_provider_error() {
        let sse = concat!(
            "event: message_start\ndata: {}\n\n",
            "event: error\ndata: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n",
        );
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new(&config(&server.uri())).unwrap();
        let events: Vec<_> = provider.stream(request()).await.unwrap().collect().await;
        assert!(events[0].is_ok());
        let err = events[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("overloaded_error"));
    }
}
