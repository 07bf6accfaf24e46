// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE stream parser for Anthropic Messages API streaming responses.

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use quill_core::QuillError;
use serde::de::DeserializeOwned;

use crate::types::{
    SseContentBlockDelta, SseContentBlockStart, SseContentBlockStop, SseError, SseMessageDelta,
};

/// Typed SSE events from the Anthropic streaming protocol.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    MessageStart,
    ContentBlockStart(SseContentBlockStart),
    ContentBlockDelta(SseContentBlockDelta),
    ContentBlockStop(SseContentBlockStop),
    MessageDelta(SseMessageDelta),
    MessageStop,
    Ping,
    Error(SseError),
}

pub type StreamEventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, QuillError>> + Send>>;

fn decode<T: DeserializeOwned>(event: &str, data: &str) -> Result<T, QuillError> {
    serde_json::from_str(data).map_err(|e| QuillError::Provider {
        message: format!("failed to parse {event}: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Maps one SSE frame to a typed event. Unknown event names yield `None`.
pub fn parse_event(event: &str, data: &str) -> Option<Result<StreamEvent, QuillError>> {
    let parsed = match event {
        "message_start" => Ok(StreamEvent::MessageStart),
        "content_block_start" => decode(event, data).map(StreamEvent::ContentBlockStart),
        "content_block_delta" => decode(event, data).map(StreamEvent::ContentBlockDelta),
        "content_block_stop" => decode(event, data).map(StreamEvent::ContentBlockStop),
        "message_delta" => decode(event, data).map(StreamEvent::MessageDelta),
        "message_stop" => Ok(StreamEvent::MessageStop),
        "ping" => Ok(StreamEvent::Ping),
        "error" => decode(event, data).map(StreamEvent::Error),
        // Anthropic may add event types at any time; skip what we do not know.
        _ => return None,
    };
    Some(parsed)
}

/// Parses a streaming response body into typed [`StreamEvent`]s.
pub fn parse_sse_stream(response: reqwest::Response) -> StreamEventStream {
    let events = response
        .bytes_stream()
        .eventsource()
        .filter_map(|result| async move {
            match result {
                Ok(event) => parse_event(&event.event, &event.data),
                Err(e) => Some(Err(QuillError::Provider {
                    message: format!("SSE stream error: {e}"),
                    source: None,
                })),
            }
        });
    Box::pin(events)
}
