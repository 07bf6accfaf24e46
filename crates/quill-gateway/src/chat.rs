// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat endpoints: run the agent and stream its records to the caller.
//!
//! `POST /v1/personas/{id}/chat` answers with `text/event-stream` when the
//! client sends `Accept: text/event-stream`, otherwise with newline-delimited
//! JSON over a chunked body. The run is spawned on its own task, so a client
//! that disconnects mid-stream does not stop it.

use std::convert::Infallible;

use axum::{
    Json,
    body::Body,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, header},
    response::{
        IntoResponse, Response,
        sse::{KeepAlive, Sse},
    },
};
use futures::stream::{self, Stream, StreamExt};
use quill_agent::ChatEvent;
use quill_core::{QuillError, Turn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::server::GatewayState;
use crate::sse::json_event;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Request body for POST /v1/personas/{id}/chat.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Response body for GET /v1/personas/{id}/chat.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: Option<String>,
    pub turns: Vec<Turn>,
}

#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub session_id: String,
}

fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/event-stream"))
}

fn chat_events(rx: mpsc::UnboundedReceiver<ChatEvent>) -> impl Stream<Item = ChatEvent> {
    stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((event, rx))
    })
}

/// Encodes one record as an NDJSON line.
pub fn ndjson_line(event: &ChatEvent) -> String {
    let mut line = serde_json::to_string(event).unwrap_or_else(|e| {
        warn!(error = %e, "failed to encode chat record");
        r#"{"type":"error","message":"failed to encode record"}"#.to_string()
    });
    line.push('\n');
    line
}

/// POST /v1/personas/{id}/chat
pub async fn post_chat(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = body?;
    if body.message.trim().is_empty() {
        return Err(ApiError::bad_request("`message` must not be empty"));
    }
    // Report an unknown persona as 404 rather than inside the stream.
    if state.personas.get_persona(&id).await?.is_none() {
        return Err(QuillError::not_found("persona", &id).into());
    }

    info!(persona_id = %id, "chat run requested");
    let (rx, _handle) = state
        .agent
        .spawn(id, body.message, state.shutdown.clone());
    let events = chat_events(rx);

    if wants_event_stream(&headers) {
        let frames = events.map(|event| Ok::<_, Infallible>(json_event(&event)));
        return Ok(Sse::new(frames)
            .keep_alive(KeepAlive::default())
            .into_response());
    }

    let lines = events.map(|event| Ok::<_, Infallible>(ndjson_line(&event)));
    let mut response = Body::from_stream(lines).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(NDJSON_CONTENT_TYPE),
    );
    Ok(response)
}

/// GET /v1/personas/{id}/chat
pub async fn get_history(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<HistoryResponse>> {
    let sessions = state.agent.sessions();
    let session_id = sessions.current(&id).await?.map(|s| s.id);
    let turns = sessions.history(&id).await?;
    Ok(Json(HistoryResponse { session_id, turns }))
}

/// DELETE /v1/personas/{id}/chat
pub async fn clear_history(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ClearedResponse>> {
    if state.personas.get_persona(&id).await?.is_none() {
        return Err(QuillError::not_found("persona", &id).into());
    }
    let session = state.agent.clear_session(&id).await?;
    Ok(Json(ClearedResponse {
        session_id: session.id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_header_selects_event_stream() {
        let mut headers = HeaderMap::new();
        assert!(!wants_event_stream(&headers));
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream, */*"),
        );
        assert!(wants_event_stream(&headers));
    }

    #[test]
    fn ndjson_lines_end_with_newline() {
        let line = ndjson_line(&ChatEvent::Error {
            message: "boom".into(),
        });
        assert_eq!(line, "{\"type\":\"error\",\"message\":\"boom\"}\n");
    }
}
