// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events framing for the sync channel and chat streams.
//!
//! Every record is one JSON object sent as `data: <json>\n\n`. The object's
//! `type` field names the record; no `event:` line is used.
//!
//! The sync channel (`GET /v1/events`) opens with a `connected` record and
//! then carries every [`StateEvent`] emitted while the client is attached.
//! Nothing is replayed: clients that were away resync from `/v1/changelog`.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use quill_core::StateEvent;
use serde::Serialize;
use tracing::{debug, warn};

use crate::server::GatewayState;

/// Encodes one record as an SSE data frame.
pub fn json_event<T: Serialize>(record: &T) -> Event {
    match serde_json::to_string(record) {
        Ok(json) => Event::default().data(json),
        Err(e) => {
            warn!(error = %e, "failed to encode SSE record");
            Event::default().data(r#"{"type":"error","message":"failed to encode record"}"#)
        }
    }
}

/// GET /v1/events
///
/// The subscription lives inside the response stream, so the client going
/// away unsubscribes it. Server shutdown ends the stream.
pub async fn get_events(
    State(state): State<GatewayState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (subscription, rx) = state.recorder.broadcaster().subscribe_channel();
    debug!(subscriber_id = %subscription.id(), "sync channel opened");

    let events = stream::unfold((rx, subscription), |(mut rx, subscription)| async move {
        let event: StateEvent = rx.recv().await?;
        Some((Ok(json_event(&event)), (rx, subscription)))
    })
    .take_until(state.shutdown.cancelled_owned());

    Sse::new(events).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_event_carries_the_type_tag() {
        let event = StateEvent::TestCaseDeleted {
            test_case_id: "tc-1".into(),
        };
        // Event has no accessor for its payload; the Debug form includes it.
        let rendered = format!("{:?}", json_event(&event));
        assert!(rendered.contains("test_case_deleted"));
    }
}
