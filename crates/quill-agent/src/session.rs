// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-persona session lifecycle.
//!
//! Exactly one session is current per persona. It is created lazily on the
//! first message and replaced only by an explicit clear.

use std::sync::Arc;

use quill_core::{QuillError, Session, SessionStore, Turn};
use tracing::{debug, info};

use crate::turn_log::TurnLog;

/// Thin policy layer over a [`SessionStore`].
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub async fn current(&self, persona_id: &str) -> Result<Option<Session>, QuillError> {
        self.store.current_session(persona_id).await
    }

    /// Returns the current session, creating it on first use.
    pub async fn get_or_create(&self, persona_id: &str) -> Result<Session, QuillError> {
        if let Some(session) = self.store.current_session(persona_id).await? {
            return Ok(session);
        }
        let session = Session::new(persona_id);
        self.store.create_session(&session).await?;
        info!(persona_id, session_id = %session.id, "session created");
        Ok(session)
    }

    /// Deletes the current log and starts an empty one.
    ///
    /// `seen_up_to` becomes the new session's changelog marker, so edits made
    /// before the clear are not reported to the agent as new.
    pub async fn clear(
        &self,
        persona_id: &str,
        seen_up_to: Option<String>,
    ) -> Result<Session, QuillError> {
        let mut session = Session::new(persona_id);
        session.last_changelog_id = seen_up_to;
        self.store.create_session(&session).await?;
        info!(persona_id, session_id = %session.id, "session cleared");
        Ok(session)
    }

    /// Turns of the current session; empty when none exists yet.
    pub async fn history(&self, persona_id: &str) -> Result<Vec<Turn>, QuillError> {
        match self.store.current_session(persona_id).await? {
            Some(session) => self.store.turns(&session.id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Loads a session's log with its invariants re-checked.
    pub async fn load_log(&self, session_id: &str) -> Result<TurnLog, QuillError> {
        TurnLog::from_turns(self.store.turns(session_id).await?)
    }

    /// Validates `turn` against `log`, persists it, then appends it in memory.
    pub async fn append(
        &self,
        session_id: &str,
        log: &mut TurnLog,
        turn: Turn,
    ) -> Result<(), QuillError> {
        log.check(&turn)?;
        self.store.append_turn(session_id, &turn).await?;
        debug!(session_id, kind = turn.kind(), turn_id = turn.id(), "turn appended");
        log.push(turn)
    }

    /// Answers every open tool call in `log` with an error result.
    ///
    /// The model rejects a request that carries a `tool_use` without its
    /// `tool_result`, so a log left open by a failed or interrupted run must
    /// be closed before it is projected again. Returns how many were closed.
    pub async fn close_unanswered(
        &self,
        session_id: &str,
        log: &mut TurnLog,
        reason: &str,
    ) -> Result<usize, QuillError> {
        let open: Vec<String> = log.unanswered().into_iter().map(str::to_string).collect();
        for invocation_id in &open {
            self.append(session_id, log, Turn::tool_result(invocation_id.as_str(), reason, true))
                .await?;
        }
        Ok(open.len())
    }

    pub async fn mark_changelog_seen(
        &self,
        session_id: &str,
        entry_id: &str,
    ) -> Result<(), QuillError> {
        self.store
            .mark_changelog_seen(session_id, Some(entry_id))
            .await
    }
}
