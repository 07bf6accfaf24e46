// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The agent loop: repeated model invocations with tool execution between them.
//!
//! Each run moves through `awaiting_model -> streaming -> tool_pending` as
//! many times as the model keeps calling tools, and ends in `done` or
//! `failed`. Every turn is persisted the moment it is complete, so a failed
//! run keeps whatever it appended before the failure.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use quill_config::QuillConfig;
use quill_core::{
    BlockDelta, BlockStart, Changelog, ModelEventStream, ModelRequest, ModelStreamEvent,
    PersonaStore, ProviderAdapter, QuillError, Session, SessionStore, StopReason, Turn,
};
use quill_tools::ToolDispatcher;
use serde_json::{Map, Value};
use tokio::sync::{OwnedMutexGuard, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::{build_system_prompt, unseen_changes};
use crate::events::ChatEvent;
use crate::projector::project;
use crate::session::SessionManager;
use crate::turn_log::TurnLog;

/// States of one agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LoopState {
    /// A request has been sent and no content has arrived yet.
    AwaitingModel,
    /// Content blocks are being received.
    Streaming,
    /// The model asked for tools; they are being executed in call order.
    ToolPending,
    Done,
    Failed,
}

/// Tunables for the loop, usually taken from [`QuillConfig`].
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Upper bound on model invocations per run; 0 disables the bound.
    pub max_rounds: u32,
    pub max_tokens: u32,
    pub base_system_prompt: String,
    /// Maximum unseen user edits described in the system prompt.
    pub context_limit: usize,
}

impl AgentSettings {
    pub fn from_config(config: &QuillConfig) -> Self {
        Self {
            max_rounds: config.agent.max_rounds,
            max_tokens: config.anthropic.max_tokens,
            base_system_prompt: config.agent.base_system_prompt.clone(),
            context_limit: config.changelog.context_limit,
        }
    }
}

/// The sending half observers receive [`ChatEvent`]s from.
pub type EventSender = mpsc::UnboundedSender<ChatEvent>;

/// Output recorded for a tool call whose run ended before it was executed.
const UNFINISHED_CALL: &str = "tool call was not executed because the agent run ended early";

type RunLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Exclusive right to run for one persona.
///
/// Releasing it prunes every lock that no run holds or waits for, so the
/// table only grows with concurrent runs.
struct RunPermit<'a> {
    locks: &'a RunLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(self.guard.take());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

/// A tool call collected during streaming, awaiting execution.
#[derive(Debug)]
struct PendingCall {
    invocation_id: String,
    tool_name: String,
    input: Map<String, Value>,
}

/// The block currently being buffered. At most one is open at a time.
#[derive(Debug)]
enum OpenBlock {
    Text(String),
    Tool {
        id: String,
        name: String,
        json: String,
    },
}

/// Drives conversations between a user and the persona-editing agent.
pub struct AgentLoop {
    provider: Arc<dyn ProviderAdapter>,
    personas: Arc<dyn PersonaStore>,
    sessions: SessionManager,
    changelog: Arc<dyn Changelog>,
    dispatcher: Arc<ToolDispatcher>,
    settings: AgentSettings,
    run_locks: RunLocks,
}

/// Mutable state threaded through one run.
struct Run<'a> {
    persona_id: &'a str,
    session_id: String,
    log: TurnLog,
    events: &'a EventSender,
    state: LoopState,
}

impl Run<'_> {
    fn emit(&self, event: ChatEvent) {
        // A closed receiver means the observer went away; the run continues.
        if self.events.send(event).is_err() {
            debug!(persona_id = self.persona_id, "chat observer disconnected");
        }
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, session_id = %self.session_id, "loop state");
            self.state = next;
        }
    }
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn ProviderAdapter>,
        personas: Arc<dyn PersonaStore>,
        sessions: Arc<dyn SessionStore>,
        changelog: Arc<dyn Changelog>,
        dispatcher: Arc<ToolDispatcher>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            provider,
            personas,
            sessions: SessionManager::new(sessions),
            changelog,
            dispatcher,
            settings,
            run_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Runs one user message to completion, streaming records to `events`.
    ///
    /// Never fails outward: any error is reported as a single terminal
    /// [`ChatEvent::Error`] and the run ends in [`LoopState::Failed`].
    /// Runs for the same persona are serialized.
    pub async fn run(&self, persona_id: &str, message: &str, events: &EventSender) -> LoopState {
        let _permit = self.acquire_run(persona_id).await;

        let mut run = Run {
            persona_id,
            session_id: String::new(),
            log: TurnLog::new(),
            events,
            state: LoopState::AwaitingModel,
        };

        match self.drive(&mut run, message).await {
            Ok(rounds) => {
                run.transition(LoopState::Done);
                info!(persona_id, session_id = %run.session_id, rounds, "agent run complete");
                run.emit(ChatEvent::Done {
                    session_id: run.session_id.clone(),
                    rounds,
                });
            }
            Err(e) => {
                let failed_in = run.state;
                run.transition(LoopState::Failed);
                error!(persona_id, state = %failed_in, error = %e, "agent run failed");
                if !run.session_id.is_empty() {
                    self.close_open_calls(&mut run).await;
                }
                run.emit(ChatEvent::Error {
                    message: e.to_string(),
                });
            }
        }
        run.state
    }

    /// Spawns a run on its own task.
    ///
    /// Dropping the receiver does not stop the run; only `shutdown` does.
    pub fn spawn(
        self: &Arc<Self>,
        persona_id: String,
        message: String,
        shutdown: CancellationToken,
    ) -> (mpsc::UnboundedReceiver<ChatEvent>, JoinHandle<LoopState>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let agent = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::select! {
                state = agent.run(&persona_id, &message, &tx) => state,
                _ = shutdown.cancelled() => {
                    warn!(persona_id = %persona_id, "agent run interrupted by shutdown");
                    let _ = tx.send(ChatEvent::Error {
                        message: "server is shutting down".into(),
                    });
                    LoopState::Failed
                }
            }
        });
        (rx, handle)
    }

    async fn acquire_run(&self, persona_id: &str) -> RunPermit<'_> {
        let lock = {
            let mut locks = self
                .run_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(persona_id.to_string()).or_default())
        };
        RunPermit {
            locks: &self.run_locks,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Starts a new, empty conversation for a persona.
    ///
    /// The new session starts at the current end of the changelog, so the
    /// agent is not told about edits made before the clear.
    pub async fn clear_session(&self, persona_id: &str) -> Result<Session, QuillError> {
        let _permit = self.acquire_run(persona_id).await;
        let latest = self.changelog.latest_id().await?;
        self.sessions.clear(persona_id, latest).await
    }

    /// Answers the calls a failed run left open. Failures are only logged;
    /// the next run retries when it loads the log.
    async fn close_open_calls(&self, run: &mut Run<'_>) {
        match self
            .sessions
            .close_unanswered(&run.session_id, &mut run.log, UNFINISHED_CALL)
            .await
        {
            Ok(0) => {}
            Ok(closed) => {
                debug!(session_id = %run.session_id, closed, "closed tool calls left open by the failure");
            }
            Err(e) => {
                warn!(session_id = %run.session_id, error = %e, "could not close open tool calls");
            }
        }
    }

    async fn drive(&self, run: &mut Run<'_>, message: &str) -> Result<u32, QuillError> {
        // Fail fast on an unknown persona before creating a session for it.
        self.load_persona(run.persona_id).await?;

        let session = self.sessions.get_or_create(run.persona_id).await?;
        run.session_id = session.id.clone();
        run.log = self.sessions.load_log(&session.id).await?;
        // A run cancelled by shutdown can leave calls without results.
        let closed = self
            .sessions
            .close_unanswered(&run.session_id, &mut run.log, UNFINISHED_CALL)
            .await?;
        if closed > 0 {
            warn!(session_id = %run.session_id, closed, "closed tool calls left open by an interrupted run");
        }

        let changes = unseen_changes(
            self.changelog.as_ref(),
            session.last_changelog_id.as_deref(),
            self.settings.context_limit,
        )
        .await?;
        if let Some(latest) = &changes.latest_id {
            self.sessions
                .mark_changelog_seen(&session.id, latest)
                .await?;
        }
        if !changes.is_empty() {
            debug!(count = changes.entries.len(), omitted = changes.omitted, "injecting user edits");
        }

        self.sessions
            .append(&run.session_id, &mut run.log, Turn::user(message))
            .await?;

        let mut rounds = 0u32;
        loop {
            if self.settings.max_rounds > 0 && rounds >= self.settings.max_rounds {
                return Err(QuillError::Internal(format!(
                    "model was invoked {rounds} times without finishing"
                )));
            }
            rounds += 1;
            run.transition(LoopState::AwaitingModel);

            // Rebuilt every round so the model sees its own edits.
            let persona = self.load_persona(run.persona_id).await?;
            let request = ModelRequest {
                model: None,
                system: build_system_prompt(&self.settings.base_system_prompt, &persona, &changes),
                messages: project(run.log.turns()),
                tools: self.dispatcher.schemas(),
                max_tokens: self.settings.max_tokens,
            };
            debug!(round = rounds, messages = request.messages.len(), "invoking model");

            let stream = self.provider.stream(request).await?;
            let (calls, stop_reason) = self.consume(run, stream).await?;

            if calls.is_empty() {
                if stop_reason == Some(StopReason::ToolUse) {
                    warn!(session_id = %run.session_id, "tool_use stop without any tool call");
                }
                return Ok(rounds);
            }
            if stop_reason != Some(StopReason::ToolUse) {
                debug!(?stop_reason, "executing tool calls despite non tool_use stop");
            }

            run.transition(LoopState::ToolPending);
            for call in calls {
                self.execute(run, call).await?;
            }
        }
    }

    async fn load_persona(&self, persona_id: &str) -> Result<quill_core::Persona, QuillError> {
        self.personas
            .get_persona(persona_id)
            .await?
            .ok_or_else(|| QuillError::not_found("persona", persona_id))
    }

    /// Consumes one model stream, persisting each finished block as a turn.
    async fn consume(
        &self,
        run: &mut Run<'_>,
        mut stream: ModelEventStream,
    ) -> Result<(Vec<PendingCall>, Option<StopReason>), QuillError> {
        let mut open: Option<OpenBlock> = None;
        let mut calls = Vec::new();
        let mut stop_reason = None;

        while let Some(event) = stream.next().await {
            match event? {
                ModelStreamEvent::MessageStart | ModelStreamEvent::Ping => {}
                ModelStreamEvent::ContentBlockStart { block, .. } => {
                    run.transition(LoopState::Streaming);
                    if let Some(previous) = open.take() {
                        warn!("content block started before the previous one stopped");
                        self.flush(run, previous, &mut calls).await?;
                    }
                    open = Some(match block {
                        BlockStart::Text => OpenBlock::Text(String::new()),
                        BlockStart::ToolUse { id, name } => OpenBlock::Tool {
                            id,
                            name,
                            json: String::new(),
                        },
                    });
                }
                ModelStreamEvent::ContentBlockDelta { index, delta } => {
                    run.transition(LoopState::Streaming);
                    match (&mut open, delta) {
                        (Some(OpenBlock::Text(buffer)), BlockDelta::Text(text)) => {
                            buffer.push_str(&text);
                            run.emit(ChatEvent::TextDelta { text });
                        }
                        (Some(OpenBlock::Tool { json, .. }), BlockDelta::InputJson(part)) => {
                            json.push_str(&part);
                        }
                        (_, delta) => {
                            warn!(index, ?delta, "delta does not match the open block, ignored");
                        }
                    }
                }
                ModelStreamEvent::ContentBlockStop { index } => match open.take() {
                    Some(block) => self.flush(run, block, &mut calls).await?,
                    None => debug!(index, "stop for a block that was never opened"),
                },
                ModelStreamEvent::MessageDelta { stop_reason: reason } => {
                    if reason.is_some() {
                        stop_reason = reason;
                    }
                }
                ModelStreamEvent::MessageStop => break,
            }
        }

        if let Some(block) = open.take() {
            warn!("model stream ended with an open block");
            self.flush(run, block, &mut calls).await?;
        }
        Ok((calls, stop_reason))
    }

    async fn flush(
        &self,
        run: &mut Run<'_>,
        block: OpenBlock,
        calls: &mut Vec<PendingCall>,
    ) -> Result<(), QuillError> {
        match block {
            OpenBlock::Text(text) => {
                if text.is_empty() {
                    return Ok(());
                }
                let turn = Turn::assistant_text(text.clone());
                let turn_id = turn.id().to_string();
                self.sessions
                    .append(&run.session_id, &mut run.log, turn)
                    .await?;
                run.emit(ChatEvent::TextComplete { turn_id, text });
            }
            OpenBlock::Tool { id, name, json } => {
                let input = decode_tool_input(&name, &json);
                let turn = Turn::tool_call(id.clone(), name.clone(), input.clone());
                let turn_id = turn.id().to_string();
                self.sessions
                    .append(&run.session_id, &mut run.log, turn)
                    .await?;
                run.emit(ChatEvent::ToolCall {
                    turn_id,
                    tool_invocation_id: id.clone(),
                    tool_name: name.clone(),
                    input: input.clone(),
                });
                calls.push(PendingCall {
                    invocation_id: id,
                    tool_name: name,
                    input,
                });
            }
        }
        Ok(())
    }

    async fn execute(&self, run: &mut Run<'_>, call: PendingCall) -> Result<(), QuillError> {
        let output = self
            .dispatcher
            .execute(
                &call.tool_name,
                &call.input,
                run.persona_id,
                Some(&run.session_id),
            )
            .await;
        let turn = Turn::tool_result(call.invocation_id.clone(), output.output.clone(), output.is_error);
        let turn_id = turn.id().to_string();
        self.sessions
            .append(&run.session_id, &mut run.log, turn)
            .await?;
        run.emit(ChatEvent::ToolResult {
            turn_id,
            tool_invocation_id: call.invocation_id,
            output: output.output,
            is_error: output.is_error,
        });
        Ok(())
    }
}

/// Parses accumulated tool input JSON, falling back to an empty object.
fn decode_tool_input(tool_name: &str, raw: &str) -> Map<String, Value> {
    if raw.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Map<String, Value>>(raw) {
        Ok(input) => input,
        Err(e) => {
            warn!(tool = tool_name, error = %e, "malformed tool input, using {{}}");
            Map::new()
        }
    }
}
