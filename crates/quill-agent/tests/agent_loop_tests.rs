// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end agent loop tests with a scripted provider and in-memory storage.

use std::sync::Arc;

use quill_agent::{AgentLoop, AgentSettings, ChatEvent, LoopState};
use quill_core::{
    BlockDelta, BlockStart, ChangeSource, ContentBlock, ModelRequest, ModelStreamEvent, Persona,
    PersonaStore, QuillError, Role, SessionStore, StateEvent, Turn,
};
use quill_test_utils::{
    Script, TestHarness, failing_response, text_response, tool_use_response,
};
use quill_tools::ToolDispatcher;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct Setup {
    harness: TestHarness,
    agent: Arc<AgentLoop>,
    persona: Persona,
}

async fn setup_with(harness: TestHarness) -> Setup {
    let dispatcher = ToolDispatcher::with_persona_tools(
        harness.storage.clone(),
        harness.recorder.clone(),
        harness.config.concurrency.write_policy,
    );
    let agent = AgentLoop::new(
        harness.provider.clone(),
        harness.storage.clone(),
        harness.storage.clone(),
        harness.storage.clone(),
        Arc::new(dispatcher),
        AgentSettings::from_config(&harness.config),
    );
    let persona = harness.seed_persona("Ada", "Be precise.").await.unwrap();
    Setup {
        harness,
        agent: Arc::new(agent),
        persona,
    }
}

async fn setup(scripts: Vec<Script>) -> Setup {
    setup_with(
        TestHarness::builder()
            .with_scripts(scripts)
            .build()
            .await
            .unwrap(),
    )
    .await
}

async fn run(agent: &AgentLoop, persona_id: &str, message: &str) -> (LoopState, Vec<ChatEvent>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let state = agent.run(persona_id, message, &tx).await;
    drop(tx);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (state, events)
}

fn kinds(events: &[ChatEvent]) -> Vec<&'static str> {
    let mut kinds: Vec<&'static str> = events.iter().map(ChatEvent::kind).collect();
    kinds.dedup();
    kinds
}

async fn turns(setup: &Setup) -> Vec<Turn> {
    setup.agent.sessions().history(&setup.persona.id).await.unwrap()
}

#[tokio::test]
async fn text_reply_ends_in_done() {
    let s = setup(vec![text_response("Hello there, how can I help?")]).await;
    let (state, events) = run(&s.agent, &s.persona.id, "hi").await;

    assert_eq!(state, LoopState::Done);
    assert_eq!(kinds(&events), vec!["text_delta", "text_complete", "done"]);
    let streamed: String = events
        .iter()
        .filter_map(|e| match e {
            ChatEvent::TextDelta { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(streamed, "Hello there, how can I help?");

    let log = turns(&s).await;
    assert_eq!(log.len(), 2);
    assert!(matches!(&log[0], Turn::User { content, .. } if content == "hi"));
    assert!(
        matches!(&log[1], Turn::AssistantText { content, .. } if content == "Hello there, how can I help?")
    );
    assert_eq!(s.harness.provider.call_count().await, 1);
}

#[tokio::test]
async fn tool_round_persists_edit_and_requeries_model() {
    let s = setup(vec![
        tool_use_response(
            Some("Renaming."),
            &[("t1", "update_name", r#"{"name":"Grace"}"#)],
        ),
        text_response("Done."),
    ])
    .await;
    let (state, events) = run(&s.agent, &s.persona.id, "rename her to Grace").await;

    assert_eq!(state, LoopState::Done);
    assert_eq!(
        kinds(&events),
        vec![
            "text_delta",
            "text_complete",
            "tool_call",
            "tool_result",
            "text_delta",
            "text_complete",
            "done"
        ]
    );
    match events.iter().find(|e| e.kind() == "tool_call") {
        Some(ChatEvent::ToolCall { tool_name, input, .. }) => {
            assert_eq!(tool_name, "update_name");
            assert_eq!(input["name"], "Grace");
        }
        other => panic!("expected tool_call, got {other:?}"),
    }

    let session = s
        .harness
        .storage
        .current_session(&s.persona.id)
        .await
        .unwrap()
        .unwrap();
    let stored = s.harness.storage.get_persona(&s.persona.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Grace");
    assert_eq!(stored.agent_session_id.as_deref(), Some(session.id.as_str()));

    let requests = s.harness.provider.requests().await;
    assert_eq!(requests.len(), 2);
    let second = &requests[1].messages;
    assert_eq!(second.len(), 3);
    assert_eq!(second[1].role, Role::Assistant);
    assert!(matches!(
        &second[2].content[0],
        ContentBlock::ToolResult { tool_use_id, is_error: false, .. } if tool_use_id == "t1"
    ));
    assert!(requests[1].system.contains("\"Grace\""));
    assert_eq!(requests[0].tools.len(), 9);
}

#[tokio::test]
async fn tools_run_in_call_order_before_requery() {
    let s = setup(vec![
        tool_use_response(
            None,
            &[
                ("t1", "update_instructions", r#"{"instructions":"Be brief."}"#),
                ("t2", "get_persona", "{}"),
            ],
        ),
        text_response("Updated."),
    ])
    .await;
    let (state, events) = run(&s.agent, &s.persona.id, "shorten it").await;
    assert_eq!(state, LoopState::Done);

    let results: Vec<(&str, &str)> = events
        .iter()
        .filter_map(|e| match e {
            ChatEvent::ToolResult {
                tool_invocation_id,
                output,
                ..
            } => Some((tool_invocation_id.as_str(), output.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "t1");
    assert_eq!(results[1].0, "t2");
    // get_persona runs after the edit and sees it.
    assert!(results[1].1.contains("Be brief."));

    let requests = s.harness.provider.requests().await;
    let last = requests[1].messages.last().unwrap();
    assert_eq!(last.content.len(), 2);
}

#[tokio::test]
async fn malformed_tool_input_defaults_to_empty_object() {
    let s = setup(vec![
        tool_use_response(None, &[("t1", "update_name", r#"{"name": "Gr"#)]),
        text_response("Sorry."),
    ])
    .await;
    let (state, events) = run(&s.agent, &s.persona.id, "rename").await;

    assert_eq!(state, LoopState::Done);
    match events.iter().find(|e| e.kind() == "tool_call") {
        Some(ChatEvent::ToolCall { input, .. }) => assert!(input.is_empty()),
        other => panic!("expected tool_call, got {other:?}"),
    }
    match events.iter().find(|e| e.kind() == "tool_result") {
        Some(ChatEvent::ToolResult { is_error, .. }) => assert!(*is_error),
        other => panic!("expected tool_result, got {other:?}"),
    }
}

#[tokio::test]
async fn stream_failure_is_terminal_and_keeps_partial_turns() {
    let s = setup(vec![
        tool_use_response(None, &[("t1", "get_persona", "{}")]),
        failing_response("Half a sen", "connection reset"),
    ])
    .await;
    let (state, events) = run(&s.agent, &s.persona.id, "look").await;

    assert_eq!(state, LoopState::Failed);
    let terminal: Vec<&ChatEvent> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(terminal.len(), 1);
    match terminal[0] {
        ChatEvent::Error { message } => assert!(message.contains("connection reset")),
        other => panic!("expected error, got {other:?}"),
    }
    assert!(events.last().is_some_and(ChatEvent::is_terminal));

    let log = turns(&s).await;
    let kinds: Vec<&str> = log.iter().map(Turn::kind).collect();
    assert_eq!(kinds, vec!["user", "tool_call", "tool_result"]);
}

#[tokio::test]
async fn provider_refusal_reports_one_error() {
    let s = setup(vec![]).await;
    s.harness.provider.refuse_with("overloaded").await;
    let (state, events) = run(&s.agent, &s.persona.id, "hi").await;

    assert_eq!(state, LoopState::Failed);
    assert_eq!(kinds(&events), vec!["error"]);
    assert_eq!(turns(&s).await.len(), 1);
}

#[tokio::test]
async fn unknown_persona_fails_without_a_session() {
    let s = setup(vec![]).await;
    let (state, events) = run(&s.agent, "missing", "hi").await;

    assert_eq!(state, LoopState::Failed);
    match &events[..] {
        [ChatEvent::Error { message }] => assert!(message.contains("persona not found")),
        other => panic!("unexpected events {other:?}"),
    }
    assert!(
        s.harness
            .storage
            .current_session("missing")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn max_rounds_bounds_a_tool_happy_model() {
    let harness = TestHarness::builder()
        .with_max_rounds(2)
        .with_scripts(vec![
            tool_use_response(None, &[("t1", "get_persona", "{}")]),
            tool_use_response(None, &[("t2", "get_persona", "{}")]),
            tool_use_response(None, &[("t3", "get_persona", "{}")]),
        ])
        .build()
        .await
        .unwrap();
    let s = setup_with(harness).await;
    let (state, events) = run(&s.agent, &s.persona.id, "loop forever").await;

    assert_eq!(state, LoopState::Failed);
    assert!(matches!(
        events.last(),
        Some(ChatEvent::Error { message }) if message.contains("2 times")
    ));
    assert_eq!(s.harness.provider.call_count().await, 2);
}

#[tokio::test]
async fn user_edits_are_injected_once() {
    let s = setup(vec![text_response("Noted."), text_response("Still noted.")]).await;
    let mut edited = s.persona.clone();
    edited.instructions = "Be warm.".into();
    let edited = s
        .harness
        .storage
        .update_persona(&edited, quill_core::WritePolicy::LastWriterWins)
        .await
        .unwrap();
    s.harness
        .recorder
        .persona_updated(ChangeSource::Ui, &edited, "Updated instructions of \"Ada\"".into())
        .await;

    run(&s.agent, &s.persona.id, "what changed?").await;
    run(&s.agent, &s.persona.id, "and now?").await;

    let requests = s.harness.provider.requests().await;
    assert!(requests[0].system.contains("Changes made by the user since your last turn"));
    assert!(requests[0].system.contains("Updated instructions of \"Ada\""));
    assert!(requests[0].system.contains("Be warm."));
    assert!(!requests[1].system.contains("Changes made by the user"));

    // The second run resumes the same session log.
    assert_eq!(requests[1].messages.len(), 3);
}

#[tokio::test]
async fn agent_edits_are_not_reported_back_to_the_agent() {
    let s = setup(vec![
        tool_use_response(None, &[("t1", "update_name", r#"{"name":"Grace"}"#)]),
        text_response("Renamed."),
        text_response("Hi."),
    ])
    .await;
    run(&s.agent, &s.persona.id, "rename").await;
    run(&s.agent, &s.persona.id, "hello").await;

    let requests = s.harness.provider.requests().await;
    assert!(!requests[2].system.contains("Changes made by the user"));
}

#[tokio::test]
async fn dropped_observer_does_not_stop_the_run() {
    let s = setup(vec![
        tool_use_response(None, &[("t1", "update_name", r#"{"name":"Grace"}"#)]),
        text_response("Renamed."),
    ])
    .await;
    let (rx, handle) = s.agent.spawn(
        s.persona.id.clone(),
        "rename".into(),
        CancellationToken::new(),
    );
    drop(rx);

    assert_eq!(handle.await.unwrap(), LoopState::Done);
    let stored = s.harness.storage.get_persona(&s.persona.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Grace");
    assert_eq!(turns(&s).await.len(), 5);
}

#[tokio::test]
async fn cleared_session_starts_fresh() {
    let s = setup(vec![text_response("One."), text_response("Two.")]).await;
    run(&s.agent, &s.persona.id, "first").await;
    s.agent.clear_session(&s.persona.id).await.unwrap();
    run(&s.agent, &s.persona.id, "second").await;

    let requests = s.harness.provider.requests().await;
    assert_eq!(requests[1].messages.len(), 1);
    assert_eq!(turns(&s).await.len(), 2);
}

#[tokio::test]
async fn edits_before_a_clear_are_not_reported_as_new() {
    let s = setup(vec![text_response("Fresh start.")]).await;
    s.harness
        .recorder
        .persona_updated(ChangeSource::Ui, &s.persona, "Updated name of \"Ada\"".into())
        .await;

    s.agent.clear_session(&s.persona.id).await.unwrap();
    run(&s.agent, &s.persona.id, "hello").await;

    let requests = s.harness.provider.requests().await;
    assert!(!requests[0].system.contains("Changes made by the user"));
}

/// A tool block that completes, followed by a transport failure before the
/// message ends.
fn tool_call_then_reset(id: &str, name: &str, input: &str) -> Script {
    vec![
        Ok(ModelStreamEvent::MessageStart),
        Ok(ModelStreamEvent::ContentBlockStart {
            index: 0,
            block: BlockStart::ToolUse {
                id: id.into(),
                name: name.into(),
            },
        }),
        Ok(ModelStreamEvent::ContentBlockDelta {
            index: 0,
            delta: BlockDelta::InputJson(input.into()),
        }),
        Ok(ModelStreamEvent::ContentBlockStop { index: 0 }),
        Err(QuillError::provider("connection reset")),
    ]
}

/// Every `tool_use` block in the request has a matching `tool_result`.
fn assert_calls_answered(request: &ModelRequest) {
    let mut uses = Vec::new();
    let mut results = Vec::new();
    for block in request.messages.iter().flat_map(|m| &m.content) {
        match block {
            ContentBlock::ToolUse { id, .. } => uses.push(id.clone()),
            ContentBlock::ToolResult { tool_use_id, .. } => results.push(tool_use_id.clone()),
            ContentBlock::Text { .. } => {}
        }
    }
    assert_eq!(uses, results);
    let roles: Vec<Role> = request.messages.iter().map(|m| m.role).collect();
    assert!(roles.windows(2).all(|pair| pair[0] != pair[1]), "roles {roles:?}");
}

#[tokio::test]
async fn failed_round_does_not_poison_the_next_run() {
    let s = setup(vec![
        tool_call_then_reset("t1", "update_name", r#"{"name":"Grace"}"#),
        text_response("Back again."),
    ])
    .await;

    let (state, events) = run(&s.agent, &s.persona.id, "rename her").await;
    assert_eq!(state, LoopState::Failed);
    assert!(matches!(events.last(), Some(ChatEvent::Error { .. })));
    let log = turns(&s).await;
    let kinds: Vec<&str> = log.iter().map(Turn::kind).collect();
    assert_eq!(kinds, vec!["user", "tool_call", "tool_result"]);
    assert!(matches!(
        &log[2],
        Turn::ToolResult { tool_invocation_id, is_error: true, .. } if tool_invocation_id == "t1"
    ));

    // The call never ran.
    let stored = s.harness.storage.get_persona(&s.persona.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Ada");

    let (state, _) = run(&s.agent, &s.persona.id, "are you there?").await;
    assert_eq!(state, LoopState::Done);
    let requests = s.harness.provider.requests().await;
    assert_calls_answered(&requests[1]);
}

#[tokio::test]
async fn call_left_open_by_an_interrupted_run_is_closed_on_load() {
    let s = setup(vec![text_response("Hello.")]).await;
    let session = s.agent.sessions().get_or_create(&s.persona.id).await.unwrap();
    for turn in [
        Turn::user("rename her"),
        Turn::tool_call("t1", "update_name", serde_json::Map::new()),
    ] {
        s.harness.storage.append_turn(&session.id, &turn).await.unwrap();
    }

    let (state, _) = run(&s.agent, &s.persona.id, "hello?").await;

    assert_eq!(state, LoopState::Done);
    let requests = s.harness.provider.requests().await;
    assert_calls_answered(&requests[0]);
    let kinds: Vec<&str> = turns(&s).await.iter().map(Turn::kind).collect();
    assert_eq!(
        kinds,
        vec!["user", "tool_call", "tool_result", "user", "assistant_text"]
    );
}

#[tokio::test]
async fn agent_edits_reach_live_observers() {
    let s = setup(vec![
        tool_use_response(None, &[("t1", "update_name", r#"{"name":"Grace"}"#)]),
        text_response("Renamed."),
    ])
    .await;
    let (_subscription, mut sync) = s.harness.broadcaster.subscribe_channel();
    assert!(matches!(sync.recv().await, Some(StateEvent::Connected { .. })));

    run(&s.agent, &s.persona.id, "rename").await;

    match sync.try_recv() {
        Ok(StateEvent::ConfigUpdated { persona, source }) => {
            assert_eq!(source, ChangeSource::Agent);
            assert_eq!(persona.name, "Grace");
        }
        other => panic!("expected config_updated, got {other:?}"),
    }
    assert!(sync.try_recv().is_err());
}
