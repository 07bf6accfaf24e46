// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatcher tests against in-memory SQLite storage.

use std::sync::Arc;

use quill_bus::{ChangeBroadcaster, ChangeRecorder};
use quill_core::{
    ChangeAction, ChangeSource, Changelog, Persona, PersonaStore, StateEvent, TestCase,
    WritePolicy,
};
use quill_storage::SqliteStorage;
use quill_tools::ToolDispatcher;
use serde_json::{Map, Value, json};
use tokio::sync::mpsc::UnboundedReceiver;

struct Fixture {
    storage: Arc<SqliteStorage>,
    dispatcher: ToolDispatcher,
    events: UnboundedReceiver<StateEvent>,
    _subscription: quill_bus::Subscription,
    persona: Persona,
}

async fn fixture() -> Fixture {
    let storage = Arc::new(SqliteStorage::in_memory().await.unwrap());
    let broadcaster = ChangeBroadcaster::new();
    let (subscription, mut events) = broadcaster.subscribe_channel();
    // Drain the `connected` greeting.
    events.recv().await.unwrap();

    let recorder = ChangeRecorder::new(storage.clone(), broadcaster, 0);
    let dispatcher =
        ToolDispatcher::with_persona_tools(storage.clone(), recorder, WritePolicy::LastWriterWins);
    let persona = storage
        .create_persona(&Persona::new("Ada", "Be precise."))
        .await
        .unwrap();

    Fixture {
        storage,
        dispatcher,
        events,
        _subscription: subscription,
        persona,
    }
}

fn input(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn update_name_persists_stamps_session_and_records() {
    let mut fx = fixture().await;
    let out = fx
        .dispatcher
        .execute("update_name", &input(json!({"name": "Grace"})), &fx.persona.id, Some("s-1"))
        .await;
    assert!(!out.is_error, "{}", out.output);

    let stored = fx.storage.get_persona(&fx.persona.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Grace");
    assert_eq!(stored.agent_session_id.as_deref(), Some("s-1"));
    assert_eq!(stored.version, fx.persona.version + 1);

    match fx.events.recv().await.unwrap() {
        StateEvent::ConfigUpdated { persona, source } => {
            assert_eq!(persona.name, "Grace");
            assert_eq!(source, ChangeSource::Agent);
        }
        other => panic!("unexpected event {other:?}"),
    }

    let log = fx.storage.entries(None).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].source, ChangeSource::Agent);
    assert_eq!(log[0].action, ChangeAction::PersonaUpdated);
}

#[tokio::test]
async fn unknown_tool_is_an_error_result() {
    let fx = fixture().await;
    let out = fx
        .dispatcher
        .execute("launch_rockets", &Map::new(), &fx.persona.id, None)
        .await;
    assert!(out.is_error);
    assert!(out.output.contains("update_name"));
}

#[tokio::test]
async fn missing_subject_and_bad_input_are_error_results() {
    let fx = fixture().await;
    let out = fx
        .dispatcher
        .execute("get_persona", &Map::new(), "nope", None)
        .await;
    assert!(out.is_error);
    assert!(out.output.contains("persona not found"));

    let out = fx
        .dispatcher
        .execute("update_name", &Map::new(), &fx.persona.id, None)
        .await;
    assert!(out.is_error);
    assert!(out.output.contains("`name`"));
}

#[tokio::test]
async fn get_persona_reports_current_state() {
    let fx = fixture().await;
    let out = fx
        .dispatcher
        .execute("get_persona", &Map::new(), &fx.persona.id, None)
        .await;
    assert!(!out.is_error);
    let parsed: Value = serde_json::from_str(&out.output).unwrap();
    assert_eq!(parsed["name"], "Ada");
    assert_eq!(parsed["instructions"], "Be precise.");
}

#[tokio::test]
async fn create_test_case_creates_and_links() {
    let fx = fixture().await;
    let out = fx
        .dispatcher
        .execute(
            "create_test_case",
            &input(json!({"name": "greeting", "input": "Say hi", "expected": "A greeting"})),
            &fx.persona.id,
            Some("s-1"),
        )
        .await;
    assert!(!out.is_error, "{}", out.output);

    let stored = fx.storage.get_persona(&fx.persona.id).await.unwrap().unwrap();
    assert_eq!(stored.test_case_ids.len(), 1);
    let tc = fx
        .storage
        .get_test_case(&stored.test_case_ids[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tc.expected.as_deref(), Some("A greeting"));

    let listed = fx
        .dispatcher
        .execute("list_test_cases", &Map::new(), &fx.persona.id, None)
        .await;
    assert!(listed.output.contains("greeting"));
}

#[tokio::test]
async fn unlink_of_absent_reference_errors_without_mutation() {
    let mut fx = fixture().await;
    let out = fx
        .dispatcher
        .execute(
            "unlink_test_case",
            &input(json!({"test_case_id": "tc-x"})),
            &fx.persona.id,
            None,
        )
        .await;
    assert!(out.is_error);

    let stored = fx.storage.get_persona(&fx.persona.id).await.unwrap().unwrap();
    assert_eq!(stored.version, fx.persona.version);
    assert!(fx.storage.entries(None).await.unwrap().is_empty());
    assert!(fx.events.try_recv().is_err());
}

#[tokio::test]
async fn unlink_keeps_the_test_case_alive() {
    let fx = fixture().await;
    let tc = TestCase::new("greeting", "Say hi");
    fx.storage.create_test_case(&tc).await.unwrap();
    let link = fx
        .dispatcher
        .execute(
            "link_test_case",
            &input(json!({"test_case_id": tc.id})),
            &fx.persona.id,
            None,
        )
        .await;
    assert!(!link.is_error, "{}", link.output);

    let out = fx
        .dispatcher
        .execute(
            "unlink_test_case",
            &input(json!({"test_case_id": tc.id})),
            &fx.persona.id,
            None,
        )
        .await;
    assert!(!out.is_error, "{}", out.output);
    assert!(fx.storage.get_test_case(&tc.id).await.unwrap().is_some());
    let stored = fx.storage.get_persona(&fx.persona.id).await.unwrap().unwrap();
    assert!(stored.test_case_ids.is_empty());
}

#[tokio::test]
async fn delete_cascades_and_always_succeeds() {
    let fx = fixture().await;
    let tc = TestCase::new("greeting", "Say hi");
    fx.storage.create_test_case(&tc).await.unwrap();

    let mut other = Persona::new("Other", "");
    other.link(&tc.id);
    let other = fx.storage.create_persona(&other).await.unwrap();
    let mut subject = fx.persona.clone();
    subject.link(&tc.id);
    fx.storage
        .update_persona(&subject, WritePolicy::LastWriterWins)
        .await
        .unwrap();

    let out = fx
        .dispatcher
        .execute(
            "delete_test_case",
            &input(json!({"test_case_id": tc.id})),
            &fx.persona.id,
            None,
        )
        .await;
    assert!(!out.is_error, "{}", out.output);
    assert!(fx.storage.get_test_case(&tc.id).await.unwrap().is_none());
    for id in [&fx.persona.id, &other.id] {
        let p = fx.storage.get_persona(id).await.unwrap().unwrap();
        assert!(p.test_case_ids.is_empty());
    }

    let again = fx
        .dispatcher
        .execute(
            "delete_test_case",
            &input(json!({"test_case_id": tc.id})),
            &fx.persona.id,
            None,
        )
        .await;
    assert!(!again.is_error);
}

#[tokio::test]
async fn update_test_case_requires_a_field() {
    let fx = fixture().await;
    let tc = TestCase::new("greeting", "Say hi");
    fx.storage.create_test_case(&tc).await.unwrap();

    let empty = fx
        .dispatcher
        .execute(
            "update_test_case",
            &input(json!({"test_case_id": tc.id})),
            &fx.persona.id,
            None,
        )
        .await;
    assert!(empty.is_error);

    let out = fx
        .dispatcher
        .execute(
            "update_test_case",
            &input(json!({"test_case_id": tc.id, "input": "Say hello"})),
            &fx.persona.id,
            None,
        )
        .await;
    assert!(!out.is_error, "{}", out.output);
    let stored = fx.storage.get_test_case(&tc.id).await.unwrap().unwrap();
    assert_eq!(stored.input, "Say hello");
}

#[tokio::test]
async fn persona_tool_schemas_are_sorted() {
    let fx = fixture().await;
    let names: Vec<String> = fx.dispatcher.schemas().into_iter().map(|s| s.name).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
    assert_eq!(names.len(), 9);
}
