// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single entry point for publishing a mutation.
//!
//! Every mutation is broadcast to live observers and appended to the durable
//! changelog. The two are not transactionally coupled.

use std::sync::Arc;

use quill_core::{
    ChangeAction, ChangeSource, Changelog, ChangelogEntry, Persona, StateEvent, TestCase,
    TestResult,
};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::broadcaster::ChangeBroadcaster;

/// Couples the broadcaster with the changelog and its retention policy.
#[derive(Clone)]
pub struct ChangeRecorder {
    changelog: Arc<dyn Changelog>,
    broadcaster: ChangeBroadcaster,
    retain: usize,
}

impl ChangeRecorder {
    /// `retain` is the number of entries kept after each append; 0 keeps all.
    pub fn new(changelog: Arc<dyn Changelog>, broadcaster: ChangeBroadcaster, retain: usize) -> Self {
        Self {
            changelog,
            broadcaster,
            retain,
        }
    }

    pub fn broadcaster(&self) -> &ChangeBroadcaster {
        &self.broadcaster
    }

    pub fn changelog(&self) -> &Arc<dyn Changelog> {
        &self.changelog
    }

    /// Emits `event` (if any) and appends `entry`.
    ///
    /// The mutation has already been persisted when this is called, so
    /// changelog failures are logged rather than returned.
    pub async fn record(&self, entry: ChangelogEntry, event: Option<StateEvent>) {
        if let Some(event) = event {
            self.broadcaster.emit(event);
        }

        let action = entry.action;
        let source = entry.source;
        if let Err(e) = self.changelog.append(&entry).await {
            warn!(%action, %source, error = %e, "failed to append changelog entry");
            return;
        }

        if self.retain > 0 {
            match self.changelog.truncate(self.retain).await {
                Ok(0) => {}
                Ok(dropped) => debug!(dropped, retain = self.retain, "changelog truncated"),
                Err(e) => warn!(error = %e, "failed to truncate changelog"),
            }
        }
    }

    pub async fn persona_created(&self, source: ChangeSource, persona: &Persona) {
        let entry = ChangelogEntry::new(
            source,
            ChangeAction::PersonaCreated,
            format!("Created persona \"{}\"", persona.name),
        )
        .with_details(persona_details(persona));
        let event = StateEvent::ConfigUpdated {
            persona: persona.clone(),
            source,
        };
        self.record(entry, Some(event)).await;
    }

    /// Deletions have no live event; observers learn of them from the changelog.
    pub async fn persona_deleted(&self, source: ChangeSource, persona: &Persona) {
        let entry = ChangelogEntry::new(
            source,
            ChangeAction::PersonaDeleted,
            format!("Deleted persona \"{}\"", persona.name),
        )
        .with_details(persona_details(persona));
        self.record(entry, None).await;
    }

    pub async fn test_result_recorded(
        &self,
        source: ChangeSource,
        test_case_id: &str,
        result: &TestResult,
    ) {
        let mut details = Map::new();
        details.insert("test_case_id".into(), json!(test_case_id));
        details.insert("passed".into(), json!(result.passed));
        let entry = ChangelogEntry::new(
            source,
            ChangeAction::TestResultRecorded,
            format!("Recorded a result for test case {test_case_id}"),
        )
        .with_details(details);
        let event = StateEvent::TestResultUpdated {
            test_case_id: test_case_id.to_string(),
            result: result.clone(),
        };
        self.record(entry, Some(event)).await;
    }

    pub async fn persona_updated(&self, source: ChangeSource, persona: &Persona, summary: String) {
        let entry = ChangelogEntry::new(source, ChangeAction::PersonaUpdated, summary)
            .with_details(persona_details(persona));
        let event = StateEvent::ConfigUpdated {
            persona: persona.clone(),
            source,
        };
        self.record(entry, Some(event)).await;
    }

    /// Records a link or unlink, which changes the persona's reference set.
    pub async fn link_changed(
        &self,
        source: ChangeSource,
        persona: &Persona,
        test_case_id: &str,
        linked: bool,
    ) {
        let (action, verb) = if linked {
            (ChangeAction::TestCaseLinked, "Linked")
        } else {
            (ChangeAction::TestCaseUnlinked, "Unlinked")
        };
        let mut details = persona_details(persona);
        details.insert("test_case_id".into(), json!(test_case_id));
        let entry = ChangelogEntry::new(
            source,
            action,
            format!("{verb} test case {test_case_id} on \"{}\"", persona.name),
        )
        .with_details(details);
        let event = StateEvent::ConfigUpdated {
            persona: persona.clone(),
            source,
        };
        self.record(entry, Some(event)).await;
    }

    pub async fn test_case_created(
        &self,
        source: ChangeSource,
        persona_id: Option<&str>,
        test_case: &TestCase,
    ) {
        let mut details = test_case_details(test_case);
        if let Some(persona_id) = persona_id {
            details.insert("persona_id".into(), json!(persona_id));
        }
        let entry = ChangelogEntry::new(
            source,
            ChangeAction::TestCaseCreated,
            format!("Created test case \"{}\"", test_case.name),
        )
        .with_details(details);
        let event = StateEvent::TestCaseAdded {
            persona_id: persona_id.map(str::to_string),
            test_case: test_case.clone(),
        };
        self.record(entry, Some(event)).await;
    }

    pub async fn test_case_updated(&self, source: ChangeSource, test_case: &TestCase) {
        let entry = ChangelogEntry::new(
            source,
            ChangeAction::TestCaseUpdated,
            format!("Updated test case \"{}\"", test_case.name),
        )
        .with_details(test_case_details(test_case));
        let event = StateEvent::TestCaseUpdated {
            test_case: test_case.clone(),
        };
        self.record(entry, Some(event)).await;
    }

    /// Records a deletion and the personas it was unlinked from.
    pub async fn test_case_deleted(
        &self,
        source: ChangeSource,
        test_case_id: &str,
        unlinked_from: &[String],
    ) {
        let mut details = Map::new();
        details.insert("test_case_id".into(), json!(test_case_id));
        details.insert("unlinked_from".into(), json!(unlinked_from));
        let entry = ChangelogEntry::new(
            source,
            ChangeAction::TestCaseDeleted,
            format!("Deleted test case {test_case_id}"),
        )
        .with_details(details);
        let event = StateEvent::TestCaseDeleted {
            test_case_id: test_case_id.to_string(),
        };
        self.record(entry, Some(event)).await;
    }
}

fn persona_details(persona: &Persona) -> Map<String, Value> {
    let mut details = Map::new();
    details.insert("persona_id".into(), json!(persona.id));
    details.insert("version".into(), json!(persona.version));
    details
}

fn test_case_details(test_case: &TestCase) -> Map<String, Value> {
    let mut details = Map::new();
    details.insert("test_case_id".into(), json!(test_case.id));
    details
}
