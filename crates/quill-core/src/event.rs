// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mutation events: the durable changelog entry and the ephemeral state event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{Persona, TestCase, TestResult};

/// Who caused a mutation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeSource {
    Ui,
    Agent,
}

/// Kind of mutation recorded in the changelog.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeAction {
    PersonaCreated,
    PersonaUpdated,
    PersonaDeleted,
    TestCaseCreated,
    TestCaseUpdated,
    TestCaseDeleted,
    TestCaseLinked,
    TestCaseUnlinked,
    TestResultRecorded,
}

/// One durable changelog record.
///
/// `id` is opaque: entries are ordered by append sequence, never by comparing ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source: ChangeSource,
    pub action: ChangeAction,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

impl ChangelogEntry {
    pub fn new(source: ChangeSource, action: ChangeAction, summary: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            source,
            action,
            summary: summary.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = Some(details);
        self
    }
}

/// Ephemeral event pushed to live observers of the sync channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateEvent {
    /// Sent once to each new subscriber, carrying its diagnostic id.
    Connected { subscriber_id: String },
    ConfigUpdated {
        persona: Persona,
        source: ChangeSource,
    },
    TestCaseAdded {
        persona_id: Option<String>,
        test_case: TestCase,
    },
    TestCaseUpdated { test_case: TestCase },
    TestCaseDeleted { test_case_id: String },
    TestResultUpdated {
        test_case_id: String,
        result: TestResult,
    },
}

impl StateEvent {
    /// The wire `type` tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::ConfigUpdated { .. } => "config_updated",
            Self::TestCaseAdded { .. } => "test_case_added",
            Self::TestCaseUpdated { .. } => "test_case_updated",
            Self::TestCaseDeleted { .. } => "test_case_deleted",
            Self::TestResultUpdated { .. } => "test_result_updated",
        }
    }
}
