// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared domain types: personas, test cases, and adapter metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Categories of adapters in the plugin architecture.
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
pub enum AdapterType {
    Provider,
    Storage,
}

/// Health status reported by an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

/// How persona writes treat a concurrent modification.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WritePolicy {
    /// Every write replaces the stored row regardless of version.
    #[default]
    LastWriterWins,
    /// Writes carrying an outdated `version` are rejected with a conflict.
    RejectStale,
}

/// A configurable AI persona: the subject edited by both humans and the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    /// Free-text instruction body used as the persona's system prompt.
    pub instructions: String,
    /// Model override for chats with this persona.
    #[serde(default)]
    pub model: Option<String>,
    /// Linked test case ids, in link order, without duplicates.
    #[serde(default)]
    pub test_case_ids: Vec<String>,
    /// The agent session that last edited this persona.
    #[serde(default)]
    pub agent_session_id: Option<String>,
    /// Incremented by storage on every successful write.
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Persona {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            instructions: instructions.into(),
            model: None,
            test_case_ids: Vec::new(),
            agent_session_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_linked(&self, test_case_id: &str) -> bool {
        self.test_case_ids.iter().any(|id| id == test_case_id)
    }

    /// Adds a reference. Returns `false` if it was already linked.
    pub fn link(&mut self, test_case_id: &str) -> bool {
        if self.is_linked(test_case_id) {
            return false;
        }
        self.test_case_ids.push(test_case_id.to_string());
        true
    }

    /// Removes a reference. Returns `false` if it was not linked.
    pub fn unlink(&mut self, test_case_id: &str) -> bool {
        let before = self.test_case_ids.len();
        self.test_case_ids.retain(|id| id != test_case_id);
        self.test_case_ids.len() != before
    }
}

/// A reusable test input that personas can link to by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    pub input: String,
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default)]
    pub last_result: Option<TestResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TestCase {
    pub fn new(name: impl Into<String>, input: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            input: input.into(),
            expected: None,
            last_result: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of the most recent run of a test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub output: String,
    #[serde(default)]
    pub passed: Option<bool>,
    pub ran_at: DateTime<Utc>,
}
