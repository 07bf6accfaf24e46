// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain storage traits for personas, test cases, and chat sessions.

use async_trait::async_trait;

use crate::error::QuillError;
use crate::turn::{Session, Turn};
use crate::types::{Persona, TestCase, TestResult, WritePolicy};

/// Durable storage for personas and their test cases.
///
/// Calls are individually durable but not transactional across calls.
#[async_trait]
pub trait PersonaStore: Send + Sync {
    async fn list_personas(&self) -> Result<Vec<Persona>, QuillError>;

    async fn get_persona(&self, id: &str) -> Result<Option<Persona>, QuillError>;

    async fn create_persona(&self, persona: &Persona) -> Result<Persona, QuillError>;

    /// Persists `persona` and returns the stored copy with its bumped version.
    ///
    /// Under [`WritePolicy::RejectStale`] the write fails with
    /// [`QuillError::Conflict`] when `persona.version` is not the stored version.
    async fn update_persona(
        &self,
        persona: &Persona,
        policy: WritePolicy,
    ) -> Result<Persona, QuillError>;

    async fn delete_persona(&self, id: &str) -> Result<bool, QuillError>;

    async fn get_test_case(&self, id: &str) -> Result<Option<TestCase>, QuillError>;

    /// Test cases with the given ids, in the order given. Missing ids are skipped.
    async fn list_test_cases(&self, ids: &[String]) -> Result<Vec<TestCase>, QuillError>;

    async fn create_test_case(&self, test_case: &TestCase) -> Result<(), QuillError>;

    async fn update_test_case(&self, test_case: &TestCase) -> Result<(), QuillError>;

    /// Destroys the test case and unlinks it from every persona.
    ///
    /// Returns the ids of personas that had it linked. Deleting an unknown id
    /// succeeds with an empty list.
    async fn delete_test_case(&self, id: &str) -> Result<Vec<String>, QuillError>;

    async fn set_test_result(&self, id: &str, result: &TestResult) -> Result<(), QuillError>;
}

/// Durable storage for chat sessions and their turn logs.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The current session of a persona, if one exists.
    async fn current_session(&self, persona_id: &str) -> Result<Option<Session>, QuillError>;

    /// Stores a new session, replacing any current session of the same persona.
    async fn create_session(&self, session: &Session) -> Result<(), QuillError>;

    /// Deletes a session together with its turns.
    async fn delete_session(&self, session_id: &str) -> Result<(), QuillError>;

    async fn append_turn(&self, session_id: &str, turn: &Turn) -> Result<(), QuillError>;

    /// All turns of a session in append order.
    async fn turns(&self, session_id: &str) -> Result<Vec<Turn>, QuillError>;

    async fn mark_changelog_seen(
        &self,
        session_id: &str,
        entry_id: Option<&str>,
    ) -> Result<(), QuillError>;
}
