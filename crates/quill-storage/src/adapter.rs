// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage traits.

use async_trait::async_trait;
use tracing::debug;

use quill_config::model::StorageConfig;
use quill_core::{
    AdapterType, ChangelogEntry, Changelog, HealthStatus, Persona, PersonaStore, PluginAdapter,
    QuillError, Session, SessionStore, TestCase, TestResult, Turn, WritePolicy,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage for personas, sessions, and the changelog.
///
/// One instance serves all three traits; share it behind an `Arc`.
pub struct SqliteStorage {
    db: Database,
}

impl SqliteStorage {
    /// Opens the configured database file, applying migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, QuillError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        Ok(Self { db })
    }

    /// A fresh private in-memory database.
    pub async fn in_memory() -> Result<Self, QuillError> {
        Ok(Self {
            db: Database::open_in_memory().await?,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, QuillError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), QuillError> {
        self.db.checkpoint().await?;
        debug!("sqlite storage checkpointed");
        Ok(())
    }
}

#[async_trait]
impl PersonaStore for SqliteStorage {
    async fn list_personas(&self) -> Result<Vec<Persona>, QuillError> {
        queries::personas::list_personas(&self.db).await
    }

    async fn get_persona(&self, id: &str) -> Result<Option<Persona>, QuillError> {
        queries::personas::get_persona(&self.db, id).await
    }

    async fn create_persona(&self, persona: &Persona) -> Result<Persona, QuillError> {
        queries::personas::create_persona(&self.db, persona).await
    }

    async fn update_persona(
        &self,
        persona: &Persona,
        policy: WritePolicy,
    ) -> Result<Persona, QuillError> {
        queries::personas::update_persona(&self.db, persona, policy).await
    }

    async fn delete_persona(&self, id: &str) -> Result<bool, QuillError> {
        queries::personas::delete_persona(&self.db, id).await
    }

    async fn get_test_case(&self, id: &str) -> Result<Option<TestCase>, QuillError> {
        queries::test_cases::get_test_case(&self.db, id).await
    }

    async fn list_test_cases(&self, ids: &[String]) -> Result<Vec<TestCase>, QuillError> {
        queries::test_cases::list_test_cases(&self.db, ids).await
    }

    async fn create_test_case(&self, test_case: &TestCase) -> Result<(), QuillError> {
        queries::test_cases::create_test_case(&self.db, test_case).await
    }

    async fn update_test_case(&self, test_case: &TestCase) -> Result<(), QuillError> {
        queries::test_cases::update_test_case(&self.db, test_case).await
    }

    async fn delete_test_case(&self, id: &str) -> Result<Vec<String>, QuillError> {
        queries::test_cases::delete_test_case(&self.db, id).await
    }

    async fn set_test_result(&self, id: &str, result: &TestResult) -> Result<(), QuillError> {
        queries::test_cases::set_test_result(&self.db, id, result).await
    }
}

#[async_trait]
impl SessionStore for SqliteStorage {
    async fn current_session(&self, persona_id: &str) -> Result<Option<Session>, QuillError> {
        queries::sessions::current_session(&self.db, persona_id).await
    }

    async fn create_session(&self, session: &Session) -> Result<(), QuillError> {
        queries::sessions::create_session(&self.db, session).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), QuillError> {
        queries::sessions::delete_session(&self.db, session_id).await
    }

    async fn append_turn(&self, session_id: &str, turn: &Turn) -> Result<(), QuillError> {
        queries::sessions::append_turn(&self.db, session_id, turn).await
    }

    async fn turns(&self, session_id: &str) -> Result<Vec<Turn>, QuillError> {
        queries::sessions::turns(&self.db, session_id).await
    }

    async fn mark_changelog_seen(
        &self,
        session_id: &str,
        entry_id: Option<&str>,
    ) -> Result<(), QuillError> {
        queries::sessions::mark_changelog_seen(&self.db, session_id, entry_id).await
    }
}

#[async_trait]
impl Changelog for SqliteStorage {
    async fn append(&self, entry: &ChangelogEntry) -> Result<(), QuillError> {
        queries::changelog::append(&self.db, entry).await
    }

    async fn entries(&self, since: Option<&str>) -> Result<Vec<ChangelogEntry>, QuillError> {
        queries::changelog::entries(&self.db, since).await
    }

    async fn latest_id(&self) -> Result<Option<String>, QuillError> {
        queries::changelog::latest_id(&self.db).await
    }

    async fn truncate(&self, keep: usize) -> Result<usize, QuillError> {
        queries::changelog::truncate(&self.db, keep).await
    }
}
