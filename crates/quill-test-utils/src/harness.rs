// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness that wires storage, change propagation, and a mock provider.
//!
//! The harness stops short of building an agent loop; agent and gateway
//! tests assemble theirs from the parts exposed here.

use std::sync::Arc;

use quill_bus::{ChangeBroadcaster, ChangeRecorder};
use quill_config::model::{QuillConfig, StorageConfig};
use quill_core::{Persona, PersonaStore, QuillError, TestCase, WritePolicy};
use quill_storage::SqliteStorage;

use crate::mock_provider::{MockProvider, Script};

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    scripts: Vec<Script>,
    on_disk: bool,
    config: QuillConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = QuillConfig::default();
        // Keep every entry so tests can inspect the full ledger.
        config.changelog.retain = 0;
        Self {
            scripts: Vec::new(),
            on_disk: false,
            config,
        }
    }

    /// Scripts replayed by the mock provider, one per model invocation.
    pub fn with_scripts(mut self, scripts: Vec<Script>) -> Self {
        self.scripts = scripts;
        self
    }

    /// Uses a SQLite file in a temp dir instead of an in-memory database.
    pub fn on_disk(mut self) -> Self {
        self.on_disk = true;
        self
    }

    pub fn with_retain(mut self, retain: usize) -> Self {
        self.config.changelog.retain = retain;
        self
    }

    pub fn with_context_limit(mut self, limit: usize) -> Self {
        self.config.changelog.context_limit = limit;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.config.agent.max_rounds = max_rounds;
        self
    }

    pub fn with_write_policy(mut self, policy: WritePolicy) -> Self {
        self.config.concurrency.write_policy = policy;
        self
    }

    pub async fn build(mut self) -> Result<TestHarness, QuillError> {
        let (storage, temp_dir) = if self.on_disk {
            let temp_dir = tempfile::TempDir::new().map_err(QuillError::storage)?;
            let path = temp_dir.path().join("quill-test.db");
            self.config.storage = StorageConfig {
                database_path: path.to_string_lossy().into_owned(),
                wal_mode: true,
            };
            let storage = SqliteStorage::open(&self.config.storage).await?;
            (storage, Some(temp_dir))
        } else {
            (SqliteStorage::in_memory().await?, None)
        };
        let storage = Arc::new(storage);

        let broadcaster = ChangeBroadcaster::new();
        let recorder = ChangeRecorder::new(
            storage.clone(),
            broadcaster.clone(),
            self.config.changelog.retain,
        );

        Ok(TestHarness {
            storage,
            broadcaster,
            recorder,
            provider: Arc::new(MockProvider::with_scripts(self.scripts)),
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A fully wired, isolated test environment.
pub struct TestHarness {
    pub storage: Arc<SqliteStorage>,
    pub broadcaster: ChangeBroadcaster,
    pub recorder: ChangeRecorder,
    pub provider: Arc<MockProvider>,
    pub config: QuillConfig,
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Persists a new persona and returns the stored copy.
    pub async fn seed_persona(&self, name: &str, instructions: &str) -> Result<Persona, QuillError> {
        self.storage
            .create_persona(&Persona::new(name, instructions))
            .await
    }

    /// Persists a test case and links it to `persona`.
    pub async fn seed_linked_test_case(
        &self,
        persona: &Persona,
        name: &str,
        input: &str,
    ) -> Result<(Persona, TestCase), QuillError> {
        let test_case = TestCase::new(name, input);
        self.storage.create_test_case(&test_case).await?;
        let mut persona = persona.clone();
        persona.link(&test_case.id);
        let persona = self
            .storage
            .update_persona(&persona, WritePolicy::LastWriterWins)
            .await?;
        Ok((persona, test_case))
    }
}
