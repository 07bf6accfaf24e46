// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management: PRAGMA setup, migrations, lifecycle.
//!
//! All access goes through tokio-rusqlite's single background thread, which
//! serializes writes and makes every `call` atomic with respect to the others.

use std::path::Path;
use std::time::Duration;

use quill_core::QuillError;
use tracing::{debug, info};

use crate::migrations;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the SQLite database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> QuillError {
    QuillError::Storage {
        source: Box::new(e),
    }
}

impl Database {
    /// Opens (creating if needed) the database file and applies migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, QuillError> {
        match Path::new(path).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent).map_err(QuillError::storage)?;
            }
            _ => {}
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| QuillError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(wal_mode).await?;
        info!(path = %path, wal_mode, "database opened");
        Ok(db)
    }

    /// Opens a private in-memory database with migrations applied.
    pub async fn open_in_memory() -> Result<Self, QuillError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| QuillError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), QuillError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                if wal_mode {
                    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                        row.get::<_, String>(0)
                    })?;
                }
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                conn.busy_timeout(BUSY_TIMEOUT)?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        self.conn
            .call(|conn| migrations::run_migrations(conn))
            .await
            .map_err(|e| QuillError::Storage {
                source: e.to_string().into(),
            })?;
        debug!("database schema up to date");
        Ok(())
    }

    /// Checkpoints the WAL so the database file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), QuillError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_parent_directories_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/quill.db");
        let db = Database::open(path.to_str().unwrap(), true).await.unwrap();

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
                     AND name != 'refinery_schema_history' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();
        assert_eq!(
            tables,
            vec![
                "changelog",
                "persona_test_cases",
                "personas",
                "sessions",
                "test_cases",
                "turns"
            ]
        );
        db.checkpoint().await.unwrap();
    }

    #[tokio::test]
    async fn reopening_does_not_reapply_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill.db");
        let path = path.to_str().unwrap();
        drop(Database::open(path, false).await.unwrap());
        assert!(Database::open(path, false).await.is_ok());
    }
}
