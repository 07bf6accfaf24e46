// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Changelog ledger operations.
//!
//! Entries are ordered by the `seq` autoincrement column. `seq` values are
//! never reused after truncation, so "after entry X" stays well defined.

use quill_core::{ChangelogEntry, QuillError};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::queries::{enum_column, to_json_text};

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChangelogEntry> {
    let details: Option<String> = row.get(5)?;
    let details = details
        .map(|raw| {
            serde_json::from_str(&raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
            })
        })
        .transpose()?;
    Ok(ChangelogEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        source: enum_column(row, 2)?,
        action: enum_column(row, 3)?,
        summary: row.get(4)?,
        details,
    })
}

pub async fn append(db: &Database, entry: &ChangelogEntry) -> Result<(), QuillError> {
    let entry = entry.clone();
    db.connection()
        .call(move |conn| {
            let details = entry.details.as_ref().map(to_json_text).transpose()?;
            conn.execute(
                "INSERT INTO changelog (id, timestamp, source, action, summary, details)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.id,
                    entry.timestamp,
                    entry.source.to_string(),
                    entry.action.to_string(),
                    entry.summary,
                    details,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Entries after `since`, or every retained entry if `since` is absent or unknown.
pub async fn entries(db: &Database, since: Option<&str>) -> Result<Vec<ChangelogEntry>, QuillError> {
    let since = since.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let after: i64 = match &since {
                Some(id) => conn
                    .query_row(
                        "SELECT seq FROM changelog WHERE id = ?1",
                        params![id],
                        |row| row.get(0),
                    )
                    .optional()?
                    .unwrap_or(0),
                None => 0,
            };
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, source, action, summary, details
                 FROM changelog WHERE seq > ?1 ORDER BY seq",
            )?;
            let rows = stmt.query_map(params![after], entry_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn latest_id(db: &Database) -> Result<Option<String>, QuillError> {
    db.connection()
        .call(|conn| {
            conn.query_row(
                "SELECT id FROM changelog ORDER BY seq DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Keep the newest `keep` entries. Returns the number of entries removed.
pub async fn truncate(db: &Database, keep: usize) -> Result<usize, QuillError> {
    let keep = i64::try_from(keep).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM changelog WHERE seq NOT IN
                     (SELECT seq FROM changelog ORDER BY seq DESC LIMIT ?1)",
                params![keep],
            )
        })
        .await
        .map_err(map_tr_err)
}
