// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session and turn log operations.

use chrono::Utc;
use quill_core::{QuillError, Session, Turn};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::queries::{json_column, to_json_text};

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        persona_id: row.get(1)?,
        last_changelog_id: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

pub async fn current_session(
    db: &Database,
    persona_id: &str,
) -> Result<Option<Session>, QuillError> {
    let persona_id = persona_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, persona_id, last_changelog_id, created_at, updated_at
                 FROM sessions WHERE persona_id = ?1",
                params![persona_id],
                session_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a session, deleting the persona's previous session and its turns.
pub async fn create_session(db: &Database, session: &Session) -> Result<(), QuillError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM sessions WHERE persona_id = ?1",
                params![session.persona_id],
            )?;
            tx.execute(
                "INSERT INTO sessions (id, persona_id, last_changelog_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    session.id,
                    session.persona_id,
                    session.last_changelog_id,
                    session.created_at,
                    session.updated_at,
                ],
            )?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_session(db: &Database, session_id: &str) -> Result<(), QuillError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Append one turn. The whole turn is stored as JSON next to its kind.
pub async fn append_turn(db: &Database, session_id: &str, turn: &Turn) -> Result<(), QuillError> {
    let session_id = session_id.to_string();
    let turn = turn.clone();
    db.connection()
        .call(move |conn| {
            let payload = to_json_text(&turn)?;
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO turns (id, session_id, kind, payload, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![turn.id(), session_id, turn.kind(), payload, turn.created_at()],
            )?;
            tx.execute(
                "UPDATE sessions SET updated_at = ?2 WHERE id = ?1",
                params![session_id, Utc::now()],
            )?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// All turns of a session in append order.
pub async fn turns(db: &Database, session_id: &str) -> Result<Vec<Turn>, QuillError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare("SELECT payload FROM turns WHERE session_id = ?1 ORDER BY seq")?;
            let rows = stmt.query_map(params![session_id], |row| json_column(row, 0))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn mark_changelog_seen(
    db: &Database,
    session_id: &str,
    entry_id: Option<&str>,
) -> Result<(), QuillError> {
    let session_id = session_id.to_string();
    let entry_id = entry_id.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET last_changelog_id = ?2 WHERE id = ?1",
                params![session_id, entry_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
