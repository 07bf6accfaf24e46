// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persona CRUD operations.
//!
//! Linked test case ids live in `persona_test_cases`, ordered by `position`.

use chrono::Utc;
use quill_core::{Persona, QuillError, WritePolicy};
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::{Database, map_tr_err};

const PERSONA_COLUMNS: &str =
    "id, name, instructions, model, agent_session_id, version, created_at, updated_at";

fn persona_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Persona> {
    Ok(Persona {
        id: row.get(0)?,
        name: row.get(1)?,
        instructions: row.get(2)?,
        model: row.get(3)?,
        agent_session_id: row.get(4)?,
        version: row.get::<_, i64>(5)? as u64,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        test_case_ids: Vec::new(),
    })
}

fn load_links(conn: &Connection, persona: &mut Persona) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(
        "SELECT test_case_id FROM persona_test_cases WHERE persona_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![persona.id], |row| row.get(0))?;
    persona.test_case_ids = rows.collect::<Result<_, _>>()?;
    Ok(())
}

/// Replaces the persona's link rows. Ids of test cases that no longer exist
/// are dropped rather than failing the write.
fn store_links(conn: &Connection, persona: &Persona) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM persona_test_cases WHERE persona_id = ?1",
        params![persona.id],
    )?;
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO persona_test_cases (persona_id, test_case_id, position)
         SELECT ?1, id, ?3 FROM test_cases WHERE id = ?2",
    )?;
    for (position, test_case_id) in persona.test_case_ids.iter().enumerate() {
        stmt.execute(params![persona.id, test_case_id, position as i64])?;
    }
    Ok(())
}

fn get_in(conn: &Connection, id: &str) -> rusqlite::Result<Option<Persona>> {
    let sql = format!("SELECT {PERSONA_COLUMNS} FROM personas WHERE id = ?1");
    let persona = conn
        .query_row(&sql, params![id], persona_from_row)
        .optional()?;
    match persona {
        Some(mut persona) => {
            load_links(conn, &mut persona)?;
            Ok(Some(persona))
        }
        None => Ok(None),
    }
}

/// Get a persona by id, with its links.
pub async fn get_persona(db: &Database, id: &str) -> Result<Option<Persona>, QuillError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| get_in(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// All personas, oldest first.
pub async fn list_personas(db: &Database) -> Result<Vec<Persona>, QuillError> {
    db.connection()
        .call(|conn| {
            let sql = format!("SELECT {PERSONA_COLUMNS} FROM personas ORDER BY created_at, id");
            let mut personas = {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], persona_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            for persona in &mut personas {
                load_links(conn, persona)?;
            }
            Ok(personas)
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a new persona. The stored copy starts at version 1.
pub async fn create_persona(db: &Database, persona: &Persona) -> Result<Persona, QuillError> {
    let mut persona = persona.clone();
    persona.version = 1;
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO personas (id, name, instructions, model, agent_session_id, version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    persona.id,
                    persona.name,
                    persona.instructions,
                    persona.model,
                    persona.agent_session_id,
                    persona.version as i64,
                    persona.created_at,
                    persona.updated_at,
                ],
            )?;
            store_links(&tx, &persona)?;
            let stored = get_in(&tx, &persona.id)?;
            tx.commit()?;
            Ok(stored.unwrap_or(persona))
        })
        .await
        .map_err(map_tr_err)
}

enum UpdateOutcome {
    Updated(Persona),
    Missing,
    Stale(u64),
}

/// Persist `persona`, bumping its version.
///
/// Under [`WritePolicy::RejectStale`] a persona whose `version` no longer
/// matches the stored row is rejected with [`QuillError::Conflict`].
pub async fn update_persona(
    db: &Database,
    persona: &Persona,
    policy: WritePolicy,
) -> Result<Persona, QuillError> {
    let persona = persona.clone();
    let id = persona.id.clone();
    let expected = persona.version;

    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let stored: Option<i64> = tx
                .query_row(
                    "SELECT version FROM personas WHERE id = ?1",
                    params![persona.id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(stored) = stored.map(|v| v as u64) else {
                return Ok(UpdateOutcome::Missing);
            };
            if policy == WritePolicy::RejectStale && stored != persona.version {
                return Ok(UpdateOutcome::Stale(stored));
            }

            tx.execute(
                "UPDATE personas SET name = ?2, instructions = ?3, model = ?4,
                     agent_session_id = ?5, version = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    persona.id,
                    persona.name,
                    persona.instructions,
                    persona.model,
                    persona.agent_session_id,
                    (stored + 1) as i64,
                    Utc::now(),
                ],
            )?;
            store_links(&tx, &persona)?;
            let updated = get_in(&tx, &persona.id)?;
            tx.commit()?;
            Ok(match updated {
                Some(p) => UpdateOutcome::Updated(p),
                None => UpdateOutcome::Missing,
            })
        })
        .await
        .map_err(map_tr_err)?;

    match outcome {
        UpdateOutcome::Updated(persona) => Ok(persona),
        UpdateOutcome::Missing => Err(QuillError::not_found("persona", id)),
        UpdateOutcome::Stale(actual) => Err(QuillError::Conflict {
            kind: "persona",
            id,
            expected,
            actual,
        }),
    }
}

/// Delete a persona, its links, and its chat session.
pub async fn delete_persona(db: &Database, id: &str) -> Result<bool, QuillError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM sessions WHERE persona_id = ?1", params![id])?;
            let deleted = tx.execute("DELETE FROM personas WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
        .await
        .map_err(map_tr_err)
}
