// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test case CRUD operations.

use chrono::{DateTime, Utc};
use quill_core::{QuillError, TestCase, TestResult};
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::{Database, map_tr_err};

const TEST_CASE_COLUMNS: &str = "id, name, input, expected, result_output, result_passed, \
     result_ran_at, created_at, updated_at";

fn test_case_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TestCase> {
    let output: Option<String> = row.get(4)?;
    let ran_at: Option<DateTime<Utc>> = row.get(6)?;
    let last_result = match (output, ran_at) {
        (Some(output), Some(ran_at)) => Some(TestResult {
            output,
            passed: row.get(5)?,
            ran_at,
        }),
        _ => None,
    };
    Ok(TestCase {
        id: row.get(0)?,
        name: row.get(1)?,
        input: row.get(2)?,
        expected: row.get(3)?,
        last_result,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn get_in(conn: &Connection, id: &str) -> rusqlite::Result<Option<TestCase>> {
    let sql = format!("SELECT {TEST_CASE_COLUMNS} FROM test_cases WHERE id = ?1");
    conn.query_row(&sql, params![id], test_case_from_row)
        .optional()
}

pub async fn get_test_case(db: &Database, id: &str) -> Result<Option<TestCase>, QuillError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| get_in(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// Test cases for `ids`, in the given order, skipping ids that do not exist.
pub async fn list_test_cases(db: &Database, ids: &[String]) -> Result<Vec<TestCase>, QuillError> {
    let ids = ids.to_vec();
    db.connection()
        .call(move |conn| {
            let mut found = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(test_case) = get_in(conn, id)? {
                    found.push(test_case);
                }
            }
            Ok(found)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn create_test_case(db: &Database, test_case: &TestCase) -> Result<(), QuillError> {
    let tc = test_case.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO test_cases (id, name, input, expected, result_output, result_passed,
                     result_ran_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    tc.id,
                    tc.name,
                    tc.input,
                    tc.expected,
                    tc.last_result.as_ref().map(|r| r.output.clone()),
                    tc.last_result.as_ref().and_then(|r| r.passed),
                    tc.last_result.as_ref().map(|r| r.ran_at),
                    tc.created_at,
                    tc.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Update the editable fields of a test case. Fails with `NotFound` if it is gone.
pub async fn update_test_case(db: &Database, test_case: &TestCase) -> Result<(), QuillError> {
    let tc = test_case.clone();
    let id = tc.id.clone();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE test_cases SET name = ?2, input = ?3, expected = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![tc.id, tc.name, tc.input, tc.expected, Utc::now()],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(QuillError::not_found("test case", id));
    }
    Ok(())
}

/// Destroy a test case, unlinking it from every persona that referenced it.
///
/// Affected personas get a version bump so stale writers notice the cascade.
pub async fn delete_test_case(db: &Database, id: &str) -> Result<Vec<String>, QuillError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let persona_ids: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT persona_id FROM persona_test_cases WHERE test_case_id = ?1
                     ORDER BY persona_id",
                )?;
                let rows = stmt.query_map(params![id], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };
            tx.execute(
                "DELETE FROM persona_test_cases WHERE test_case_id = ?1",
                params![id],
            )?;
            let now = Utc::now();
            for persona_id in &persona_ids {
                tx.execute(
                    "UPDATE personas SET version = version + 1, updated_at = ?2 WHERE id = ?1",
                    params![persona_id, now],
                )?;
            }
            tx.execute("DELETE FROM test_cases WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(persona_ids)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_test_result(
    db: &Database,
    id: &str,
    result: &TestResult,
) -> Result<(), QuillError> {
    let id = id.to_string();
    let missing_id = id.clone();
    let result = result.clone();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE test_cases SET result_output = ?2, result_passed = ?3, result_ran_at = ?4
                 WHERE id = ?1",
                params![id, result.output, result.passed, result.ran_at],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(QuillError::not_found("test case", missing_id));
    }
    Ok(())
}
