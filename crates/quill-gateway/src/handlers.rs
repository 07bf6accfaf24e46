// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST handlers for personas, test cases, health, and the changelog.
//!
//! Every mutation here is a UI mutation: it is persisted first, then
//! published through the [`ChangeRecorder`](quill_bus::ChangeRecorder) with
//! source `ui`.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use quill_core::{ChangeSource, ChangelogEntry, Persona, QuillError, TestCase, TestResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::server::GatewayState;

/// Response body for GET /v1/health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Request body for POST /v1/personas.
#[derive(Debug, Deserialize)]
pub struct CreatePersonaRequest {
    pub name: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub model: Option<String>,
}

/// Request body for PUT /v1/personas/{id}. Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdatePersonaRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Version the client last saw; checked under `reject_stale`.
    #[serde(default)]
    pub version: Option<u64>,
}

/// Request body for POST /v1/personas/{id}/test-cases.
#[derive(Debug, Deserialize)]
pub struct CreateTestCaseRequest {
    pub name: String,
    pub input: String,
    #[serde(default)]
    pub expected: Option<String>,
}

/// Request body for PUT /v1/test-cases/{id}.
#[derive(Debug, Deserialize)]
pub struct UpdateTestCaseRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub expected: Option<String>,
}

/// Request body for PUT /v1/test-cases/{id}/result.
#[derive(Debug, Deserialize)]
pub struct RecordResultRequest {
    pub output: String,
    #[serde(default)]
    pub passed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ChangelogQuery {
    #[serde(default)]
    pub since: Option<String>,
}

/// Response body for GET /v1/changelog.
#[derive(Debug, Serialize)]
pub struct ChangelogResponse {
    pub entries: Vec<ChangelogEntry>,
    /// Marker to pass as `since` on the next poll.
    pub latest_id: Option<String>,
}

fn require_non_empty(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("`{field}` must not be empty")));
    }
    Ok(())
}

async fn load_persona(state: &GatewayState, id: &str) -> ApiResult<Persona> {
    state
        .personas
        .get_persona(id)
        .await?
        .ok_or_else(|| QuillError::not_found("persona", id).into())
}

async fn load_test_case(state: &GatewayState, id: &str) -> ApiResult<TestCase> {
    state
        .personas
        .get_test_case(id)
        .await?
        .ok_or_else(|| QuillError::not_found("test case", id).into())
}

/// GET /v1/health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /v1/personas
pub async fn list_personas(State(state): State<GatewayState>) -> ApiResult<Json<Vec<Persona>>> {
    Ok(Json(state.personas.list_personas().await?))
}

/// POST /v1/personas
pub async fn create_persona(
    State(state): State<GatewayState>,
    body: Result<Json<CreatePersonaRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Persona>)> {
    let Json(body) = body?;
    require_non_empty("name", &body.name)?;

    let mut persona = Persona::new(body.name, body.instructions);
    persona.model = body.model.filter(|m| !m.trim().is_empty());
    let persona = state.personas.create_persona(&persona).await?;
    info!(persona_id = %persona.id, "persona created");

    state
        .recorder
        .persona_created(ChangeSource::Ui, &persona)
        .await;
    Ok((StatusCode::CREATED, Json(persona)))
}

/// GET /v1/personas/{id}
pub async fn get_persona(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Persona>> {
    Ok(Json(load_persona(&state, &id).await?))
}

/// PUT /v1/personas/{id}
pub async fn update_persona(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    body: Result<Json<UpdatePersonaRequest>, JsonRejection>,
) -> ApiResult<Json<Persona>> {
    let Json(body) = body?;
    let mut persona = load_persona(&state, &id).await?;

    let mut changed = Vec::new();
    if let Some(name) = body.name {
        require_non_empty("name", &name)?;
        persona.name = name;
        changed.push("name");
    }
    if let Some(instructions) = body.instructions {
        persona.instructions = instructions;
        changed.push("instructions");
    }
    if let Some(model) = body.model {
        persona.model = Some(model).filter(|m| !m.trim().is_empty());
        changed.push("model");
    }
    if changed.is_empty() {
        return Err(ApiError::bad_request(
            "provide at least one of `name`, `instructions`, `model`",
        ));
    }
    if let Some(version) = body.version {
        persona.version = version;
    }

    let persona = state
        .personas
        .update_persona(&persona, state.write_policy)
        .await?;
    let summary = format!("Updated {} of \"{}\"", changed.join(", "), persona.name);
    state
        .recorder
        .persona_updated(ChangeSource::Ui, &persona, summary)
        .await;
    Ok(Json(persona))
}

/// DELETE /v1/personas/{id}
///
/// Also discards the persona's chat session.
pub async fn delete_persona(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let persona = load_persona(&state, &id).await?;
    state.personas.delete_persona(&id).await?;
    info!(persona_id = %id, "persona deleted");

    state
        .recorder
        .persona_deleted(ChangeSource::Ui, &persona)
        .await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/personas/{id}/test-cases
pub async fn list_test_cases(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<TestCase>>> {
    let persona = load_persona(&state, &id).await?;
    Ok(Json(
        state
            .personas
            .list_test_cases(&persona.test_case_ids)
            .await?,
    ))
}

/// POST /v1/personas/{id}/test-cases
///
/// Creates the test case and links it to the persona.
pub async fn create_test_case(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    body: Result<Json<CreateTestCaseRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TestCase>)> {
    let Json(body) = body?;
    require_non_empty("name", &body.name)?;
    let mut persona = load_persona(&state, &id).await?;

    let mut test_case = TestCase::new(body.name, body.input);
    test_case.expected = body.expected;
    state.personas.create_test_case(&test_case).await?;

    persona.link(&test_case.id);
    let persona = state
        .personas
        .update_persona(&persona, state.write_policy)
        .await?;

    state
        .recorder
        .test_case_created(ChangeSource::Ui, Some(&persona.id), &test_case)
        .await;
    state
        .recorder
        .link_changed(ChangeSource::Ui, &persona, &test_case.id, true)
        .await;
    Ok((StatusCode::CREATED, Json(test_case)))
}

/// POST /v1/personas/{id}/test-cases/{tc_id}/link
///
/// Idempotent: linking an already linked test case returns the persona as is.
pub async fn link_test_case(
    State(state): State<GatewayState>,
    Path((id, tc_id)): Path<(String, String)>,
) -> ApiResult<Json<Persona>> {
    let mut persona = load_persona(&state, &id).await?;
    load_test_case(&state, &tc_id).await?;

    if !persona.link(&tc_id) {
        return Ok(Json(persona));
    }
    let persona = state
        .personas
        .update_persona(&persona, state.write_policy)
        .await?;
    state
        .recorder
        .link_changed(ChangeSource::Ui, &persona, &tc_id, true)
        .await;
    Ok(Json(persona))
}

/// DELETE /v1/personas/{id}/test-cases/{tc_id}/link
///
/// Removes the reference only; the test case itself survives. Unlinking a
/// test case that is not linked is a 400 and leaves the persona untouched.
pub async fn unlink_test_case(
    State(state): State<GatewayState>,
    Path((id, tc_id)): Path<(String, String)>,
) -> ApiResult<Json<Persona>> {
    let mut persona = load_persona(&state, &id).await?;
    if !persona.unlink(&tc_id) {
        return Err(QuillError::InvalidInput(format!(
            "test case {tc_id} is not linked to this persona"
        ))
        .into());
    }
    let persona = state
        .personas
        .update_persona(&persona, state.write_policy)
        .await?;
    state
        .recorder
        .link_changed(ChangeSource::Ui, &persona, &tc_id, false)
        .await;
    Ok(Json(persona))
}

/// PUT /v1/test-cases/{id}
pub async fn update_test_case(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateTestCaseRequest>, JsonRejection>,
) -> ApiResult<Json<TestCase>> {
    let Json(body) = body?;
    if body.name.is_none() && body.input.is_none() && body.expected.is_none() {
        return Err(ApiError::bad_request(
            "provide at least one of `name`, `input`, `expected`",
        ));
    }
    let mut test_case = load_test_case(&state, &id).await?;
    if let Some(name) = body.name {
        require_non_empty("name", &name)?;
        test_case.name = name;
    }
    if let Some(input) = body.input {
        test_case.input = input;
    }
    if let Some(expected) = body.expected {
        test_case.expected = Some(expected).filter(|e| !e.is_empty());
    }
    test_case.updated_at = chrono::Utc::now();

    state.personas.update_test_case(&test_case).await?;
    state
        .recorder
        .test_case_updated(ChangeSource::Ui, &test_case)
        .await;
    Ok(Json(test_case))
}

/// DELETE /v1/test-cases/{id}
///
/// Cascades: the test case is unlinked from every persona that referenced it.
pub async fn delete_test_case(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    load_test_case(&state, &id).await?;
    let unlinked_from = state.personas.delete_test_case(&id).await?;
    info!(test_case_id = %id, personas = unlinked_from.len(), "test case deleted");

    state
        .recorder
        .test_case_deleted(ChangeSource::Ui, &id, &unlinked_from)
        .await;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /v1/test-cases/{id}/result
pub async fn record_result(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    body: Result<Json<RecordResultRequest>, JsonRejection>,
) -> ApiResult<Json<TestCase>> {
    let Json(body) = body?;
    load_test_case(&state, &id).await?;

    let result = TestResult {
        output: body.output,
        passed: body.passed,
        ran_at: chrono::Utc::now(),
    };
    state.personas.set_test_result(&id, &result).await?;
    state
        .recorder
        .test_result_recorded(ChangeSource::Ui, &id, &result)
        .await;
    Ok(Json(load_test_case(&state, &id).await?))
}

/// GET /v1/changelog?since=<id>
///
/// An unknown `since` returns every retained entry.
pub async fn get_changelog(
    State(state): State<GatewayState>,
    Query(query): Query<ChangelogQuery>,
) -> ApiResult<Json<ChangelogResponse>> {
    let entries = state.changelog.entries(query.since.as_deref()).await?;
    let latest_id = match entries.last() {
        Some(entry) => Some(entry.id.clone()),
        None => state.changelog.latest_id().await?,
    };
    Ok(Json(ChangelogResponse { entries, latest_id }))
}
