// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persona editing tools exposed to the agent.
//!
//! Unlinking only removes a reference from the subject persona; the test
//! case survives and stays linkable elsewhere. Deleting destroys the test
//! case everywhere and always succeeds.

use std::sync::Arc;

use async_trait::async_trait;
use quill_core::{ChangeSource, QuillError, TestCase};
use serde_json::{Map, Value, json};

use crate::tool::{Tool, ToolContext, ToolRegistry, optional_str, required_str};

/// Registers every persona tool.
pub fn register_persona_tools(registry: &mut ToolRegistry) {
    registry.register(Arc::new(GetPersona));
    registry.register(Arc::new(UpdateName));
    registry.register(Arc::new(UpdateInstructions));
    registry.register(Arc::new(ListTestCases));
    registry.register(Arc::new(CreateTestCase));
    registry.register(Arc::new(UpdateTestCase));
    registry.register(Arc::new(LinkTestCase));
    registry.register(Arc::new(UnlinkTestCase));
    registry.register(Arc::new(DeleteTestCase));
}

fn test_case_id_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "test_case_id": { "type": "string", "description": description }
        },
        "required": ["test_case_id"]
    })
}

fn to_pretty(value: &Value) -> Result<String, QuillError> {
    serde_json::to_string_pretty(value).map_err(QuillError::from)
}

async fn existing_test_case(ctx: &ToolContext, id: &str) -> Result<TestCase, QuillError> {
    ctx.store()
        .get_test_case(id)
        .await?
        .ok_or_else(|| QuillError::not_found("test case", id))
}

pub struct GetPersona;

#[async_trait]
impl Tool for GetPersona {
    fn name(&self) -> &str {
        "get_persona"
    }

    fn description(&self) -> &str {
        "Returns the persona's current name, instructions, model, and linked test case ids."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn invoke(&self, _input: &Map<String, Value>, ctx: &ToolContext) -> Result<String, QuillError> {
        let persona = ctx.persona().await?;
        to_pretty(&json!({
            "id": persona.id,
            "name": persona.name,
            "instructions": persona.instructions,
            "model": persona.model,
            "test_case_ids": persona.test_case_ids,
            "version": persona.version,
        }))
    }
}

pub struct UpdateName;

#[async_trait]
impl Tool for UpdateName {
    fn name(&self) -> &str {
        "update_name"
    }

    fn description(&self) -> &str {
        "Renames the persona."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "New display name" }
            },
            "required": ["name"]
        })
    }

    async fn invoke(&self, input: &Map<String, Value>, ctx: &ToolContext) -> Result<String, QuillError> {
        let name = required_str(input, "name")?.trim().to_string();
        let mut persona = ctx.persona().await?;
        let previous = std::mem::replace(&mut persona.name, name.clone());
        let saved = ctx.save(persona).await?;
        ctx.recorder()
            .persona_updated(
                ChangeSource::Agent,
                &saved,
                format!("Renamed persona \"{previous}\" to \"{name}\""),
            )
            .await;
        Ok(format!("Renamed persona to \"{name}\""))
    }
}

pub struct UpdateInstructions;

#[async_trait]
impl Tool for UpdateInstructions {
    fn name(&self) -> &str {
        "update_instructions"
    }

    fn description(&self) -> &str {
        "Replaces the persona's instructions (its system prompt) with the given text."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "instructions": {
                    "type": "string",
                    "description": "The complete new instruction text"
                }
            },
            "required": ["instructions"]
        })
    }

    async fn invoke(&self, input: &Map<String, Value>, ctx: &ToolContext) -> Result<String, QuillError> {
        let instructions = required_str(input, "instructions")?.to_string();
        let mut persona = ctx.persona().await?;
        persona.instructions = instructions;
        let saved = ctx.save(persona).await?;
        ctx.recorder()
            .persona_updated(
                ChangeSource::Agent,
                &saved,
                format!("Updated instructions of \"{}\"", saved.name),
            )
            .await;
        Ok(format!(
            "Instructions updated ({} characters)",
            saved.instructions.chars().count()
        ))
    }
}

pub struct ListTestCases;

#[async_trait]
impl Tool for ListTestCases {
    fn name(&self) -> &str {
        "list_test_cases"
    }

    fn description(&self) -> &str {
        "Lists the test cases linked to the persona, with their latest results."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn invoke(&self, _input: &Map<String, Value>, ctx: &ToolContext) -> Result<String, QuillError> {
        let persona = ctx.persona().await?;
        let cases = ctx.store().list_test_cases(&persona.test_case_ids).await?;
        if cases.is_empty() {
            return Ok("No test cases are linked to this persona.".into());
        }
        let listed: Vec<Value> = cases
            .iter()
            .map(|tc| {
                json!({
                    "id": tc.id,
                    "name": tc.name,
                    "input": tc.input,
                    "expected": tc.expected,
                    "last_result": tc.last_result,
                })
            })
            .collect();
        to_pretty(&Value::Array(listed))
    }
}

pub struct CreateTestCase;

#[async_trait]
impl Tool for CreateTestCase {
    fn name(&self) -> &str {
        "create_test_case"
    }

    fn description(&self) -> &str {
        "Creates a new test case and links it to the persona."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Short label" },
                "input": { "type": "string", "description": "Message sent to the persona" },
                "expected": { "type": "string", "description": "Description of a good reply" }
            },
            "required": ["name", "input"]
        })
    }

    async fn invoke(&self, input: &Map<String, Value>, ctx: &ToolContext) -> Result<String, QuillError> {
        let mut test_case = TestCase::new(required_str(input, "name")?, required_str(input, "input")?);
        test_case.expected = optional_str(input, "expected")?.map(str::to_string);

        let mut persona = ctx.persona().await?;
        ctx.store().create_test_case(&test_case).await?;
        persona.link(&test_case.id);
        let saved = ctx.save(persona).await?;

        let recorder = ctx.recorder();
        recorder
            .test_case_created(ChangeSource::Agent, Some(&saved.id), &test_case)
            .await;
        recorder
            .link_changed(ChangeSource::Agent, &saved, &test_case.id, true)
            .await;
        Ok(format!(
            "Created test case \"{}\" with id {} and linked it to the persona",
            test_case.name, test_case.id
        ))
    }
}

pub struct UpdateTestCase;

#[async_trait]
impl Tool for UpdateTestCase {
    fn name(&self) -> &str {
        "update_test_case"
    }

    fn description(&self) -> &str {
        "Edits the name, input, or expected outcome of an existing test case."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "test_case_id": { "type": "string" },
                "name": { "type": "string" },
                "input": { "type": "string" },
                "expected": { "type": "string" }
            },
            "required": ["test_case_id"]
        })
    }

    async fn invoke(&self, input: &Map<String, Value>, ctx: &ToolContext) -> Result<String, QuillError> {
        let id = required_str(input, "test_case_id")?;
        let name = optional_str(input, "name")?;
        let new_input = optional_str(input, "input")?;
        let expected = optional_str(input, "expected")?;
        if name.is_none() && new_input.is_none() && expected.is_none() {
            return Err(QuillError::InvalidInput(
                "provide at least one of `name`, `input`, `expected`".into(),
            ));
        }

        let mut test_case = existing_test_case(ctx, id).await?;
        if let Some(name) = name {
            test_case.name = name.to_string();
        }
        if let Some(new_input) = new_input {
            test_case.input = new_input.to_string();
        }
        if let Some(expected) = expected {
            test_case.expected = Some(expected.to_string());
        }
        ctx.store().update_test_case(&test_case).await?;
        ctx.recorder()
            .test_case_updated(ChangeSource::Agent, &test_case)
            .await;
        Ok(format!("Updated test case \"{}\"", test_case.name))
    }
}

pub struct LinkTestCase;

#[async_trait]
impl Tool for LinkTestCase {
    fn name(&self) -> &str {
        "link_test_case"
    }

    fn description(&self) -> &str {
        "Links an existing test case to the persona."
    }

    fn input_schema(&self) -> Value {
        test_case_id_schema("Id of the test case to link")
    }

    async fn invoke(&self, input: &Map<String, Value>, ctx: &ToolContext) -> Result<String, QuillError> {
        let id = required_str(input, "test_case_id")?;
        let test_case = existing_test_case(ctx, id).await?;
        let mut persona = ctx.persona().await?;
        if !persona.link(id) {
            return Err(QuillError::InvalidInput(format!(
                "test case {id} is already linked to this persona"
            )));
        }
        let saved = ctx.save(persona).await?;
        ctx.recorder()
            .link_changed(ChangeSource::Agent, &saved, id, true)
            .await;
        Ok(format!("Linked test case \"{}\"", test_case.name))
    }
}

pub struct UnlinkTestCase;

#[async_trait]
impl Tool for UnlinkTestCase {
    fn name(&self) -> &str {
        "unlink_test_case"
    }

    fn description(&self) -> &str {
        "Removes a test case from this persona without deleting it."
    }

    fn input_schema(&self) -> Value {
        test_case_id_schema("Id of the linked test case")
    }

    async fn invoke(&self, input: &Map<String, Value>, ctx: &ToolContext) -> Result<String, QuillError> {
        let id = required_str(input, "test_case_id")?;
        let mut persona = ctx.persona().await?;
        if !persona.unlink(id) {
            return Err(QuillError::InvalidInput(format!(
                "test case {id} is not linked to this persona"
            )));
        }
        let saved = ctx.save(persona).await?;
        ctx.recorder()
            .link_changed(ChangeSource::Agent, &saved, id, false)
            .await;
        Ok(format!("Unlinked test case {id}; it still exists and can be linked again"))
    }
}

pub struct DeleteTestCase;

#[async_trait]
impl Tool for DeleteTestCase {
    fn name(&self) -> &str {
        "delete_test_case"
    }

    fn description(&self) -> &str {
        "Permanently deletes a test case and removes it from every persona."
    }

    fn input_schema(&self) -> Value {
        test_case_id_schema("Id of the test case to delete")
    }

    async fn invoke(&self, input: &Map<String, Value>, ctx: &ToolContext) -> Result<String, QuillError> {
        let id = required_str(input, "test_case_id")?;
        // Fail on a missing subject before touching shared state.
        ctx.persona().await?;
        let unlinked_from = ctx.store().delete_test_case(id).await?;

        // Storage already dropped the reference; persist again to stamp the session.
        let saved = ctx.save(ctx.persona().await?).await?;
        ctx.recorder()
            .test_case_deleted(ChangeSource::Agent, id, &unlinked_from)
            .await;
        if unlinked_from.iter().any(|pid| *pid == saved.id) {
            ctx.recorder()
                .persona_updated(
                    ChangeSource::Agent,
                    &saved,
                    format!("Removed deleted test case {id} from \"{}\"", saved.name),
                )
                .await;
        }
        Ok(format!("Deleted test case {id}"))
    }
}
