// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System prompt assembly and changelog awareness.
//!
//! Before each run the agent reads the changelog entries it has not seen,
//! keeps the ones made through the UI, and describes them in the system
//! prompt so it does not overwrite concurrent human edits unknowingly.

use std::fmt::Write as _;

use quill_core::{ChangeSource, Changelog, ChangelogEntry, Persona, QuillError};

/// User edits the agent has not been told about yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnseenChanges {
    /// Most recent UI entries, oldest first, at most `limit` of them.
    pub entries: Vec<ChangelogEntry>,
    /// UI entries dropped because of the limit.
    pub omitted: usize,
    /// Newest entry id of any source, to be recorded as seen.
    pub latest_id: Option<String>,
}

impl UnseenChanges {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reads entries after `since` and keeps the newest `limit` UI edits.
pub async fn unseen_changes(
    changelog: &dyn Changelog,
    since: Option<&str>,
    limit: usize,
) -> Result<UnseenChanges, QuillError> {
    let all = changelog.entries(since).await?;
    let latest_id = all.last().map(|entry| entry.id.clone());
    let mut ui: Vec<ChangelogEntry> = all
        .into_iter()
        .filter(|entry| entry.source == ChangeSource::Ui)
        .collect();
    let omitted = ui.len().saturating_sub(limit);
    ui.drain(..omitted);
    Ok(UnseenChanges {
        entries: ui,
        omitted,
        latest_id,
    })
}

/// Builds the editing agent's system prompt for `persona`.
pub fn build_system_prompt(base: &str, persona: &Persona, changes: &UnseenChanges) -> String {
    let mut prompt = String::with_capacity(base.len() + persona.instructions.len() + 512);
    prompt.push_str(base.trim_end());
    let _ = write!(
        prompt,
        "\n\nYou are editing the persona \"{}\" (id {}).\n\
         Its current instructions are:\n<instructions>\n{}\n</instructions>\n\
         Linked test cases: {}.",
        persona.name,
        persona.id,
        persona.instructions,
        persona.test_case_ids.len(),
    );

    if !changes.is_empty() {
        prompt.push_str("\n\nChanges made by the user since your last turn:");
        for entry in &changes.entries {
            let _ = write!(
                prompt,
                "\n- [{}] {}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                entry.summary
            );
        }
        if changes.omitted > 0 {
            let _ = write!(prompt, "\n({} earlier changes omitted)", changes.omitted);
        }
    }
    prompt
}
