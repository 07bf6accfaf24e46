// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `quill changelog` command: inspect or truncate the mutation ledger.

use std::io::Write;

use colored::Colorize;
use quill_config::QuillConfig;
use quill_core::{ChangeSource, Changelog, ChangelogEntry, QuillError};
use quill_storage::SqliteStorage;
use tracing::info;

/// Runs the `quill changelog` command.
///
/// With `truncate`, keeps only that many of the newest entries before listing.
pub async fn run_changelog(
    config: QuillConfig,
    since: Option<String>,
    truncate: Option<usize>,
    plain: bool,
) -> Result<(), QuillError> {
    let storage = SqliteStorage::open(&config.storage).await?;
    let mut stdout = std::io::stdout();
    list(&storage, since.as_deref(), truncate, plain, &mut stdout).await
}

async fn list<W: Write>(
    changelog: &dyn Changelog,
    since: Option<&str>,
    truncate: Option<usize>,
    plain: bool,
    out: &mut W,
) -> Result<(), QuillError> {
    let write_err = |e: std::io::Error| QuillError::Internal(format!("failed to write output: {e}"));

    if let Some(keep) = truncate {
        let dropped = changelog.truncate(keep).await?;
        info!(dropped, keep, "changelog truncated");
        writeln!(out, "dropped {dropped} entries, kept at most {keep}").map_err(write_err)?;
    }

    let entries = changelog.entries(since).await?;
    if entries.is_empty() {
        writeln!(out, "no changelog entries").map_err(write_err)?;
        return Ok(());
    }
    for entry in &entries {
        writeln!(out, "{}", render(entry, plain)).map_err(write_err)?;
    }
    Ok(())
}

fn render(entry: &ChangelogEntry, plain: bool) -> String {
    let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S");
    let source = format!("{:<5}", entry.source.to_string());
    let source = match (plain, entry.source) {
        (true, _) => source,
        (false, ChangeSource::Ui) => source.cyan().to_string(),
        (false, ChangeSource::Agent) => source.magenta().to_string(),
    };
    format!(
        "{}  {timestamp}  {source}  {:<20}  {}",
        entry.id, entry.action, entry.summary
    )
}
