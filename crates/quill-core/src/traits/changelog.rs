// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable mutation ledger trait.

use async_trait::async_trait;

use crate::error::QuillError;
use crate::event::ChangelogEntry;

/// Append-only, truncatable ledger of mutation events.
///
/// Appends are atomic with respect to readers: `entries` never observes a
/// half-written entry.
#[async_trait]
pub trait Changelog: Send + Sync {
    async fn append(&self, entry: &ChangelogEntry) -> Result<(), QuillError>;

    /// Entries strictly after `since`, in append order.
    ///
    /// An absent or unknown `since` returns every retained entry. This is the
    /// resync path after truncation discarded the caller's marker.
    async fn entries(&self, since: Option<&str>) -> Result<Vec<ChangelogEntry>, QuillError>;

    async fn latest_id(&self) -> Result<Option<String>, QuillError>;

    /// Keeps only the most recent `keep` entries. Returns how many were dropped.
    async fn truncate(&self, keep: usize) -> Result<usize, QuillError>;
}
