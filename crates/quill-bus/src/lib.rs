// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change propagation for Quill.
//!
//! [`ChangeBroadcaster`] pushes ephemeral state events to live observers;
//! [`ChangeRecorder`] pairs every broadcast with a durable changelog append.

pub mod broadcaster;
pub mod recorder;

pub use broadcaster::{ChangeBroadcaster, SubscriberError, Subscription};
pub use recorder::ChangeRecorder;
