// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for Quill.
//!
//! Serves the persona editor's REST API, streams agent runs to the chat pane,
//! and pushes state changes to every connected editor over the sync channel.

pub mod chat;
pub mod error;
pub mod handlers;
pub mod server;
pub mod sse;

pub use error::{ApiError, ErrorResponse};
pub use server::{GatewayState, ServerConfig, router, start_server};
