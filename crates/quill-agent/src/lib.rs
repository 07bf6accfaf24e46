// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agentic tool-use conversation engine for Quill.
//!
//! - [`TurnLog`]: the append-only conversation record for one session.
//! - [`project`]: turns the log into alternating model messages.
//! - [`AgentLoop`]: streams model output, runs tools, persists every turn.
//! - [`SessionManager`]: one current session per persona, cleared on demand.

pub mod agent;
pub mod context;
pub mod events;
pub mod projector;
pub mod session;
pub mod shutdown;
pub mod turn_log;

pub use agent::{AgentLoop, AgentSettings, EventSender, LoopState};
pub use events::ChatEvent;
pub use projector::project;
pub use session::SessionManager;
pub use turn_log::TurnLog;
