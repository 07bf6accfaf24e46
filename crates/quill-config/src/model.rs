// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use quill_core::WritePolicy;
use serde::{Deserialize, Serialize};

/// Top-level Quill configuration.
///
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuillConfig {
    /// Agent loop behavior.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Anthropic API settings.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Changelog retention and agent awareness.
    #[serde(default)]
    pub changelog: ChangelogConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Concurrent write handling for personas.
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
}

/// Agent loop behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Service name used in logs.
    #[serde(default = "default_name")]
    pub name: String,

    /// Log level filter (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Upper bound on model invocations per run. 0 disables the bound.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Prepended to every persona's instructions when chatting with the
    /// editing agent.
    #[serde(default = "default_base_system_prompt")]
    pub base_system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            max_rounds: default_max_rounds(),
            base_system_prompt: default_base_system_prompt(),
        }
    }
}

fn default_name() -> String {
    "quill".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_rounds() -> u32 {
    25
}

fn default_base_system_prompt() -> String {
    "You help the user design an AI persona. You can read and edit the persona's \
     name, instructions and test cases with the tools provided. Make edits only \
     when the user asks for them, and say briefly what you changed."
        .to_string()
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// API key. `None` falls back to the `ANTHROPIC_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Default model for requests without a persona override.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Maximum tokens to generate per model invocation.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Anthropic API version header value.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Connection-level retries on 429/5xx before the stream starts.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: default_model(),
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
            base_url: default_base_url(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_max_retries() -> u32 {
    1
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("quill").join("quill.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("quill.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Changelog retention and agent awareness.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChangelogConfig {
    /// Entries retained after each append. 0 keeps everything.
    #[serde(default = "default_retain")]
    pub retain: usize,

    /// Maximum number of unseen user edits described to the agent per run.
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        Self {
            retain: default_retain(),
            context_limit: default_context_limit(),
        }
    }
}

fn default_retain() -> usize {
    500
}

fn default_context_limit() -> usize {
    20
}

/// HTTP gateway settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Concurrent write handling for personas.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConcurrencyConfig {
    /// `last_writer_wins` or `reject_stale`.
    #[serde(default)]
    pub write_policy: WritePolicy,
}
