// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered config loading with Figment.
//!
//! `./quill.toml` > `~/.config/quill/quill.toml` > `/etc/quill/quill.toml`,
//! with `QUILL_` environment variable overrides on top.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::QuillConfig;

pub const SYSTEM_CONFIG_PATH: &str = "/etc/quill/quill.toml";
pub const USER_CONFIG_SUFFIX: &str = "quill/quill.toml";
pub const LOCAL_CONFIG_FILE: &str = "quill.toml";

/// Top-level sections recognised by the env var mapping.
const SECTIONS: &[&str] = &[
    "agent",
    "anthropic",
    "storage",
    "changelog",
    "gateway",
    "concurrency",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
pub fn load_config() -> Result<QuillConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only. No files, no env vars.
pub fn load_config_from_str(toml_content: &str) -> Result<QuillConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(QuillConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<QuillConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(QuillConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full Figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(QuillConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join(USER_CONFIG_SUFFIX))
                .unwrap_or_default(),
        ))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Maps `QUILL_<SECTION>_<KEY>` to `section.key`.
///
/// Only the first underscore after a known section name splits, so
/// `QUILL_CHANGELOG_CONTEXT_LIMIT` becomes `changelog.context_limit`.
fn env_provider() -> Env {
    Env::prefixed("QUILL_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
