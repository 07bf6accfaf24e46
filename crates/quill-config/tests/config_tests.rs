// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the configuration system.

use quill_config::diagnostic::ConfigError;
use quill_config::{load_and_validate_str, load_config_from_str};
use quill_core::WritePolicy;

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[agent]
name = "studio"
log_level = "debug"
max_rounds = 8

[anthropic]
api_key = "sk-ant-123"
default_model = "claude-haiku-4-5"
max_tokens = 1024

[storage]
database_path = "/tmp/quill-test.db"
wal_mode = false

[changelog]
retain = 50
context_limit = 5

[gateway]
host = "0.0.0.0"
port = 8080
cors_origins = ["http://localhost:5173"]

[concurrency]
write_policy = "reject_stale"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.agent.name, "studio");
    assert_eq!(config.agent.max_rounds, 8);
    assert_eq!(config.anthropic.api_key.as_deref(), Some("sk-ant-123"));
    assert_eq!(config.anthropic.max_tokens, 1024);
    assert!(!config.storage.wal_mode);
    assert_eq!(config.changelog.retain, 50);
    assert_eq!(config.changelog.context_limit, 5);
    assert_eq!(config.gateway.port, 8080);
    assert_eq!(config.gateway.cors_origins, vec!["http://localhost:5173"]);
    assert_eq!(config.concurrency.write_policy, WritePolicy::RejectStale);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    assert_eq!(config.agent.name, "quill");
    assert_eq!(config.gateway.port, 3000);
    assert_eq!(config.changelog.retain, 500);
    assert_eq!(config.concurrency.write_policy, WritePolicy::LastWriterWins);
}

#[test]
fn unknown_key_suggests_correction() {
    let toml = r#"
[changelog]
retian = 10
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            span,
            ..
        } => {
            assert_eq!(key, "retian");
            assert_eq!(suggestion.as_deref(), Some("retain"));
            assert!(span.is_some());
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[gateway]
port = "eighty"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key == "gateway.port"))
    );
}

#[test]
fn validation_runs_after_parsing() {
    let toml = r#"
[anthropic]
max_tokens = 0
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { message } if message.contains("max_tokens"))
    ));
}
